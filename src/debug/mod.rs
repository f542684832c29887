use crate::config::{GameConfig, VehicleConfig, CONFIG_DIR};
use crate::gameplay::session::{DriveSession, FrameLoop, FrameSnapshot};
use crate::input::InputState;
use crate::states::GameState;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<KeybindOverlayState>()
            .init_resource::<VehicleTuningPanelState>()
            .add_systems(Update, spawn_debug_overlay)
            .add_systems(Update, toggle_keybind_overlay)
            .add_systems(Update, toggle_vehicle_tuning_panel)
            .add_systems(Update, sync_keybind_overlay_visibility)
            .add_systems(
                Update,
                (update_debug_overlay_text, dump_frame_snapshot, reset_drive_session)
                    .run_if(in_state(GameState::Driving))
                    .run_if(resource_exists::<GameConfig>),
            )
            .add_systems(
                EguiPrimaryContextPass,
                vehicle_tuning_panel_ui.run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component)]
struct DebugOverlayText;

#[derive(Component)]
struct KeybindOverlayText;

#[derive(Resource, Debug, Clone, Default)]
struct KeybindOverlayState {
    visible: bool,
}

struct TuningField {
    key: &'static str,
    range: RangeInclusive<f32>,
    drag_speed: f32,
    value: fn(&mut VehicleConfig) -> &mut f32,
}

const TUNING_GROUPS: &[(&str, &[TuningField])] = &[
    (
        "Engine",
        &[
            TuningField {
                key: "max_speed",
                range: 1.0..=120.0,
                drag_speed: 0.1,
                value: |v| &mut v.max_speed,
            },
            TuningField {
                key: "acceleration",
                range: 0.0..=20.0,
                drag_speed: 0.05,
                value: |v| &mut v.acceleration,
            },
            TuningField {
                key: "acceleration_gain",
                range: 0.0..=100.0,
                drag_speed: 0.1,
                value: |v| &mut v.acceleration_gain,
            },
            TuningField {
                key: "power_floor",
                range: 0.0..=1.0,
                drag_speed: 0.01,
                value: |v| &mut v.power_floor,
            },
        ],
    ),
    (
        "Brake + Reverse",
        &[
            TuningField {
                key: "brake_strength",
                range: 0.0..=30.0,
                drag_speed: 0.05,
                value: |v| &mut v.brake_strength,
            },
            TuningField {
                key: "reverse_strength",
                range: 0.0..=30.0,
                drag_speed: 0.05,
                value: |v| &mut v.reverse_strength,
            },
            TuningField {
                key: "reverse_fraction",
                range: 0.0..=1.0,
                drag_speed: 0.01,
                value: |v| &mut v.reverse_fraction,
            },
            TuningField {
                key: "friction",
                range: 0.9..=1.0,
                drag_speed: 0.0005,
                value: |v| &mut v.friction,
            },
        ],
    ),
    (
        "Steering",
        &[
            TuningField {
                key: "steer_activation_speed",
                range: 0.0..=5.0,
                drag_speed: 0.01,
                value: |v| &mut v.steer_activation_speed,
            },
            TuningField {
                key: "turn_speed",
                range: 0.0..=0.2,
                drag_speed: 0.001,
                value: |v| &mut v.turn_speed,
            },
            TuningField {
                key: "full_turn_speed",
                range: 0.1..=40.0,
                drag_speed: 0.1,
                value: |v| &mut v.full_turn_speed,
            },
            TuningField {
                key: "max_wheel_angle_degrees",
                range: 0.0..=60.0,
                drag_speed: 0.1,
                value: |v| &mut v.max_wheel_angle_degrees,
            },
            TuningField {
                key: "wheel_return",
                range: 0.0..=1.0,
                drag_speed: 0.01,
                value: |v| &mut v.wheel_return,
            },
        ],
    ),
];

#[derive(Resource, Debug, Default)]
struct VehicleTuningPanelState {
    visible: bool,
    source_vehicle_id: String,
    draft: Option<VehicleConfig>,
    status: String,
}

fn spawn_debug_overlay(
    mut commands: Commands,
    keybind_overlay: Res<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
    existing_overlay: Query<Entity, With<DebugOverlayText>>,
) {
    if !existing_overlay.is_empty() {
        return;
    }

    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    commands.spawn((
        DebugOverlayText,
        Text::new(""),
        TextFont {
            font_size: 14.0,
            ..default()
        },
        TextColor(Color::srgb(0.92, 0.95, 0.97)),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            bottom: Val::Px(12.0),
            ..default()
        },
        ZIndex(100),
    ));

    commands.spawn((
        KeybindOverlayText,
        Text::new(keybind_overlay_text()),
        TextFont {
            font_size: 15.0,
            ..default()
        },
        TextColor(Color::srgb(0.90, 0.94, 0.97)),
        BackgroundColor(Color::srgba(0.06, 0.08, 0.10, 0.82)),
        BorderColor::all(Color::srgba(0.60, 0.68, 0.74, 0.9)),
        Node {
            position_type: PositionType::Absolute,
            right: Val::Px(12.0),
            bottom: Val::Px(12.0),
            padding: UiRect::axes(Val::Px(10.0), Val::Px(8.0)),
            border: UiRect::all(Val::Px(1.0)),
            ..default()
        },
        if keybind_overlay.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        },
        ZIndex(100),
    ));
}

fn update_debug_overlay_text(
    diagnostics: Res<DiagnosticsStore>,
    snapshot: Res<FrameSnapshot>,
    frame_loop: Res<FrameLoop>,
    input: Res<InputState>,
    mut overlay_query: Query<&mut Text, With<DebugOverlayText>>,
) {
    let Ok(mut text) = overlay_query.single_mut() else {
        return;
    };

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|value| value.smoothed())
        .unwrap_or(0.0);

    *text = Text::new(debug_overlay_text(fps, &snapshot, &frame_loop, &input));
}

fn debug_overlay_text(
    fps: f64,
    snapshot: &FrameSnapshot,
    frame_loop: &FrameLoop,
    input: &InputState,
) -> String {
    let nearest = snapshot
        .nearest
        .as_ref()
        .map(|nearest| nearest.id.as_str())
        .unwrap_or("none");
    let controls = input.controls();

    format!(
        "FPS: {fps:>5.1} | Frame {frame}\nPos: ({x:>7.1}, {y:>7.1}) | Heading {heading:>6.1} deg\nSpeed: {speed:>6.2} u/s (cap {cap:.1}) | Wheel {wheel:>5.1} deg\nFuel: {fuel:>5.1}%{low}\nInput: throttle={throttle:+.0} steer={steer:+.0}\nNearest: {nearest} | Panel: {panel}\nFaults: {faults} (loop {faulted}/{run})\nHotkeys: H help | V vehicle tune | F5 reload config | F9 dump | R reset",
        frame = snapshot.frame,
        x = snapshot.position[0],
        y = snapshot.position[1],
        heading = snapshot.heading.to_degrees(),
        speed = snapshot.speed,
        cap = snapshot.effective_max_speed,
        wheel = snapshot.wheel_angle.to_degrees(),
        fuel = snapshot.fuel,
        low = if snapshot.low_fuel { " LOW" } else { "" },
        throttle = controls.throttle(),
        steer = controls.steer(),
        panel = snapshot
            .panel
            .as_ref()
            .map(|panel| panel.section_id.as_str())
            .unwrap_or("closed"),
        faults = snapshot.fault_count,
        faulted = frame_loop.faulted_frames(),
        run = frame_loop.frames_run(),
    )
}

fn dump_frame_snapshot(keyboard: Res<ButtonInput<KeyCode>>, snapshot: Res<FrameSnapshot>) {
    if !keyboard.just_pressed(KeyCode::F9) {
        return;
    }

    match serde_json::to_string_pretty(&*snapshot) {
        Ok(json) => info!("Frame snapshot:\n{json}"),
        Err(error) => warn!("Failed to serialize frame snapshot: {error}"),
    }
}

fn reset_drive_session(
    keyboard: Res<ButtonInput<KeyCode>>,
    config: Res<GameConfig>,
    session: Option<ResMut<DriveSession>>,
) {
    if !config.game.app.debug_overlay || !keyboard.just_pressed(KeyCode::KeyR) {
        return;
    }
    let Some(mut session) = session else {
        return;
    };

    session.reset();
    info!("Drive session reset to spawn.");
}

fn toggle_keybind_overlay(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
) {
    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    if keyboard.just_pressed(KeyCode::KeyH) {
        state.visible = !state.visible;
        info!(
            "Debug keybind panel {}.",
            if state.visible { "shown" } else { "hidden" }
        );
    }
}

fn sync_keybind_overlay_visibility(
    state: Res<KeybindOverlayState>,
    mut query: Query<&mut Visibility, With<KeybindOverlayText>>,
) {
    if !state.is_changed() {
        return;
    }

    let next_visibility = if state.visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };

    for mut visibility in &mut query {
        *visibility = next_visibility;
    }
}

fn toggle_vehicle_tuning_panel(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut panel_state: ResMut<VehicleTuningPanelState>,
    config: Option<Res<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::KeyV) {
        return;
    }

    panel_state.visible = !panel_state.visible;
    if panel_state.visible {
        if let Some(config) = config {
            if let Err(error) = sync_panel_state_from_config(&mut panel_state, &config) {
                panel_state.status = error;
            }
        }
        info!("Vehicle tuning panel shown.");
    } else {
        info!("Vehicle tuning panel hidden.");
    }
}

fn vehicle_tuning_panel_ui(
    mut egui_contexts: EguiContexts,
    mut panel_state: ResMut<VehicleTuningPanelState>,
    mut config: ResMut<GameConfig>,
) {
    if !panel_state.visible {
        return;
    }

    if panel_state.draft.is_none()
        || panel_state.source_vehicle_id != config.game.app.default_vehicle
    {
        if let Err(error) = sync_panel_state_from_config(&mut panel_state, &config) {
            panel_state.status = error;
            return;
        }
    }

    let Some(mut draft) = panel_state.draft.clone() else {
        return;
    };

    let mut window_open = panel_state.visible;
    let mut draft_changed = false;
    let mut reload_clicked = false;
    let mut apply_clicked = false;
    let mut save_clicked = false;
    let status = panel_state.status.clone();
    let vehicle_id = panel_state.source_vehicle_id.clone();

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Vehicle Tuning")
        .open(&mut window_open)
        .resizable(true)
        .default_width(520.0)
        .show(ctx, |ui| {
            ui.label(format!("Active vehicle: {vehicle_id}"));
            ui.label("Apply updates the running session; Save also writes vehicles.toml.");
            ui.separator();

            for (group, fields) in TUNING_GROUPS {
                ui.collapsing(*group, |ui| {
                    for field in *fields {
                        draft_changed |= tuning_slider_row(
                            ui,
                            field.key,
                            (field.value)(&mut draft),
                            field.range.clone(),
                            field.drag_speed,
                        );
                    }
                });
            }

            ui.separator();
            ui.horizontal(|ui| {
                apply_clicked = ui.button("Apply").clicked();
                save_clicked = ui.button("Apply + Save").clicked();
                reload_clicked = ui.button("Reload from config").clicked();
            });
            if !status.is_empty() {
                ui.label(status);
            }
        });

    panel_state.visible = window_open;
    if draft_changed {
        panel_state.draft = Some(draft.clone());
    }

    if reload_clicked {
        if let Err(error) = sync_panel_state_from_config(&mut panel_state, &config) {
            panel_state.status = error;
        } else {
            panel_state.status = "Reloaded tuning from runtime config.".to_string();
        }
        return;
    }

    if apply_clicked {
        panel_state.status = match apply_vehicle_tuning_to_runtime_config(&mut config, &draft) {
            Ok(()) => format!("Applied tuning to `{}` for this session.", draft.id),
            Err(error) => error,
        };
    }

    if save_clicked {
        panel_state.status = match persist_vehicle_tuning_and_reload(&mut config, &draft) {
            Ok(message) => message,
            Err(error) => error,
        };
        if let Err(error) = sync_panel_state_from_config(&mut panel_state, &config) {
            panel_state.status = error;
        }
    }
}

fn tuning_slider_row(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    slider_range: RangeInclusive<f32>,
    drag_speed: f32,
) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label(label);
        changed |= ui
            .add(egui::Slider::new(value, slider_range.clone()).show_value(false))
            .changed();
        changed |= ui
            .add(
                egui::DragValue::new(value)
                    .range(slider_range)
                    .speed(drag_speed as f64),
            )
            .changed();
    });
    changed
}

fn sync_panel_state_from_config(
    panel_state: &mut VehicleTuningPanelState,
    config: &GameConfig,
) -> Result<(), String> {
    let vehicle_id = config.game.app.default_vehicle.clone();
    let Some(vehicle) = config.vehicles_by_id.get(&vehicle_id) else {
        return Err(format!(
            "Vehicle tuning panel: default vehicle `{vehicle_id}` not found in config."
        ));
    };

    panel_state.source_vehicle_id = vehicle_id;
    panel_state.draft = Some(vehicle.clone());
    Ok(())
}

fn apply_vehicle_tuning_to_runtime_config(
    config: &mut GameConfig,
    draft: &VehicleConfig,
) -> Result<(), String> {
    let mut vehicles = config.vehicles.clone();
    let Some(vehicle) = vehicles
        .vehicles
        .iter_mut()
        .find(|vehicle| vehicle.id == draft.id)
    else {
        return Err(format!(
            "Vehicle tuning panel: runtime vehicle `{}` not found in vehicles list.",
            draft.id
        ));
    };
    *vehicle = draft.clone();

    *config = GameConfig::from_files(config.game.clone(), vehicles, config.sections.clone())
        .map_err(|error| format!("Apply rejected: {error}"))?;
    Ok(())
}

fn persist_vehicle_tuning_and_reload(
    config: &mut GameConfig,
    draft: &VehicleConfig,
) -> Result<String, String> {
    let config_dir = Path::new(CONFIG_DIR);
    let path = config_dir.join("vehicles.toml");
    let original_raw = fs::read_to_string(&path)
        .map_err(|error| format!("Failed reading `{}`: {error}", path.display()))?;
    let mut root: toml::Value = toml::from_str(&original_raw)
        .map_err(|error| format!("Failed parsing `{}`: {error}", path.display()))?;

    write_tuning_to_toml_value(&mut root, draft)?;

    let updated_raw = toml::to_string_pretty(&root)
        .map_err(|error| format!("Failed serializing vehicles TOML: {error}"))?;
    fs::write(&path, updated_raw)
        .map_err(|error| format!("Failed writing `{}`: {error}", path.display()))?;

    match GameConfig::load_from_dir(config_dir) {
        Ok(new_config) => {
            *config = new_config;
            Ok(format!("Applied tuning and saved to {}.", path.display()))
        }
        Err(error) => {
            if let Err(restore_error) = fs::write(&path, original_raw) {
                warn!("Failed restoring `{}`: {restore_error}", path.display());
            }
            Err(format!(
                "Save failed validation: {error}. Reverted `{}`.",
                path.display()
            ))
        }
    }
}

fn write_tuning_to_toml_value(root: &mut toml::Value, draft: &VehicleConfig) -> Result<(), String> {
    let Some(vehicles_array) = root.get_mut("vehicles").and_then(toml::Value::as_array_mut) else {
        return Err("vehicles.toml: missing or invalid `vehicles` array".to_string());
    };

    let Some(vehicle_table) = vehicles_array.iter_mut().find_map(|vehicle_value| {
        let table = vehicle_value.as_table_mut()?;
        if table.get("id").and_then(toml::Value::as_str) == Some(draft.id.as_str()) {
            Some(table)
        } else {
            None
        }
    }) else {
        return Err(format!(
            "vehicles.toml: could not find vehicle with id `{}`",
            draft.id
        ));
    };

    let mut draft = draft.clone();
    for (_, fields) in TUNING_GROUPS {
        for field in *fields {
            set_toml_float(vehicle_table, field.key, *(field.value)(&mut draft))?;
        }
    }
    Ok(())
}

fn set_toml_float(
    table: &mut toml::map::Map<String, toml::Value>,
    key: &str,
    value: f32,
) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("`{key}` is not a finite number"));
    }

    table.insert(key.to_string(), toml::Value::Float(value as f64));
    Ok(())
}

fn keybind_overlay_text() -> &'static str {
    "Keybinds\n\
H - Toggle this panel\n\
V - Toggle vehicle tuning panel\n\
F5 - Hot-reload config\n\
F9 - Log frame snapshot as JSON\n\
R - Reset vehicle to spawn\n\
W / Up - Accelerate\n\
S / Down - Brake / reverse\n\
A D / Left Right - Steer\n\
E - Explore nearby section\n\
Q / Esc - Close panel\n\
Shift + Esc - Leave drive mode"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{sample_config, sample_vehicle};

    const VEHICLES_TOML: &str = r#"
[[vehicles]]
id = "coupe"
max_speed = 40.0
friction = 0.985
color = [0.8, 0.0, 0.0]

[[vehicles]]
id = "truck"
max_speed = 25.0
"#;

    #[test]
    fn tuning_rows_write_only_the_target_vehicle() {
        let mut root: toml::Value = toml::from_str(VEHICLES_TOML).expect("fixture should parse");
        let mut draft = sample_vehicle();
        draft.max_speed = 55.5;
        draft.turn_speed = 0.05;

        write_tuning_to_toml_value(&mut root, &draft).expect("write should succeed");

        let vehicles = root["vehicles"].as_array().expect("vehicles array");
        assert_eq!(vehicles[0]["max_speed"].as_float(), Some(55.5));
        assert!(vehicles[0]["turn_speed"].as_float().is_some());
        assert!(vehicles[0]["color"].is_array());
        assert_eq!(vehicles[1]["max_speed"].as_float(), Some(25.0));
        assert!(vehicles[1].get("turn_speed").is_none());
    }

    #[test]
    fn unknown_vehicle_is_reported() {
        let mut root: toml::Value = toml::from_str(VEHICLES_TOML).expect("fixture should parse");
        let mut draft = sample_vehicle();
        draft.id = "hovercraft".to_string();

        let error = write_tuning_to_toml_value(&mut root, &draft).expect_err("should fail");
        assert!(error.contains("hovercraft"));
    }

    #[test]
    fn apply_updates_both_vehicle_tables() {
        let mut config = sample_config();
        let mut draft = sample_vehicle();
        draft.max_speed = 52.0;

        apply_vehicle_tuning_to_runtime_config(&mut config, &draft).expect("apply should succeed");

        assert_eq!(config.vehicles_by_id["coupe"].max_speed, 52.0);
        assert_eq!(config.vehicles.vehicles[0].max_speed, 52.0);
    }

    #[test]
    fn apply_rejects_tuning_that_fails_validation() {
        let mut config = sample_config();
        let mut draft = sample_vehicle();
        draft.reverse_fraction = -2.0;

        let error = apply_vehicle_tuning_to_runtime_config(&mut config, &draft)
            .expect_err("negative reverse fraction should be rejected");

        assert!(error.contains("reverse_fraction"));
        assert_eq!(config.vehicles_by_id["coupe"].reverse_fraction, 0.3);
        assert_eq!(config.vehicles.vehicles[0].reverse_fraction, 0.3);
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut table = toml::map::Map::new();
        assert!(set_toml_float(&mut table, "friction", f32::NAN).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn overlay_text_reports_nearest_and_faults() {
        let snapshot = FrameSnapshot {
            fault_count: 2,
            nearest: Some(crate::gameplay::session::NearestSection {
                index: 1,
                id: "projects".to_string(),
                title: "Projects".to_string(),
                description: String::new(),
            }),
            ..default()
        };

        let text = debug_overlay_text(59.9, &snapshot, &FrameLoop::default(), &InputState::default());

        assert!(text.contains("Nearest: projects"));
        assert!(text.contains("Faults: 2"));
        assert!(text.contains("Panel: closed"));
    }
}
