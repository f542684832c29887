use crate::config::GameConfig;
use crate::states::GameState;
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, CursorOptions, PrimaryWindow};

const TOUCH_BUTTON_IDLE_ALPHA: f32 = 0.10;
const TOUCH_BUTTON_ACTIVE_ALPHA: f32 = 0.26;
const DRIVE_STRIP_HEIGHT_FRACTION: f32 = 0.28;
const ACTION_BUTTON_WIDTH_FRACTION: f32 = 0.22;
const ACTION_BUTTON_HEIGHT_FRACTION: f32 = 0.14;

pub struct WebSupportPlugin;

impl Plugin for WebSupportPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<VirtualControlState>()
            .init_resource::<WebRuntimeState>()
            .add_systems(Startup, configure_primary_window_for_web)
            .add_systems(
                Update,
                sync_web_runtime_state.run_if(resource_exists::<GameConfig>),
            )
            .add_systems(OnEnter(GameState::Driving), spawn_touch_controls_ui)
            .add_systems(
                OnExit(GameState::Driving),
                (cleanup_web_ui, reset_virtual_controls),
            )
            .add_systems(
                Update,
                (
                    update_virtual_controls_from_pointer_and_touch,
                    update_touch_controls_ui,
                )
                    .chain()
                    .before(crate::input::DriveInputSet)
                    .run_if(in_state(GameState::Driving)),
            );
    }
}

#[derive(Resource, Debug, Clone, Copy)]
pub struct WebRuntimeState {
    pub active: bool,
    pub show_touch_controls: bool,
}

impl Default for WebRuntimeState {
    fn default() -> Self {
        Self {
            active: cfg!(target_arch = "wasm32"),
            show_touch_controls: true,
        }
    }
}

#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VirtualControlState {
    pub accelerate: bool,
    pub reverse: bool,
    pub steer_left: bool,
    pub steer_right: bool,
    pub interact: bool,
    pub exit: bool,
    pub interact_just_pressed: bool,
    pub exit_just_pressed: bool,
}

#[derive(Component)]
struct WebTouchControlsRoot;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchControlLane {
    SteerLeft,
    SteerRight,
    Reverse,
    Accelerate,
    Interact,
    Exit,
}

impl TouchControlLane {
    fn label(self) -> &'static str {
        match self {
            Self::SteerLeft => "LEFT",
            Self::SteerRight => "RIGHT",
            Self::Reverse => "REV",
            Self::Accelerate => "GAS",
            Self::Interact => "EXPLORE",
            Self::Exit => "EXIT",
        }
    }
}

#[derive(Component)]
struct TouchControlButton {
    lane: TouchControlLane,
}

pub fn touch_lane_at(position: Vec2, window_size: Vec2) -> Option<TouchControlLane> {
    let size = window_size.max(Vec2::ONE);
    let normalized = position / size;

    if normalized.y >= 1.0 - DRIVE_STRIP_HEIGHT_FRACTION {
        let lane = match (normalized.x * 4.0).floor() as i32 {
            i32::MIN..=0 => TouchControlLane::SteerLeft,
            1 => TouchControlLane::SteerRight,
            2 => TouchControlLane::Reverse,
            _ => TouchControlLane::Accelerate,
        };
        return Some(lane);
    }

    if normalized.y <= ACTION_BUTTON_HEIGHT_FRACTION {
        if normalized.x >= 1.0 - ACTION_BUTTON_WIDTH_FRACTION {
            return Some(TouchControlLane::Interact);
        }
        if normalized.x <= ACTION_BUTTON_WIDTH_FRACTION {
            return Some(TouchControlLane::Exit);
        }
    }
    None
}

#[cfg(target_arch = "wasm32")]
fn configure_primary_window_for_web(mut window_query: Query<&mut Window, With<PrimaryWindow>>) {
    let Ok(mut window) = window_query.single_mut() else {
        return;
    };
    window.fit_canvas_to_parent = true;
    window.prevent_default_event_handling = true;
}

#[cfg(not(target_arch = "wasm32"))]
fn configure_primary_window_for_web() {}

fn sync_web_runtime_state(config: Res<GameConfig>, mut runtime_state: ResMut<WebRuntimeState>) {
    runtime_state.active = config.is_web_mode_active();
    runtime_state.show_touch_controls = config.game.web.show_touch_controls;
}

fn spawn_touch_controls_ui(
    mut commands: Commands,
    existing_query: Query<Entity, With<WebTouchControlsRoot>>,
) {
    if !existing_query.is_empty() {
        return;
    }

    commands
        .spawn((
            Name::new("WebTouchControlsRoot"),
            WebTouchControlsRoot,
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(0.0),
                right: Val::Px(0.0),
                top: Val::Px(0.0),
                bottom: Val::Px(0.0),
                ..default()
            },
            Visibility::Hidden,
            ZIndex(260),
        ))
        .with_children(|parent| {
            let drive_lanes = [
                TouchControlLane::SteerLeft,
                TouchControlLane::SteerRight,
                TouchControlLane::Reverse,
                TouchControlLane::Accelerate,
            ];
            for (index, lane) in drive_lanes.into_iter().enumerate() {
                spawn_touch_button(
                    parent,
                    lane,
                    Node {
                        position_type: PositionType::Absolute,
                        left: Val::Percent(index as f32 * 25.0 + 0.5),
                        bottom: Val::Percent(0.5),
                        width: Val::Percent(24.0),
                        height: Val::Percent(DRIVE_STRIP_HEIGHT_FRACTION * 100.0 - 1.0),
                        ..default()
                    },
                );
            }

            for (lane, left) in [
                (TouchControlLane::Exit, 0.5),
                (
                    TouchControlLane::Interact,
                    100.0 - ACTION_BUTTON_WIDTH_FRACTION * 100.0 + 0.5,
                ),
            ] {
                spawn_touch_button(
                    parent,
                    lane,
                    Node {
                        position_type: PositionType::Absolute,
                        left: Val::Percent(left),
                        top: Val::Percent(0.5),
                        width: Val::Percent(ACTION_BUTTON_WIDTH_FRACTION * 100.0 - 1.0),
                        height: Val::Percent(ACTION_BUTTON_HEIGHT_FRACTION * 100.0 - 1.0),
                        ..default()
                    },
                );
            }
        });
}

fn spawn_touch_button(parent: &mut ChildSpawnerCommands, lane: TouchControlLane, node: Node) {
    parent
        .spawn((
            Name::new(format!("WebTouchButton{lane:?}")),
            TouchControlButton { lane },
            Node {
                border: UiRect::all(Val::Px(1.0)),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..node
            },
            BackgroundColor(Color::srgba(0.08, 0.12, 0.16, TOUCH_BUTTON_IDLE_ALPHA)),
            BorderColor::all(Color::srgba(0.72, 0.80, 0.86, 0.38)),
        ))
        .with_children(|button| {
            button.spawn((
                Text::new(lane.label()),
                TextFont {
                    font_size: 22.0,
                    ..default()
                },
                TextColor(Color::srgba(0.92, 0.96, 0.99, 0.78)),
            ));
        });
}

fn cleanup_web_ui(mut commands: Commands, cleanup_query: Query<Entity, With<WebTouchControlsRoot>>) {
    for entity in &cleanup_query {
        commands.entity(entity).try_despawn();
    }
}

fn reset_virtual_controls(mut controls: ResMut<VirtualControlState>) {
    *controls = VirtualControlState::default();
}

fn update_virtual_controls_from_pointer_and_touch(
    runtime_state: Res<WebRuntimeState>,
    touches: Res<Touches>,
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    mut controls: ResMut<VirtualControlState>,
    mut window_query: Query<(&Window, &mut CursorOptions), With<PrimaryWindow>>,
) {
    let previous = *controls;
    *controls = VirtualControlState::default();

    if !runtime_state.active || !runtime_state.show_touch_controls {
        return;
    }

    let Ok((window, mut cursor_options)) = window_query.single_mut() else {
        return;
    };

    let window_size = Vec2::new(window.width(), window.height());
    let mut pointers: Vec<Vec2> = touches.iter().map(|touch| touch.position()).collect();
    if mouse_buttons.pressed(MouseButton::Left) {
        if let Some(cursor) = window.cursor_position() {
            pointers.push(cursor);
        }
    }

    for pointer in pointers {
        match touch_lane_at(pointer, window_size) {
            Some(TouchControlLane::SteerLeft) => controls.steer_left = true,
            Some(TouchControlLane::SteerRight) => controls.steer_right = true,
            Some(TouchControlLane::Reverse) => controls.reverse = true,
            Some(TouchControlLane::Accelerate) => controls.accelerate = true,
            Some(TouchControlLane::Interact) => controls.interact = true,
            Some(TouchControlLane::Exit) => controls.exit = true,
            None => {}
        }
    }

    controls.interact_just_pressed = controls.interact && !previous.interact;
    controls.exit_just_pressed = controls.exit && !previous.exit;

    let holding = controls.accelerate || controls.reverse || controls.steer_left || controls.steer_right;
    cursor_options.grab_mode = if holding {
        CursorGrabMode::Confined
    } else {
        CursorGrabMode::None
    };
}

fn update_touch_controls_ui(
    runtime_state: Res<WebRuntimeState>,
    controls: Res<VirtualControlState>,
    mut root_query: Query<&mut Visibility, With<WebTouchControlsRoot>>,
    mut button_query: Query<(&TouchControlButton, &mut BackgroundColor)>,
) {
    let Ok(mut root_visibility) = root_query.single_mut() else {
        return;
    };

    if !runtime_state.active || !runtime_state.show_touch_controls {
        *root_visibility = Visibility::Hidden;
        return;
    }
    *root_visibility = Visibility::Inherited;

    for (button, mut background) in &mut button_query {
        let pressed = match button.lane {
            TouchControlLane::SteerLeft => controls.steer_left,
            TouchControlLane::SteerRight => controls.steer_right,
            TouchControlLane::Reverse => controls.reverse,
            TouchControlLane::Accelerate => controls.accelerate,
            TouchControlLane::Interact => controls.interact,
            TouchControlLane::Exit => controls.exit,
        };
        let alpha = if pressed {
            TOUCH_BUTTON_ACTIVE_ALPHA
        } else {
            TOUCH_BUTTON_IDLE_ALPHA
        };
        *background = BackgroundColor(Color::srgba(0.10, 0.20, 0.28, alpha));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Vec2 = Vec2::new(1280.0, 720.0);

    #[test]
    fn bottom_strip_maps_to_drive_lanes() {
        let y = 700.0;
        assert_eq!(touch_lane_at(Vec2::new(10.0, y), WINDOW), Some(TouchControlLane::SteerLeft));
        assert_eq!(touch_lane_at(Vec2::new(400.0, y), WINDOW), Some(TouchControlLane::SteerRight));
        assert_eq!(touch_lane_at(Vec2::new(700.0, y), WINDOW), Some(TouchControlLane::Reverse));
        assert_eq!(touch_lane_at(Vec2::new(1279.0, y), WINDOW), Some(TouchControlLane::Accelerate));
    }

    #[test]
    fn top_corners_are_tap_buttons() {
        assert_eq!(touch_lane_at(Vec2::new(1200.0, 40.0), WINDOW), Some(TouchControlLane::Interact));
        assert_eq!(touch_lane_at(Vec2::new(60.0, 40.0), WINDOW), Some(TouchControlLane::Exit));
    }

    #[test]
    fn middle_of_screen_is_not_a_control() {
        assert_eq!(touch_lane_at(WINDOW * 0.5, WINDOW), None);
    }
}
