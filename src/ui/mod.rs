use crate::config::GameConfig;
use crate::gameplay::interaction::InteractionEvent;
use crate::gameplay::session::{DriveSession, DriveStartSet, DriveStepSet, FrameSnapshot};
use crate::states::GameState;
use bevy::prelude::*;

const HUD_PANEL_Z_INDEX: i32 = 190;
const CONTENT_PANEL_Z_INDEX: i32 = 230;
const HUD_PANEL_BG: Color = Color::srgba(0.06, 0.09, 0.12, 0.86);
const HUD_PANEL_BORDER: Color = Color::srgba(0.58, 0.68, 0.76, 0.92);
const HUD_TEXT_PRIMARY: Color = Color::srgb(0.94, 0.97, 1.0);
const HUD_TEXT_MUTED: Color = Color::srgb(0.76, 0.83, 0.9);
const HUD_TEXT_WARNING: Color = Color::srgb(1.0, 0.36, 0.28);
const HUD_FUEL_BAR_WIDTH_PX: f32 = 180.0;
const MINIMAP_SIZE_PX: f32 = 180.0;
const MINIMAP_DOT_PX: f32 = 8.0;
const TOAST_SECONDS: f32 = 2.5;

pub struct GameHudPlugin;

impl Plugin for GameHudPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<HudToast>()
            .add_systems(
                OnEnter(GameState::Driving),
                spawn_game_hud
                    .after(DriveStartSet)
                    .run_if(resource_exists::<DriveSession>),
            )
            .add_systems(OnExit(GameState::Driving), cleanup_game_hud)
            .add_systems(
                Update,
                (
                    track_interaction_events,
                    update_game_hud,
                    update_content_panel,
                    update_minimap,
                )
                    .chain()
                    .after(DriveStepSet)
                    .run_if(in_state(GameState::Driving)),
            );
    }
}

#[derive(Component)]
struct GameHudRoot;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
enum HudTextKind {
    Speed,
    Fuel,
    Prompt,
    PromptDescription,
    Toast,
}

#[derive(Component)]
struct HudFuelFill;

#[derive(Component)]
struct HudPromptPanel;

#[derive(Component)]
struct ContentPanelRoot;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
enum ContentPanelText {
    Title,
    Body,
}

#[derive(Component)]
struct MinimapRoot;

#[derive(Component)]
struct MinimapSectionDot {
    index: usize,
}

#[derive(Component)]
struct MinimapVehicleDot;

#[derive(Resource, Debug, Clone, Default)]
struct HudToast {
    text: String,
    remaining_s: f32,
}

pub fn speed_label(snapshot: &FrameSnapshot) -> String {
    format!("{} km/h [{}]", snapshot.speed_kmh, snapshot.gear.label())
}

pub fn fuel_label(snapshot: &FrameSnapshot) -> String {
    let percent = snapshot.fuel.round() as i32;
    if snapshot.low_fuel {
        format!("FUEL {percent}% LOW")
    } else {
        format!("FUEL {percent}%")
    }
}

pub fn explore_prompt(snapshot: &FrameSnapshot) -> Option<(String, String)> {
    if snapshot.panel.is_some() {
        return None;
    }
    snapshot.nearest.as_ref().map(|nearest| {
        (
            format!("Press E to explore {}", nearest.title),
            nearest.description.clone(),
        )
    })
}

pub fn minimap_percent(position: Vec2, world_min: Vec2, world_max: Vec2) -> Vec2 {
    let size = (world_max - world_min).max(Vec2::splat(f32::EPSILON));
    let left = (world_max.x - position.x) / size.x;
    let top = (world_max.y - position.y) / size.y;
    Vec2::new(left, top).clamp(Vec2::ZERO, Vec2::ONE) * 100.0
}

fn spawn_game_hud(
    mut commands: Commands,
    session: Res<DriveSession>,
    config: Option<Res<GameConfig>>,
    existing_hud: Query<Entity, With<GameHudRoot>>,
) {
    if !existing_hud.is_empty() {
        return;
    }
    let show_minimap = config
        .as_ref()
        .is_none_or(|config| config.game.render.show_minimap);

    commands
        .spawn((
            Name::new("GameHudRoot"),
            GameHudRoot,
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(0.0),
                right: Val::Px(0.0),
                top: Val::Px(0.0),
                bottom: Val::Px(0.0),
                ..default()
            },
            ZIndex(HUD_PANEL_Z_INDEX),
        ))
        .with_children(|root| {
            root.spawn((
                Name::new("GameHudDrivePanel"),
                Node {
                    position_type: PositionType::Absolute,
                    left: Val::Px(12.0),
                    top: Val::Px(10.0),
                    flex_direction: FlexDirection::Column,
                    row_gap: Val::Px(6.0),
                    padding: UiRect::all(Val::Px(12.0)),
                    border: UiRect::all(Val::Px(1.0)),
                    ..default()
                },
                BackgroundColor(HUD_PANEL_BG),
                BorderColor::all(HUD_PANEL_BORDER),
            ))
            .with_children(|panel| {
                panel.spawn((
                    HudTextKind::Speed,
                    Text::new("0 km/h [D]"),
                    TextFont {
                        font_size: 30.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_PRIMARY),
                ));
                panel.spawn((
                    HudTextKind::Fuel,
                    Text::new("FUEL 100%"),
                    TextFont {
                        font_size: 16.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_MUTED),
                ));
                panel
                    .spawn((
                        Node {
                            width: Val::Px(HUD_FUEL_BAR_WIDTH_PX),
                            height: Val::Px(10.0),
                            border: UiRect::all(Val::Px(1.0)),
                            ..default()
                        },
                        BackgroundColor(Color::srgba(0.02, 0.03, 0.05, 0.9)),
                        BorderColor::all(HUD_PANEL_BORDER),
                    ))
                    .with_children(|bar| {
                        bar.spawn((
                            HudFuelFill,
                            Node {
                                width: Val::Px(HUD_FUEL_BAR_WIDTH_PX),
                                height: Val::Percent(100.0),
                                ..default()
                            },
                            BackgroundColor(Color::srgb(0.25, 0.85, 0.35)),
                        ));
                    });
                panel.spawn((
                    HudTextKind::Toast,
                    Text::new(""),
                    TextFont {
                        font_size: 14.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_MUTED),
                ));
            });

            root.spawn((
                Name::new("GameHudPrompt"),
                HudPromptPanel,
                Node {
                    position_type: PositionType::Absolute,
                    left: Val::Percent(30.0),
                    right: Val::Percent(30.0),
                    bottom: Val::Percent(32.0),
                    flex_direction: FlexDirection::Column,
                    align_items: AlignItems::Center,
                    row_gap: Val::Px(4.0),
                    padding: UiRect::all(Val::Px(10.0)),
                    border: UiRect::all(Val::Px(1.0)),
                    ..default()
                },
                BackgroundColor(HUD_PANEL_BG),
                BorderColor::all(HUD_PANEL_BORDER),
                Visibility::Hidden,
            ))
            .with_children(|prompt| {
                prompt.spawn((
                    HudTextKind::Prompt,
                    Text::new(""),
                    TextFont {
                        font_size: 22.0,
                        ..default()
                    },
                    TextColor(Color::srgb(0.98, 0.80, 0.35)),
                ));
                prompt.spawn((
                    HudTextKind::PromptDescription,
                    Text::new(""),
                    TextFont {
                        font_size: 15.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_MUTED),
                ));
            });

            root.spawn((
                Name::new("ContentPanel"),
                ContentPanelRoot,
                Node {
                    position_type: PositionType::Absolute,
                    left: Val::Percent(15.0),
                    right: Val::Percent(15.0),
                    top: Val::Percent(12.0),
                    bottom: Val::Percent(12.0),
                    flex_direction: FlexDirection::Column,
                    row_gap: Val::Px(14.0),
                    padding: UiRect::all(Val::Px(24.0)),
                    border: UiRect::all(Val::Px(2.0)),
                    ..default()
                },
                BackgroundColor(Color::srgba(0.04, 0.06, 0.10, 0.95)),
                BorderColor::all(HUD_PANEL_BORDER),
                ZIndex(CONTENT_PANEL_Z_INDEX),
                Visibility::Hidden,
            ))
            .with_children(|panel| {
                panel.spawn((
                    ContentPanelText::Title,
                    Text::new(""),
                    TextFont {
                        font_size: 32.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_PRIMARY),
                ));
                panel.spawn((
                    ContentPanelText::Body,
                    Text::new(""),
                    TextFont {
                        font_size: 18.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_MUTED),
                ));
                panel.spawn((
                    Text::new("Q / Esc to close"),
                    TextFont {
                        font_size: 15.0,
                        ..default()
                    },
                    TextColor(Color::srgb(0.98, 0.80, 0.35)),
                ));
            });

            if show_minimap {
                spawn_minimap(root, &session);
            }
        });
}

fn spawn_minimap(root: &mut ChildSpawnerCommands, session: &DriveSession) {
    let world = session.world();
    root.spawn((
        Name::new("Minimap"),
        MinimapRoot,
        Node {
            position_type: PositionType::Absolute,
            right: Val::Px(12.0),
            top: Val::Px(10.0),
            width: Val::Px(MINIMAP_SIZE_PX),
            height: Val::Px(MINIMAP_SIZE_PX),
            border: UiRect::all(Val::Px(1.0)),
            ..default()
        },
        BackgroundColor(Color::srgba(0.10, 0.20, 0.12, 0.75)),
        BorderColor::all(HUD_PANEL_BORDER),
    ))
    .with_children(|map| {
        for (index, section) in world.catalog.sections.iter().enumerate() {
            let at = minimap_percent(section.position, world.world_min, world.world_max);
            map.spawn((
                MinimapSectionDot { index },
                Node {
                    position_type: PositionType::Absolute,
                    left: Val::Percent(at.x),
                    top: Val::Percent(at.y),
                    width: Val::Px(MINIMAP_DOT_PX),
                    height: Val::Px(MINIMAP_DOT_PX),
                    margin: UiRect::all(Val::Px(-MINIMAP_DOT_PX * 0.5)),
                    ..default()
                },
                BackgroundColor(Color::srgb(
                    section.color[0],
                    section.color[1],
                    section.color[2],
                )),
                BorderColor::all(Color::WHITE),
            ));
        }

        map.spawn((
            MinimapVehicleDot,
            Node {
                position_type: PositionType::Absolute,
                width: Val::Px(MINIMAP_DOT_PX),
                height: Val::Px(MINIMAP_DOT_PX),
                margin: UiRect::all(Val::Px(-MINIMAP_DOT_PX * 0.5)),
                ..default()
            },
            BackgroundColor(Color::WHITE),
        ));
    });
}

fn cleanup_game_hud(
    mut commands: Commands,
    hud_query: Query<Entity, With<GameHudRoot>>,
    mut toast: ResMut<HudToast>,
) {
    for entity in &hud_query {
        commands.entity(entity).try_despawn();
    }
    *toast = HudToast::default();
}

fn track_interaction_events(
    time: Res<Time>,
    mut events: MessageReader<InteractionEvent>,
    mut toast: ResMut<HudToast>,
) {
    toast.remaining_s = (toast.remaining_s - time.delta_secs()).max(0.0);
    for event in events.read() {
        let text = match event {
            InteractionEvent::Opened { section_id, title } => {
                info!("Opened section panel `{section_id}`.");
                format!("Exploring {title}")
            }
            InteractionEvent::Closed { section_id } => {
                info!("Closed section panel `{section_id}`.");
                "Back on the road".to_string()
            }
        };
        toast.text = text;
        toast.remaining_s = TOAST_SECONDS;
    }
}

fn update_game_hud(
    snapshot: Res<FrameSnapshot>,
    toast: Res<HudToast>,
    mut text_query: Query<(&HudTextKind, &mut Text, &mut TextColor)>,
    mut fuel_fill_query: Query<(&mut Node, &mut BackgroundColor), With<HudFuelFill>>,
    mut prompt_query: Query<&mut Visibility, With<HudPromptPanel>>,
) {
    let prompt = explore_prompt(&snapshot);
    if let Ok(mut visibility) = prompt_query.single_mut() {
        *visibility = if prompt.is_some() {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }

    let fuel_fraction = (snapshot.fuel / 100.0).clamp(0.0, 1.0);
    if let Ok((mut bar_node, mut bar_color)) = fuel_fill_query.single_mut() {
        bar_node.width = Val::Px(HUD_FUEL_BAR_WIDTH_PX * fuel_fraction);
        *bar_color = if snapshot.low_fuel {
            BackgroundColor(HUD_TEXT_WARNING)
        } else {
            BackgroundColor(Color::srgb(0.25, 0.85, 0.35))
        };
    }

    for (kind, mut text, mut color) in &mut text_query {
        let label = match kind {
            HudTextKind::Speed => speed_label(&snapshot),
            HudTextKind::Fuel => {
                color.0 = if snapshot.low_fuel {
                    HUD_TEXT_WARNING
                } else {
                    HUD_TEXT_MUTED
                };
                fuel_label(&snapshot)
            }
            HudTextKind::Prompt => prompt
                .as_ref()
                .map(|(line, _)| line.clone())
                .unwrap_or_default(),
            HudTextKind::PromptDescription => prompt
                .as_ref()
                .map(|(_, description)| description.clone())
                .unwrap_or_default(),
            HudTextKind::Toast => {
                if toast.remaining_s > 0.0 {
                    toast.text.clone()
                } else {
                    String::new()
                }
            }
        };
        if text.0 != label {
            text.0 = label;
        }
    }
}

fn update_content_panel(
    snapshot: Res<FrameSnapshot>,
    mut root_query: Query<&mut Visibility, With<ContentPanelRoot>>,
    mut text_query: Query<(&ContentPanelText, &mut Text)>,
) {
    let Ok(mut visibility) = root_query.single_mut() else {
        return;
    };
    let Some(panel) = &snapshot.panel else {
        *visibility = Visibility::Hidden;
        return;
    };
    *visibility = Visibility::Inherited;

    for (kind, mut text) in &mut text_query {
        let label = match kind {
            ContentPanelText::Title => &panel.content.title,
            ContentPanelText::Body => &panel.content.body,
        };
        if &text.0 != label {
            text.0 = label.clone();
        }
    }
}

fn update_minimap(
    snapshot: Res<FrameSnapshot>,
    session: Option<Res<DriveSession>>,
    mut vehicle_dot_query: Query<&mut Node, With<MinimapVehicleDot>>,
    mut section_dot_query: Query<(&MinimapSectionDot, &mut Node), Without<MinimapVehicleDot>>,
) {
    let Some(session) = session else {
        return;
    };
    let world = session.world();

    if let Ok(mut node) = vehicle_dot_query.single_mut() {
        let at = minimap_percent(Vec2::from(snapshot.position), world.world_min, world.world_max);
        node.left = Val::Percent(at.x);
        node.top = Val::Percent(at.y);
    }

    let nearest = snapshot.nearest.as_ref().map(|nearest| nearest.index);
    for (dot, mut node) in &mut section_dot_query {
        let border = if nearest == Some(dot.index) { 2.0 } else { 0.0 };
        node.border = UiRect::all(Val::Px(border));
    }
}
