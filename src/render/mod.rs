mod chase;
mod top_down;

use crate::gameplay::camera::WorldProjection;
use crate::gameplay::sections::BuildingKind;
use crate::gameplay::session::{DriveSession, DriveStartSet};
use crate::states::{GameState, ScreenCamera};
use bevy::prelude::*;
use chase::ChaseRendererPlugin;
use top_down::TopDownRendererPlugin;

const HIGHLIGHT_LIGHTEN: f32 = 0.35;

pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(GameState::Driving),
            select_renderer
                .in_set(RendererSelectSet)
                .after(DriveStartSet)
                .run_if(resource_exists::<DriveSession>),
        )
        .add_systems(
            OnExit(GameState::Driving),
            (cleanup_drive_scene, restore_screen_camera),
        )
        .add_plugins((TopDownRendererPlugin, ChaseRendererPlugin));
    }
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct RendererSelectSet;

#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveRenderer(pub WorldProjection);

#[derive(Component)]
pub struct DriveSceneEntity;

#[derive(Component, Debug, Clone, Copy)]
pub struct SectionVisual {
    pub index: usize,
}

#[derive(Component)]
pub struct VehicleVisual;

pub fn renderer_is(projection: WorldProjection) -> impl FnMut(Option<Res<ActiveRenderer>>) -> bool + Clone {
    move |active: Option<Res<ActiveRenderer>>| active.is_some_and(|active| active.0 == projection)
}

fn select_renderer(mut commands: Commands, session: Res<DriveSession>) {
    let projection = session.camera().projection();
    commands.insert_resource(ActiveRenderer(projection));
    info!("Drive renderer: {projection:?}");
}

fn cleanup_drive_scene(mut commands: Commands, scene_query: Query<Entity, With<DriveSceneEntity>>) {
    for entity in &scene_query {
        commands.entity(entity).try_despawn();
    }
    commands.remove_resource::<ActiveRenderer>();
}

fn restore_screen_camera(
    mut camera_query: Query<(&mut Camera, &mut Projection, &mut Transform), With<ScreenCamera>>,
) {
    let Ok((mut camera, mut projection, mut transform)) = camera_query.single_mut() else {
        return;
    };
    *camera = Camera::default();
    *projection = Projection::Orthographic(OrthographicProjection::default_2d());
    *transform = Transform::default();
}

pub fn rgb(color: [f32; 3]) -> Color {
    Color::srgb(color[0], color[1], color[2])
}

pub fn section_color(base: [f32; 3], highlighted: bool) -> Color {
    if !highlighted {
        return rgb(base);
    }
    let lift = |channel: f32| channel + (1.0 - channel) * HIGHLIGHT_LIGHTEN;
    Color::srgb(lift(base[0]), lift(base[1]), lift(base[2]))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildingDressing {
    pub rooftop_fraction: Option<f32>,
    pub antenna: bool,
    pub awning: bool,
    pub trees: usize,
    pub accent: Color,
}

pub fn building_dressing(kind: BuildingKind) -> BuildingDressing {
    let plain = BuildingDressing {
        rooftop_fraction: None,
        antenna: false,
        awning: false,
        trees: 0,
        accent: Color::srgb(0.55, 0.58, 0.62),
    };
    match kind {
        BuildingKind::Office => BuildingDressing {
            rooftop_fraction: Some(0.4),
            ..plain
        },
        BuildingKind::Corporate => BuildingDressing {
            rooftop_fraction: Some(0.5),
            antenna: true,
            accent: Color::srgb(0.40, 0.46, 0.55),
            ..plain
        },
        BuildingKind::Tech => BuildingDressing {
            rooftop_fraction: Some(0.3),
            antenna: true,
            accent: Color::srgb(0.25, 0.75, 0.90),
            ..plain
        },
        BuildingKind::Residential => BuildingDressing {
            accent: Color::srgb(0.62, 0.30, 0.22),
            ..plain
        },
        BuildingKind::Shop => BuildingDressing {
            awning: true,
            accent: Color::srgb(0.90, 0.35, 0.30),
            ..plain
        },
        BuildingKind::Park => BuildingDressing {
            trees: 4,
            accent: Color::srgb(0.20, 0.55, 0.25),
            ..plain
        },
    }
}
