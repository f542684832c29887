use super::{
    renderer_is, rgb, section_color, DriveSceneEntity, RendererSelectSet, SectionVisual,
    VehicleVisual,
};
use crate::config::GameConfig;
use crate::gameplay::camera::WorldProjection;
use crate::gameplay::session::{DriveSession, DriveStepSet, FrameSnapshot};
use crate::states::{GameState, ScreenCamera};
use bevy::camera::ScalingMode;
use bevy::prelude::*;

const GROUND_Z: f32 = 0.0;
const RING_Z: f32 = 1.0;
const BUILDING_Z: f32 = 2.0;
const VEHICLE_Z: f32 = 5.0;
const LABEL_Z: f32 = 6.0;
const LABEL_SCALE: f32 = 0.08;
const RING_WIDTH: f32 = 0.4;
const DEFAULT_VEHICLE_COLOR: [f32; 3] = [0.93, 0.34, 0.24];

pub(super) struct TopDownRendererPlugin;

impl Plugin for TopDownRendererPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(GameState::Driving),
            spawn_top_down_scene
                .after(RendererSelectSet)
                .run_if(renderer_is(WorldProjection::TopDown))
                .run_if(resource_exists::<DriveSession>),
        )
        .add_systems(
            Update,
            (sync_top_down_vehicle, sync_top_down_camera, highlight_top_down_sections)
                .after(DriveStepSet)
                .run_if(in_state(GameState::Driving))
                .run_if(renderer_is(WorldProjection::TopDown)),
        );
    }
}

pub fn ground_to_screen(position: Vec2) -> Vec2 {
    Vec2::new(-position.x, position.y)
}

pub fn heading_to_screen_rotation(heading: f32) -> Quat {
    Quat::from_rotation_z(heading)
}

fn spawn_top_down_scene(
    mut commands: Commands,
    session: Res<DriveSession>,
    config: Option<Res<GameConfig>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
    mut camera_query: Query<&mut Projection, With<ScreenCamera>>,
) {
    let world = session.world();
    let view_extent = session.camera().tuning().top_down_view_extent;

    if let Ok(mut projection) = camera_query.single_mut() {
        *projection = Projection::Orthographic(OrthographicProjection {
            scaling_mode: ScalingMode::FixedVertical {
                viewport_height: view_extent.y,
            },
            ..OrthographicProjection::default_2d()
        });
    }

    let world_size = world.world_max - world.world_min;
    let world_center = ground_to_screen((world.world_min + world.world_max) * 0.5);
    commands.spawn((
        Name::new("TopDownGround"),
        DriveSceneEntity,
        Sprite::from_color(Color::srgb(0.30, 0.46, 0.28), world_size),
        Transform::from_translation(world_center.extend(GROUND_Z)),
    ));

    let drivable = world.bounds.size();
    let drivable_center = ground_to_screen((world.bounds.min + world.bounds.max) * 0.5);
    commands.spawn((
        Name::new("TopDownDrivableArea"),
        DriveSceneEntity,
        Sprite::from_color(Color::srgb(0.36, 0.52, 0.33), drivable),
        Transform::from_translation(drivable_center.extend(GROUND_Z + 0.1)),
    ));

    let ring_material = materials.add(ColorMaterial::from(Color::srgba(0.98, 0.85, 0.35, 0.45)));
    for (index, section) in world.catalog.sections.iter().enumerate() {
        let screen = ground_to_screen(section.position);
        let inner = (section.activation_radius - RING_WIDTH).max(0.0);
        commands.spawn((
            Name::new(format!("TopDownRing{}", section.id)),
            DriveSceneEntity,
            Mesh2d(meshes.add(Annulus::new(inner, section.activation_radius))),
            MeshMaterial2d(ring_material.clone()),
            Transform::from_translation(screen.extend(RING_Z)),
        ));

        commands.spawn((
            Name::new(format!("TopDownSection{}", section.id)),
            DriveSceneEntity,
            SectionVisual { index },
            Sprite::from_color(rgb(section.color), section.footprint.half_extents * 2.0),
            Transform::from_translation(screen.extend(BUILDING_Z)),
        ));

        commands.spawn((
            Name::new(format!("TopDownLabel{}", section.id)),
            DriveSceneEntity,
            Text2d::new(section.label.clone()),
            TextFont {
                font_size: 24.0,
                ..default()
            },
            TextColor(Color::srgb(0.98, 0.98, 0.96)),
            Transform::from_translation(screen.extend(LABEL_Z)).with_scale(Vec3::splat(LABEL_SCALE)),
        ));
    }

    for building in &world.catalog.scenery {
        commands.spawn((
            Name::new("TopDownScenery"),
            DriveSceneEntity,
            Sprite::from_color(rgb(building.color), building.footprint.half_extents * 2.0),
            Transform::from_translation(
                ground_to_screen(building.footprint.center).extend(BUILDING_Z - 0.1),
            ),
        ));
    }

    let vehicle_color = config
        .as_deref()
        .and_then(GameConfig::active_vehicle)
        .map(|vehicle| vehicle.color)
        .unwrap_or(DEFAULT_VEHICLE_COLOR);
    let half_size = session.vehicle().tuning().half_size;
    let state = session.vehicle().state();
    commands
        .spawn((
            Name::new("TopDownVehicle"),
            DriveSceneEntity,
            VehicleVisual,
            Sprite::from_color(rgb(vehicle_color), half_size * 2.0),
            Transform::from_translation(ground_to_screen(state.position).extend(VEHICLE_Z))
                .with_rotation(heading_to_screen_rotation(state.heading)),
        ))
        .with_children(|parent| {
            parent.spawn((
                Name::new("TopDownWindshield"),
                Sprite::from_color(
                    Color::srgb(0.75, 0.88, 0.96),
                    Vec2::new(half_size.x * 1.4, half_size.y * 0.35),
                ),
                Transform::from_xyz(0.0, half_size.y * 0.35, 0.1),
            ));
        });

    info!(
        "Top-down scene spawned: {} sections, {} scenery buildings.",
        world.catalog.sections.len(),
        world.catalog.scenery.len()
    );
}

fn sync_top_down_vehicle(
    snapshot: Res<FrameSnapshot>,
    mut vehicle_query: Query<&mut Transform, With<VehicleVisual>>,
) {
    if !snapshot.active {
        return;
    }
    let Ok(mut transform) = vehicle_query.single_mut() else {
        return;
    };

    let screen = ground_to_screen(Vec2::from(snapshot.position));
    transform.translation = screen.extend(VEHICLE_Z);
    transform.rotation = heading_to_screen_rotation(snapshot.heading);
}

fn sync_top_down_camera(
    snapshot: Res<FrameSnapshot>,
    mut camera_query: Query<&mut Transform, With<ScreenCamera>>,
) {
    if !snapshot.active {
        return;
    }
    let Ok(mut transform) = camera_query.single_mut() else {
        return;
    };

    let [x, _, z] = snapshot.camera.eye;
    let center = ground_to_screen(Vec2::new(x, z));
    transform.translation.x = center.x;
    transform.translation.y = center.y;
}

fn highlight_top_down_sections(
    snapshot: Res<FrameSnapshot>,
    session: Option<Res<DriveSession>>,
    mut section_query: Query<(&SectionVisual, &mut Sprite)>,
) {
    let Some(session) = session else {
        return;
    };
    let nearest = snapshot.nearest.as_ref().map(|nearest| nearest.index);

    for (visual, mut sprite) in &mut section_query {
        let Some(section) = session.world().catalog.get(visual.index) else {
            continue;
        };
        sprite.color = section_color(section.color, nearest == Some(visual.index));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameplay::vehicle::VehicleState;

    #[test]
    fn screen_mapping_mirrors_x_only() {
        assert_eq!(ground_to_screen(Vec2::new(3.0, 4.0)), Vec2::new(-3.0, 4.0));
    }

    #[test]
    fn rotated_sprite_points_along_the_mirrored_heading() {
        for heading in [0.0, 0.7, -1.9, 3.0] {
            let state = VehicleState::at_rest(Vec2::ZERO, heading);
            let expected = ground_to_screen(state.forward());
            let rotated = (heading_to_screen_rotation(heading) * Vec3::Y).truncate();

            assert!((rotated - expected).length() < 1.0e-5, "heading {heading}");
        }
    }
}
