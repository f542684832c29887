use super::{
    building_dressing, renderer_is, rgb, section_color, DriveSceneEntity, RendererSelectSet,
    SectionVisual, VehicleVisual,
};
use crate::config::GameConfig;
use crate::gameplay::bounds::Footprint;
use crate::gameplay::camera::{ground_to_world, WorldProjection};
use crate::gameplay::sections::BuildingKind;
use crate::gameplay::session::{DriveSession, DriveStepSet, FrameSnapshot};
use crate::states::{GameState, ScreenCamera};
use bevy::prelude::*;
use std::f32::consts::FRAC_PI_2;

const SKY_COLOR: Color = Color::srgb(0.53, 0.81, 0.92);
const WHEEL_RADIUS: f32 = 0.45;
const WHEEL_WIDTH: f32 = 0.35;
const BODY_HEIGHT: f32 = 0.9;
const CABIN_HEIGHT: f32 = 0.7;
const ANTENNA_HEIGHT: f32 = 3.0;
const LABEL_HEIGHT_OFFSET: f32 = 3.0;
const DEFAULT_VEHICLE_COLOR: [f32; 3] = [0.80, 0.0, 0.0];

pub(super) struct ChaseRendererPlugin;

impl Plugin for ChaseRendererPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(GameState::Driving),
            spawn_chase_scene
                .after(RendererSelectSet)
                .run_if(renderer_is(WorldProjection::Chase))
                .run_if(resource_exists::<DriveSession>),
        )
        .add_systems(
            Update,
            (
                sync_chase_vehicle,
                sync_chase_camera,
                highlight_chase_sections,
                place_section_labels,
            )
                .chain()
                .after(DriveStepSet)
                .run_if(in_state(GameState::Driving))
                .run_if(renderer_is(WorldProjection::Chase)),
        );
    }
}

#[derive(Component)]
struct ChaseCamera;

#[derive(Component)]
struct FrontWheel;

#[derive(Component)]
struct SectionMaterial(Handle<StandardMaterial>);

#[derive(Component)]
struct ChaseSectionLabel {
    anchor: Vec3,
}

pub fn heading_to_world_rotation(heading: f32) -> Quat {
    Quat::from_rotation_y(heading)
}

fn spawn_chase_scene(
    mut commands: Commands,
    session: Res<DriveSession>,
    config: Option<Res<GameConfig>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut screen_camera_query: Query<&mut Camera, With<ScreenCamera>>,
) {
    if let Ok(mut screen_camera) = screen_camera_query.single_mut() {
        screen_camera.order = 1;
        screen_camera.clear_color = bevy::camera::ClearColorConfig::None;
    }

    let world = session.world();
    let camera = session.camera().state();
    commands.spawn((
        Name::new("ChaseCamera"),
        DriveSceneEntity,
        ChaseCamera,
        Camera3d::default(),
        Camera {
            order: 0,
            clear_color: bevy::camera::ClearColorConfig::Custom(SKY_COLOR),
            ..default()
        },
        Projection::Perspective(PerspectiveProjection {
            fov: camera.fov_degrees.to_radians(),
            ..default()
        }),
        DistanceFog {
            color: SKY_COLOR,
            falloff: FogFalloff::Linear {
                start: camera.fog_near,
                end: camera.fog_far,
            },
            ..default()
        },
        Transform::from_translation(camera.rendered_eye()).looking_at(camera.look_at, Vec3::Y),
    ));

    commands.spawn((
        Name::new("ChaseSun"),
        DriveSceneEntity,
        DirectionalLight {
            illuminance: 12_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(50.0, 100.0, 50.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    let world_size = world.world_max - world.world_min;
    let world_center = (world.world_min + world.world_max) * 0.5;
    commands.spawn((
        Name::new("ChaseGround"),
        DriveSceneEntity,
        Mesh3d(meshes.add(Plane3d::default().mesh().size(world_size.x, world_size.y))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.30, 0.46, 0.28),
            perceptual_roughness: 1.0,
            ..default()
        })),
        Transform::from_translation(ground_to_world(world_center, 0.0)),
    ));

    let drivable = world.bounds.size();
    commands.spawn((
        Name::new("ChaseDrivableArea"),
        DriveSceneEntity,
        Mesh3d(meshes.add(Plane3d::default().mesh().size(drivable.x, drivable.y))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.36, 0.52, 0.33),
            perceptual_roughness: 1.0,
            ..default()
        })),
        Transform::from_translation(ground_to_world((world.bounds.min + world.bounds.max) * 0.5, 0.01)),
    ));

    for (index, section) in world.catalog.sections.iter().enumerate() {
        let material = materials.add(StandardMaterial {
            base_color: rgb(section.color),
            perceptual_roughness: 0.8,
            ..default()
        });
        let building = spawn_building(
            &mut commands,
            &mut meshes,
            &mut materials,
            &section.footprint,
            section.height,
            section.kind,
            material.clone(),
        );
        commands.entity(building).insert((
            Name::new(format!("ChaseSection{}", section.id)),
            SectionVisual { index },
            SectionMaterial(material),
        ));

        commands.spawn((
            Name::new(format!("ChaseLabel{}", section.id)),
            DriveSceneEntity,
            ChaseSectionLabel {
                anchor: ground_to_world(section.position, section.height + LABEL_HEIGHT_OFFSET),
            },
            Node {
                position_type: PositionType::Absolute,
                padding: UiRect::axes(Val::Px(8.0), Val::Px(4.0)),
                ..default()
            },
            BackgroundColor(Color::srgba(0.02, 0.04, 0.08, 0.65)),
            Text::new(section.label.clone()),
            TextFont {
                font_size: 16.0,
                ..default()
            },
            TextColor(Color::srgb(0.96, 0.97, 0.99)),
            Visibility::Hidden,
        ));
    }

    for scenery in &world.catalog.scenery {
        let material = materials.add(StandardMaterial {
            base_color: rgb(scenery.color),
            perceptual_roughness: 0.9,
            ..default()
        });
        let building = spawn_building(
            &mut commands,
            &mut meshes,
            &mut materials,
            &scenery.footprint,
            scenery.height,
            scenery.kind,
            material,
        );
        commands.entity(building).insert(Name::new("ChaseScenery"));
    }

    let vehicle_color = config
        .as_deref()
        .and_then(GameConfig::active_vehicle)
        .map(|vehicle| vehicle.color)
        .unwrap_or(DEFAULT_VEHICLE_COLOR);
    spawn_vehicle(
        &mut commands,
        &mut meshes,
        &mut materials,
        session.vehicle().tuning().half_size,
        rgb(vehicle_color),
    );

    info!(
        "Chase scene spawned: {} sections, {} scenery buildings.",
        world.catalog.sections.len(),
        world.catalog.scenery.len()
    );
}

fn spawn_building(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    footprint: &Footprint,
    height: f32,
    kind: BuildingKind,
    material: Handle<StandardMaterial>,
) -> Entity {
    let size = footprint.half_extents * 2.0;
    let dressing = building_dressing(kind);
    let accent = materials.add(StandardMaterial {
        base_color: dressing.accent,
        perceptual_roughness: 0.7,
        ..default()
    });

    commands
        .spawn((
            DriveSceneEntity,
            Mesh3d(meshes.add(Cuboid::new(size.x, height, size.y))),
            MeshMaterial3d(material),
            Transform::from_translation(ground_to_world(footprint.center, height * 0.5)),
        ))
        .with_children(|parent| {
            if let Some(fraction) = dressing.rooftop_fraction {
                let roof_height = (height * 0.08).max(0.5);
                parent.spawn((
                    Name::new("RooftopEquipment"),
                    Mesh3d(meshes.add(Cuboid::new(
                        size.x * fraction,
                        roof_height,
                        size.y * fraction,
                    ))),
                    MeshMaterial3d(accent.clone()),
                    Transform::from_xyz(0.0, (height + roof_height) * 0.5, 0.0),
                ));
            }

            if dressing.antenna {
                parent.spawn((
                    Name::new("Antenna"),
                    Mesh3d(meshes.add(Cylinder::new(0.1, ANTENNA_HEIGHT))),
                    MeshMaterial3d(accent.clone()),
                    Transform::from_xyz(size.x * 0.25, (height + ANTENNA_HEIGHT) * 0.5, 0.0),
                ));
            }

            if dressing.awning {
                parent.spawn((
                    Name::new("Awning"),
                    Mesh3d(meshes.add(Cuboid::new(size.x * 0.9, 0.2, 1.5))),
                    MeshMaterial3d(accent.clone()),
                    Transform::from_xyz(0.0, -height * 0.5 + 3.0, -(size.y * 0.5 + 0.75)),
                ));
            }

            if dressing.trees > 0 {
                let trunk = meshes.add(Cylinder::new(0.3, 2.0));
                let canopy = meshes.add(Sphere::new(1.6));
                let bark = materials.add(StandardMaterial {
                    base_color: Color::srgb(0.40, 0.26, 0.13),
                    ..default()
                });
                let corners = [
                    Vec2::new(1.0, 1.0),
                    Vec2::new(-1.0, 1.0),
                    Vec2::new(1.0, -1.0),
                    Vec2::new(-1.0, -1.0),
                ];
                for corner in corners.into_iter().cycle().take(dressing.trees) {
                    let offset = corner * (footprint.half_extents + Vec2::splat(2.5));
                    let base = -height * 0.5;
                    parent.spawn((
                        Name::new("TreeTrunk"),
                        Mesh3d(trunk.clone()),
                        MeshMaterial3d(bark.clone()),
                        Transform::from_xyz(offset.x, base + 1.0, offset.y),
                    ));
                    parent.spawn((
                        Name::new("TreeCanopy"),
                        Mesh3d(canopy.clone()),
                        MeshMaterial3d(accent.clone()),
                        Transform::from_xyz(offset.x, base + 3.2, offset.y),
                    ));
                }
            }
        })
        .id()
}

fn spawn_vehicle(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    half_size: Vec2,
    color: Color,
) {
    let body_material = materials.add(StandardMaterial {
        base_color: color,
        perceptual_roughness: 0.4,
        metallic: 0.2,
        ..default()
    });
    let glass_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.55, 0.70, 0.85),
        perceptual_roughness: 0.1,
        ..default()
    });
    let wheel_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.08, 0.08, 0.08),
        perceptual_roughness: 0.9,
        ..default()
    });
    let wheel_mesh = meshes.add(Cylinder::new(WHEEL_RADIUS, WHEEL_WIDTH));

    commands
        .spawn((
            Name::new("ChaseVehicle"),
            DriveSceneEntity,
            VehicleVisual,
            Transform::default(),
            Visibility::Inherited,
        ))
        .with_children(|parent| {
            parent.spawn((
                Name::new("VehicleBody"),
                Mesh3d(meshes.add(Cuboid::new(half_size.x * 2.0, BODY_HEIGHT, half_size.y * 2.0))),
                MeshMaterial3d(body_material.clone()),
                Transform::from_xyz(0.0, WHEEL_RADIUS + BODY_HEIGHT * 0.5 - 0.1, 0.0),
            ));
            parent.spawn((
                Name::new("VehicleCabin"),
                Mesh3d(meshes.add(Cuboid::new(half_size.x * 1.6, CABIN_HEIGHT, half_size.y))),
                MeshMaterial3d(glass_material),
                Transform::from_xyz(
                    0.0,
                    WHEEL_RADIUS + BODY_HEIGHT + CABIN_HEIGHT * 0.5 - 0.1,
                    -half_size.y * 0.1,
                ),
            ));

            for (x, z) in [(1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)] {
                let mut wheel = parent.spawn((
                    Name::new("VehicleWheel"),
                    Mesh3d(wheel_mesh.clone()),
                    MeshMaterial3d(wheel_material.clone()),
                    Transform::from_xyz(x * half_size.x, WHEEL_RADIUS, z * half_size.y * 0.65)
                        .with_rotation(wheel_rotation(0.0)),
                ));
                if z > 0.0 {
                    wheel.insert(FrontWheel);
                }
            }
        });
}

fn wheel_rotation(wheel_angle: f32) -> Quat {
    Quat::from_rotation_y(wheel_angle) * Quat::from_rotation_z(FRAC_PI_2)
}

fn sync_chase_vehicle(
    snapshot: Res<FrameSnapshot>,
    mut vehicle_query: Query<&mut Transform, (With<VehicleVisual>, Without<FrontWheel>)>,
    mut wheel_query: Query<&mut Transform, (With<FrontWheel>, Without<VehicleVisual>)>,
) {
    if !snapshot.active {
        return;
    }
    let Ok(mut transform) = vehicle_query.single_mut() else {
        return;
    };

    transform.translation = ground_to_world(Vec2::from(snapshot.position), 0.0);
    transform.rotation = heading_to_world_rotation(snapshot.heading);
    for mut wheel in &mut wheel_query {
        wheel.rotation = wheel_rotation(snapshot.wheel_angle);
    }
}

fn sync_chase_camera(
    snapshot: Res<FrameSnapshot>,
    mut camera_query: Query<(&mut Transform, &mut Projection, &mut DistanceFog), With<ChaseCamera>>,
) {
    if !snapshot.active {
        return;
    }
    let Ok((mut transform, mut projection, mut fog)) = camera_query.single_mut() else {
        return;
    };

    let eye = Vec3::from(snapshot.camera.eye);
    let look_at = Vec3::from(snapshot.camera.look_at);
    if eye.distance_squared(look_at) > f32::EPSILON {
        *transform = Transform::from_translation(eye).looking_at(look_at, Vec3::Y);
    }
    if let Projection::Perspective(perspective) = &mut *projection {
        perspective.fov = snapshot.camera.fov_degrees.to_radians();
    }
    fog.falloff = FogFalloff::Linear {
        start: snapshot.camera.fog_near,
        end: snapshot.camera.fog_far,
    };
}

fn highlight_chase_sections(
    snapshot: Res<FrameSnapshot>,
    session: Option<Res<DriveSession>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    section_query: Query<(&SectionVisual, &SectionMaterial)>,
    mut highlighted: Local<Option<Option<usize>>>,
) {
    let Some(session) = session else {
        return;
    };
    let nearest = snapshot.nearest.as_ref().map(|nearest| nearest.index);
    if *highlighted == Some(nearest) {
        return;
    }
    *highlighted = Some(nearest);

    for (visual, material) in &section_query {
        let Some(section) = session.world().catalog.get(visual.index) else {
            continue;
        };
        if let Some(standard) = materials.get_mut(&material.0) {
            standard.base_color = section_color(section.color, nearest == Some(visual.index));
        }
    }
}

fn place_section_labels(
    snapshot: Res<FrameSnapshot>,
    camera_query: Query<(&Camera, &GlobalTransform), With<ChaseCamera>>,
    mut label_query: Query<(&ChaseSectionLabel, &mut Node, &mut Visibility)>,
) {
    let Ok((camera, camera_transform)) = camera_query.single() else {
        return;
    };
    let eye = camera_transform.translation();

    for (label, mut node, mut visibility) in &mut label_query {
        let in_view = eye.distance(label.anchor) <= snapshot.camera.fog_far;
        match camera.world_to_viewport(camera_transform, label.anchor) {
            Ok(viewport) if in_view => {
                node.left = Val::Px(viewport.x);
                node.top = Val::Px(viewport.y);
                *visibility = Visibility::Inherited;
            }
            _ => *visibility = Visibility::Hidden,
        }
    }
}
