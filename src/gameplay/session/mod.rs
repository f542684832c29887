use crate::config::GameConfig;
use crate::gameplay::bounds::{resolve_building_collisions, Footprint, WorldBounds};
use crate::gameplay::camera::{CameraRig, CameraState, CameraTuning, WorldProjection};
use crate::gameplay::fuel::{FuelTank, FuelTuning};
use crate::gameplay::interaction::{InteractionController, InteractionEvent};
use crate::gameplay::sections::{PanelContent, ProximityIndex, SectionCatalog};
use crate::gameplay::vehicle::{VehicleModel, VehicleState, VehicleTuning};
use crate::input::{DriveInputSet, InputState};
use crate::states::GameState;
use crate::web::VirtualControlState;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub struct DriveSessionPlugin;

impl Plugin for DriveSessionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FrameLoop>()
            .init_resource::<FrameSnapshot>()
            .add_message::<InteractionEvent>()
            .add_systems(
                OnEnter(GameState::Driving),
                start_drive_session.in_set(DriveStartSet),
            )
            .add_systems(OnExit(GameState::Driving), teardown_drive_session)
            .add_systems(
                Update,
                advance_drive_session
                    .in_set(DriveStepSet)
                    .after(DriveInputSet)
                    .run_if(in_state(GameState::Driving))
                    .run_if(drive_loop_running)
                    .run_if(resource_exists::<DriveSession>),
            )
            .add_systems(
                Update,
                apply_reloaded_vehicle_tuning
                    .before(DriveStepSet)
                    .run_if(resource_exists::<DriveSession>)
                    .run_if(resource_exists_and_changed::<GameConfig>),
            );
    }
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct DriveStartSet;

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct DriveStepSet;

pub fn drive_loop_running(frame_loop: Option<Res<FrameLoop>>) -> bool {
    frame_loop.is_some_and(|frame_loop| frame_loop.is_running())
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartError {
    MissingConfig,
    EmptyCatalog,
    UnknownVehicle(String),
    MissingWindow,
}

impl Display for StartError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingConfig => write!(f, "no valid configuration is loaded"),
            Self::EmptyCatalog => write!(f, "the section catalog is empty"),
            Self::UnknownVehicle(id) => write!(f, "vehicle `{id}` is not defined"),
            Self::MissingWindow => write!(f, "there is no primary window to render into"),
        }
    }
}

impl Error for StartError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulationFault {
    NonFiniteVehicle { frame: u64, restored_spawn: bool },
    NonFiniteCamera { frame: u64 },
}

impl Display for SimulationFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFiniteVehicle {
                frame,
                restored_spawn: true,
            } => write!(f, "frame {frame}: non-finite vehicle state, reset to spawn"),
            Self::NonFiniteVehicle { frame, .. } => write!(
                f,
                "frame {frame}: non-finite vehicle state, restored last good state"
            ),
            Self::NonFiniteCamera { frame } => {
                write!(f, "frame {frame}: non-finite camera state, camera re-snapped")
            }
        }
    }
}

impl Error for SimulationFault {}

#[derive(Debug, Clone)]
pub struct DriveWorld {
    pub bounds: WorldBounds,
    pub world_min: Vec2,
    pub world_max: Vec2,
    pub catalog: SectionCatalog,
    pub footprints: Vec<Footprint>,
    pub building_collisions: bool,
    pub building_restitution: f32,
    pub spawn: VehicleState,
    pub proximity: ProximityIndex,
}

impl DriveWorld {
    pub fn from_config(config: &GameConfig) -> Self {
        let world = &config.game.world;
        let catalog = SectionCatalog::from_config(&config.sections);
        Self {
            bounds: WorldBounds::from_config(world),
            world_min: Vec2::from(world.min),
            world_max: Vec2::from(world.max),
            footprints: catalog.collision_footprints(),
            catalog,
            building_collisions: world.building_collisions,
            building_restitution: world.building_restitution,
            spawn: VehicleState::at_rest(
                Vec2::from(world.spawn_position),
                world.spawn_heading_degrees.to_radians(),
            ),
            proximity: ProximityIndex::new(config.game.proximity.policy),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub stepped: bool,
    pub boundary_hit: bool,
    pub building_hit: Option<usize>,
    pub nearest: Option<usize>,
    pub event: Option<InteractionEvent>,
    pub camera: CameraState,
}

#[derive(Resource, Debug, Clone)]
pub struct DriveSession {
    world: DriveWorld,
    vehicle: VehicleModel,
    fuel: FuelTank,
    camera: CameraRig,
    interaction: InteractionController,
    nearest: Option<usize>,
    last_good: VehicleState,
    frame: u64,
    fault_count: u64,
}

impl DriveSession {
    pub fn new(
        world: DriveWorld,
        vehicle: VehicleTuning,
        fuel: FuelTuning,
        camera: CameraTuning,
        projection: WorldProjection,
    ) -> Self {
        let spawn = world.spawn;
        Self {
            camera: CameraRig::new(projection, camera, world.world_min, world.world_max),
            vehicle: VehicleModel::new(vehicle, spawn),
            fuel: FuelTank::new(fuel),
            interaction: InteractionController::default(),
            nearest: None,
            last_good: spawn,
            frame: 0,
            fault_count: 0,
            world,
        }
    }

    pub fn from_config(config: &GameConfig) -> Result<Self, StartError> {
        if config.sections.sections.is_empty() {
            return Err(StartError::EmptyCatalog);
        }
        let Some(vehicle) = config.active_vehicle() else {
            return Err(StartError::UnknownVehicle(
                config.game.app.default_vehicle.clone(),
            ));
        };

        Ok(Self::new(
            DriveWorld::from_config(config),
            VehicleTuning::from_config(vehicle),
            FuelTuning::from_config(&config.game.fuel),
            CameraTuning::from_config(&config.game.camera),
            config.game.render.projection,
        ))
    }

    pub fn world(&self) -> &DriveWorld {
        &self.world
    }

    pub fn vehicle(&self) -> &VehicleModel {
        &self.vehicle
    }

    pub fn fuel(&self) -> &FuelTank {
        &self.fuel
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    pub fn nearest(&self) -> Option<usize> {
        self.nearest
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn fault_count(&self) -> u64 {
        self.fault_count
    }

    pub fn set_vehicle_tuning(&mut self, tuning: VehicleTuning) {
        self.vehicle.set_tuning(tuning);
    }

    pub fn effective_max_speed(&self) -> f32 {
        self.fuel.effective_max_speed(self.vehicle.tuning().max_speed)
    }

    pub fn reset(&mut self) {
        self.vehicle.reset(self.world.spawn);
        self.fuel.refill();
        self.camera.reset();
        self.interaction = InteractionController::default();
        self.nearest = None;
        self.last_good = self.world.spawn;
    }

    pub fn advance(
        &mut self,
        input: &mut InputState,
        dt: f32,
    ) -> Result<FrameReport, SimulationFault> {
        self.frame += 1;
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let dt = dt.min(self.vehicle.tuning().max_step_seconds);
        let max_speed = self.effective_max_speed();
        let mut fault = None;

        let stepped = !self.interaction.is_panel_open();
        let mut boundary_hit = false;
        let mut building_hit = None;
        if stepped {
            let controls = input.controls();
            self.vehicle.step(&controls, dt, max_speed);

            if !self.vehicle.state().is_finite() {
                let restored_spawn = !self.last_good.is_finite();
                let restored = if restored_spawn {
                    self.world.spawn
                } else {
                    self.last_good
                };
                self.vehicle.reset(restored);
                fault = Some(SimulationFault::NonFiniteVehicle {
                    frame: self.frame,
                    restored_spawn,
                });
            } else {
                let half_size = self.vehicle.tuning().half_size;
                let max_reverse = self.vehicle.max_reverse_speed(max_speed);
                let state = self.vehicle.state_mut();
                if self.world.building_collisions {
                    building_hit = resolve_building_collisions(
                        state,
                        half_size,
                        &self.world.footprints,
                        self.world.building_restitution,
                    );
                }
                boundary_hit = self.world.bounds.clamp(state);
                state.speed = state.speed.clamp(-max_reverse, max_speed);

                let speed = state.speed;
                self.fuel.burn(
                    speed,
                    controls.throttle(),
                    self.vehicle.tuning().max_speed,
                    dt,
                );
                self.last_good = *self.vehicle.state();
            }
        }

        let position = self.vehicle.state().position;
        self.nearest = self
            .world
            .proximity
            .find_nearest(position, &self.world.catalog.sections);
        let event = self
            .interaction
            .handle_actions(self.nearest.and_then(|index| self.world.catalog.get(index)), input);

        let mut camera = self.camera.update(self.vehicle.state(), max_speed, dt);
        if !camera.is_finite() {
            self.camera.reset();
            camera = self.camera.update(self.vehicle.state(), max_speed, 0.0);
            fault = fault.or(Some(SimulationFault::NonFiniteCamera { frame: self.frame }));
        }

        if let Some(fault) = fault {
            self.fault_count += 1;
            return Err(fault);
        }

        Ok(FrameReport {
            frame: self.frame,
            stepped,
            boundary_hit,
            building_hit,
            nearest: self.nearest,
            event,
            camera,
        })
    }

    pub fn snapshot(&self, kmh_per_unit: f32) -> FrameSnapshot {
        let vehicle = self.vehicle.state();
        let camera = self.camera.state();
        let nearest = self.nearest.and_then(|index| {
            self.world.catalog.get(index).map(|section| NearestSection {
                index,
                id: section.id.clone(),
                title: section.title.clone(),
                description: section.description.clone(),
            })
        });
        let panel = self.interaction.active_section().map(|section| OpenPanel {
            section_id: section.id.clone(),
            content: section.content.clone(),
        });

        FrameSnapshot {
            active: true,
            frame: self.frame,
            projection: self.camera.projection(),
            position: vehicle.position.to_array(),
            heading: vehicle.heading,
            speed: vehicle.speed,
            wheel_angle: vehicle.wheel_angle,
            speed_kmh: (vehicle.speed.abs() * kmh_per_unit).round() as u32,
            gear: Gear::from_speed(vehicle.speed),
            effective_max_speed: self.effective_max_speed(),
            fuel: self.fuel.level(),
            low_fuel: self.fuel.is_low(),
            camera: CameraSnapshot {
                eye: camera.rendered_eye().to_array(),
                look_at: camera.look_at.to_array(),
                fov_degrees: camera.fov_degrees,
                fog_near: camera.fog_near,
                fog_far: camera.fog_far,
            },
            nearest,
            panel,
            fault_count: self.fault_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Gear {
    #[default]
    #[serde(rename = "D")]
    Drive,
    #[serde(rename = "R")]
    Reverse,
}

impl Gear {
    pub fn from_speed(speed: f32) -> Self {
        if speed < 0.0 {
            Self::Reverse
        } else {
            Self::Drive
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Drive => "D",
            Self::Reverse => "R",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CameraSnapshot {
    pub eye: [f32; 3],
    pub look_at: [f32; 3],
    pub fov_degrees: f32,
    pub fog_near: f32,
    pub fog_far: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestSection {
    pub index: usize,
    pub id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenPanel {
    pub section_id: String,
    pub content: PanelContent,
}

#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameSnapshot {
    pub active: bool,
    pub frame: u64,
    pub projection: WorldProjection,
    pub position: [f32; 2],
    pub heading: f32,
    pub speed: f32,
    pub wheel_angle: f32,
    pub speed_kmh: u32,
    pub gear: Gear,
    pub effective_max_speed: f32,
    pub fuel: f32,
    pub low_fuel: bool,
    pub camera: CameraSnapshot,
    pub nearest: Option<NearestSection>,
    pub panel: Option<OpenPanel>,
    pub fault_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopPhase {
    #[default]
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

#[derive(Debug, Default)]
pub struct StopHandle {
    requested: bool,
}

impl StopHandle {
    pub fn request_stop(&mut self) {
        self.requested = true;
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct FrameLoop {
    phase: LoopPhase,
    frames_run: u64,
    faulted_frames: u64,
}

impl FrameLoop {
    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == LoopPhase::Running
    }

    pub fn frames_run(&self) -> u64 {
        self.frames_run
    }

    pub fn faulted_frames(&self) -> u64 {
        self.faulted_frames
    }

    pub fn start(&mut self) {
        self.phase = LoopPhase::Running;
        self.frames_run = 0;
        self.faulted_frames = 0;
    }

    pub fn stop(&mut self) {
        self.phase = LoopPhase::Stopped;
    }

    pub fn run_frame<T, E: Display>(
        &mut self,
        frame: impl FnOnce(&mut StopHandle) -> Result<T, E>,
    ) -> LoopControl {
        if !self.is_running() {
            return LoopControl::Stop;
        }

        let mut stop = StopHandle::default();
        self.frames_run += 1;
        if let Err(error) = frame(&mut stop) {
            self.faulted_frames += 1;
            warn!("Drive frame {} faulted: {error}", self.frames_run);
        }

        if stop.requested {
            self.stop();
            return LoopControl::Stop;
        }
        LoopControl::Continue
    }
}

fn start_drive_session(
    mut commands: Commands,
    config: Option<Res<GameConfig>>,
    window_query: Query<(), With<PrimaryWindow>>,
    mut frame_loop: ResMut<FrameLoop>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let session = match check_start_preconditions(config.as_deref(), !window_query.is_empty()) {
        Ok(session) => session,
        Err(error) => {
            error!("Drive mode refused to start: {error}");
            frame_loop.stop();
            next_state.set(GameState::Portfolio);
            return;
        }
    };

    info!(
        "Drive session started: {} sections, projection {:?}.",
        session.world().catalog.sections.len(),
        session.camera().projection()
    );
    commands.insert_resource(session);
    frame_loop.start();
}

pub fn check_start_preconditions(
    config: Option<&GameConfig>,
    has_window: bool,
) -> Result<DriveSession, StartError> {
    let Some(config) = config else {
        return Err(StartError::MissingConfig);
    };
    if !has_window {
        return Err(StartError::MissingWindow);
    }
    DriveSession::from_config(config)
}

fn teardown_drive_session(
    mut commands: Commands,
    mut frame_loop: ResMut<FrameLoop>,
    mut snapshot: ResMut<FrameSnapshot>,
) {
    frame_loop.stop();
    commands.remove_resource::<DriveSession>();
    *snapshot = FrameSnapshot::default();
    info!(
        "Drive session ended after {} frames ({} faulted).",
        frame_loop.frames_run(),
        frame_loop.faulted_frames()
    );
}

fn apply_reloaded_vehicle_tuning(config: Res<GameConfig>, mut session: ResMut<DriveSession>) {
    let Some(vehicle) = config.active_vehicle() else {
        warn!(
            "Vehicle `{}` vanished from config; keeping current tuning.",
            config.game.app.default_vehicle
        );
        return;
    };

    let tuning = VehicleTuning::from_config(vehicle);
    if *session.vehicle().tuning() != tuning {
        session.set_vehicle_tuning(tuning);
        info!("Applied updated tuning for vehicle `{}`.", vehicle.id);
    }
}

#[allow(clippy::too_many_arguments)]
fn advance_drive_session(
    time: Res<Time>,
    keyboard: Res<ButtonInput<KeyCode>>,
    virtual_controls: Option<Res<VirtualControlState>>,
    config: Option<Res<GameConfig>>,
    mut input: ResMut<InputState>,
    mut session: ResMut<DriveSession>,
    mut frame_loop: ResMut<FrameLoop>,
    mut snapshot: ResMut<FrameSnapshot>,
    mut interaction_events: MessageWriter<InteractionEvent>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let exit_requested = (keyboard.just_pressed(KeyCode::Escape)
        && keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]))
        || virtual_controls.is_some_and(|controls| controls.exit_just_pressed);
    let kmh_per_unit = config
        .as_ref()
        .map(|config| config.game.hud.kmh_per_unit)
        .unwrap_or(15.0);
    let dt = time.delta_secs();

    let control = frame_loop.run_frame(|stop| {
        if exit_requested {
            stop.request_stop();
        }
        let result = session.advance(&mut *input, dt);
        *snapshot = session.snapshot(kmh_per_unit);
        let report = result?;
        if let Some(event) = report.event {
            interaction_events.write(event);
        }
        Ok::<_, SimulationFault>(report.frame)
    });

    if control == LoopControl::Stop {
        info!("Leaving drive mode.");
        next_state.set(GameState::Portfolio);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{sample_config, sample_section};

    const FRAME: f32 = 1.0 / 60.0;

    fn session() -> DriveSession {
        DriveSession::from_config(&sample_config()).expect("sample session should start")
    }

    fn throttle() -> InputState {
        InputState {
            accelerate: true,
            steer_left: true,
            ..default()
        }
    }

    fn session_near_section() -> DriveSession {
        let mut config = sample_config();
        config.sections.sections = vec![sample_section("about", [0.0, 20.0])];
        config.game.world.building_collisions = false;
        config.sections.sections[0].activation_radius = 30.0;
        DriveSession::from_config(&config).expect("session should start")
    }

    #[test]
    fn driving_frame_steps_and_reports() {
        let mut session = session();
        let mut input = throttle();

        let report = session.advance(&mut input, FRAME).expect("frame should succeed");

        assert!(report.stepped);
        assert!(session.vehicle().state().speed > 0.0);
        assert_eq!(report.frame, 1);
    }

    #[test]
    fn open_panel_freezes_the_vehicle() {
        let mut session = session_near_section();
        let mut input = throttle();
        for _ in 0..10 {
            session.advance(&mut input, FRAME).expect("frame should succeed");
        }
        input.interact = true;
        let report = session.advance(&mut input, FRAME).expect("frame should succeed");
        assert!(matches!(report.event, Some(InteractionEvent::Opened { .. })));
        let frozen = *session.vehicle().state();

        for _ in 0..120 {
            let mut input = InputState {
                accelerate: true,
                reverse: true,
                steer_right: true,
                ..default()
            };
            let report = session.advance(&mut input, FRAME).expect("frame should succeed");
            assert!(!report.stepped);
            assert_eq!(*session.vehicle().state(), frozen);
        }
    }

    #[test]
    fn closing_panel_leaves_no_stuck_input() {
        let mut session = session_near_section();
        let mut input = InputState {
            interact: true,
            ..default()
        };
        session.advance(&mut input, FRAME).expect("frame should succeed");
        assert!(session.interaction().is_panel_open());

        input.accelerate = true;
        input.steer_left = true;
        input.close = true;
        let report = session.advance(&mut input, FRAME).expect("frame should succeed");
        assert!(matches!(report.event, Some(InteractionEvent::Closed { .. })));

        let before = *session.vehicle().state();
        let report = session.advance(&mut input, FRAME).expect("frame should succeed");
        let after = *session.vehicle().state();

        assert!(report.stepped);
        assert_eq!(after.speed, 0.0);
        assert_eq!(after.position, before.position);
        assert_eq!(after.heading, before.heading);
    }

    #[test]
    fn non_finite_state_rolls_back_to_last_good() {
        let mut session = session();
        let mut input = throttle();
        for _ in 0..30 {
            session.advance(&mut input, FRAME).expect("frame should succeed");
        }
        let good = *session.vehicle().state();

        session.vehicle.state_mut().speed = f32::NAN;
        let fault = session
            .advance(&mut input, FRAME)
            .expect_err("nan should be reported");

        assert!(matches!(
            fault,
            SimulationFault::NonFiniteVehicle {
                restored_spawn: false,
                ..
            }
        ));
        assert_eq!(*session.vehicle().state(), good);
        assert!(session.camera().state().is_finite());
        assert_eq!(session.fault_count(), 1);
    }

    #[test]
    fn non_finite_state_without_good_history_resets_to_spawn() {
        let mut session = session();
        session.last_good.position = Vec2::NAN;
        session.vehicle.state_mut().position = Vec2::new(f32::INFINITY, 0.0);

        let fault = session
            .advance(&mut InputState::default(), FRAME)
            .expect_err("infinite position should be reported");

        assert!(matches!(
            fault,
            SimulationFault::NonFiniteVehicle {
                restored_spawn: true,
                ..
            }
        ));
        assert_eq!(*session.vehicle().state(), session.world().spawn);
    }

    #[test]
    fn long_pause_is_one_capped_step() {
        let mut paused = session();
        let mut capped = session();

        paused.advance(&mut throttle(), 30.0).expect("frame should succeed");
        capped.advance(&mut throttle(), 1.0 / 30.0).expect("frame should succeed");

        assert_eq!(paused.vehicle().state(), capped.vehicle().state());
    }

    #[test]
    fn low_fuel_caps_speed_immediately() {
        let mut session = session();
        session.vehicle.state_mut().speed = 40.0;
        while !session.fuel().is_low() {
            session.fuel.burn(40.0, 1.0, 40.0, 1.0);
        }

        session
            .advance(&mut InputState::default(), FRAME)
            .expect("frame should succeed");

        assert!(session.vehicle().state().speed <= 24.0 + 1.0e-4);
    }

    #[test]
    fn reset_restores_spawn_and_full_tank() {
        let mut session = session_near_section();
        let mut input = throttle();
        for _ in 0..60 {
            session.advance(&mut input, FRAME).expect("frame should succeed");
        }
        input.interact = true;
        session.advance(&mut input, FRAME).expect("frame should succeed");

        session.reset();

        assert_eq!(*session.vehicle().state(), session.world().spawn);
        assert_eq!(session.fuel().level(), 100.0);
        assert!(!session.interaction().is_panel_open());
        assert_eq!(session.nearest(), None);
    }

    #[test]
    fn snapshot_exposes_prompt_and_panel_content() {
        let mut session = session_near_section();
        let mut input = InputState::default();
        session.advance(&mut input, FRAME).expect("frame should succeed");

        let snapshot = session.snapshot(15.0);
        assert_eq!(snapshot.nearest.as_ref().map(|n| n.id.as_str()), Some("about"));
        assert!(snapshot.panel.is_none());

        input.interact = true;
        session.advance(&mut input, FRAME).expect("frame should succeed");
        let snapshot = session.snapshot(15.0);
        assert_eq!(
            snapshot.panel.as_ref().map(|panel| panel.content.title.as_str()),
            Some("about panel")
        );

        let json = serde_json::to_string(&snapshot).expect("snapshot should serialize");
        assert!(json.contains("\"gear\":\"D\""));
    }

    #[test]
    fn speed_readout_uses_kmh_scale_and_gear() {
        let mut session = session();
        session.vehicle.state_mut().speed = -4.0;

        let snapshot = session.snapshot(15.0);

        assert_eq!(snapshot.speed_kmh, 60);
        assert_eq!(snapshot.gear, Gear::Reverse);
    }

    #[test]
    fn building_hit_keeps_vehicle_outside_footprint() {
        let mut config = sample_config();
        config.sections.sections = vec![sample_section("wall", [0.0, 20.0])];
        let mut session = DriveSession::from_config(&config).expect("session should start");
        let building = session.world().catalog.sections[0].footprint;
        let mut input = InputState {
            accelerate: true,
            ..default()
        };

        let mut hit = false;
        for _ in 0..600 {
            let report = session.advance(&mut input, FRAME).expect("frame should succeed");
            hit |= report.building_hit == Some(0);
            let vehicle = Footprint::of_vehicle(session.vehicle().state(), Vec2::new(1.0, 2.0));
            assert!(!vehicle.overlaps(&building));
        }
        assert!(hit);
    }

    #[test]
    fn steering_into_a_building_slides_then_reverses_away() {
        let mut config = sample_config();
        config.sections.sections = vec![sample_section("wall", [0.0, 20.0])];
        config.game.world.spawn_position = [10.2, 16.0];
        let mut session = DriveSession::from_config(&config).expect("session should start");
        session.vehicle.state_mut().speed = 6.0;
        let building = session.world().catalog.sections[0].footprint;
        let half_size = session.vehicle().tuning().half_size;

        let mut input = InputState {
            accelerate: true,
            steer_right: true,
            ..default()
        };
        let mut hit = false;
        for _ in 0..240 {
            let report = session.advance(&mut input, FRAME).expect("frame should succeed");
            hit |= report.building_hit.is_some();
            let vehicle = Footprint::of_vehicle(session.vehicle().state(), half_size);
            assert!(!vehicle.overlaps(&building));
        }
        assert!(hit);

        let pinned = session.vehicle().state().position;
        let mut input = InputState {
            reverse: true,
            ..default()
        };
        for _ in 0..240 {
            session.advance(&mut input, FRAME).expect("frame should succeed");
            let vehicle = Footprint::of_vehicle(session.vehicle().state(), half_size);
            assert!(!vehicle.overlaps(&building));
        }
        assert!(session.vehicle().state().position.distance(pinned) > 1.0);
    }

    #[test]
    fn start_is_refused_without_prerequisites() {
        assert_eq!(
            check_start_preconditions(None, true).err(),
            Some(StartError::MissingConfig)
        );
        assert_eq!(
            check_start_preconditions(Some(&sample_config()), false).err(),
            Some(StartError::MissingWindow)
        );

        let mut config = sample_config();
        config.sections.sections.clear();
        assert_eq!(
            check_start_preconditions(Some(&config), true).err(),
            Some(StartError::EmptyCatalog)
        );

        let mut config = sample_config();
        config.game.app.default_vehicle = "hover_board".to_string();
        assert_eq!(
            check_start_preconditions(Some(&config), true).err(),
            Some(StartError::UnknownVehicle("hover_board".to_string()))
        );
    }

    #[test]
    fn stopped_loop_never_runs_a_frame() {
        let mut frame_loop = FrameLoop::default();
        let mut ran = false;

        let control = frame_loop.run_frame(|_| {
            ran = true;
            Ok::<_, SimulationFault>(())
        });

        assert_eq!(control, LoopControl::Stop);
        assert!(!ran);
    }

    #[test]
    fn faulting_frame_keeps_loop_running() {
        let mut frame_loop = FrameLoop::default();
        frame_loop.start();

        let control = frame_loop.run_frame(|_| {
            Err::<(), _>(SimulationFault::NonFiniteCamera { frame: 1 })
        });

        assert_eq!(control, LoopControl::Continue);
        assert!(frame_loop.is_running());
        assert_eq!(frame_loop.faulted_frames(), 1);
    }

    #[test]
    fn stop_requested_by_faulting_frame_is_honoured() {
        let mut frame_loop = FrameLoop::default();
        frame_loop.start();

        let control = frame_loop.run_frame(|stop| {
            stop.request_stop();
            Err::<(), _>(SimulationFault::NonFiniteCamera { frame: 1 })
        });

        assert_eq!(control, LoopControl::Stop);
        assert_eq!(frame_loop.phase(), LoopPhase::Stopped);

        let mut ran_again = false;
        frame_loop.run_frame(|_| {
            ran_again = true;
            Ok::<_, SimulationFault>(())
        });
        assert!(!ran_again);
    }

    #[test]
    fn panel_survives_catalog_swap() {
        let mut session = session_near_section();
        let mut input = InputState {
            interact: true,
            ..default()
        };
        session.advance(&mut input, FRAME).expect("frame should succeed");

        session.world.catalog.sections.clear();
        session.world.footprints.clear();
        let mut input = InputState::default();
        session.advance(&mut input, FRAME).expect("frame should succeed");
        assert!(session.interaction().active_section().is_some());

        input.close = true;
        session.advance(&mut input, FRAME).expect("frame should succeed");
        assert!(!session.interaction().is_panel_open());
    }
}
