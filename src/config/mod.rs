use crate::gameplay::camera::WorldProjection;
use crate::gameplay::sections::{BuildingKind, ProximityPolicy};
use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = "config";

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, load_game_config)
            .add_systems(Update, reload_game_config_hotkey);
    }
}

fn load_game_config(mut commands: Commands) {
    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(config) => {
            log_config_summary("Loaded", &config);
            info!("Press F5 to hot-reload config files from `{CONFIG_DIR}`.");
            commands.insert_resource(config);
        }
        Err(error) => {
            // Drive mode refuses to start without a config; the portfolio screen stays usable.
            error!("failed to load configuration from `{CONFIG_DIR}`: {error}");
        }
    }
}

fn reload_game_config_hotkey(
    mut commands: Commands,
    keyboard: Res<ButtonInput<KeyCode>>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            log_config_summary("Hot-reloaded", &new_config);
            match game_config {
                Some(mut current_config) => *current_config = new_config,
                None => commands.insert_resource(new_config),
            }
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    info!(
        "{prefix} config: {} sections, {} scenery buildings, {} vehicles, projection {:?}.",
        config.sections.sections.len(),
        config.sections.scenery.len(),
        config.vehicles_by_id.len(),
        config.game.render.projection
    );
}

#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub game: GameFile,
    pub vehicles: VehiclesFile,
    pub sections: SectionsFile,
    pub vehicles_by_id: HashMap<String, VehicleConfig>,
    pub sections_by_id: HashMap<String, SectionConfig>,
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let vehicles: VehiclesFile = read_toml(&config_dir.join("vehicles.toml"))?;
        let sections: SectionsFile = read_toml(&config_dir.join("sections.toml"))?;
        Self::from_files(game, vehicles, sections)
    }

    pub fn from_files(
        game: GameFile,
        vehicles: VehiclesFile,
        sections: SectionsFile,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            vehicles_by_id: to_index("vehicles.toml::vehicles", &vehicles.vehicles)?,
            sections_by_id: to_index("sections.toml::sections", &sections.sections)?,
            game,
            vehicles,
            sections,
        };

        config.validate_references()?;
        Ok(config)
    }

    pub fn is_web_mode_active(&self) -> bool {
        cfg!(target_arch = "wasm32") || self.game.web.force_web_mode
    }

    pub fn active_vehicle(&self) -> Option<&VehicleConfig> {
        self.vehicles_by_id.get(&self.game.app.default_vehicle)
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        if !self
            .vehicles_by_id
            .contains_key(&self.game.app.default_vehicle)
        {
            return Err(ConfigError::Validation(format!(
                "game.toml::app.default_vehicle references unknown vehicle id `{}`",
                self.game.app.default_vehicle
            )));
        }

        let world = &self.game.world;
        if world.max[0] - world.min[0] <= world.edge_margin * 2.0
            || world.max[1] - world.min[1] <= world.edge_margin * 2.0
        {
            return Err(ConfigError::Validation(
                "game.toml::world extent must be larger than twice edge_margin on both axes"
                    .to_string(),
            ));
        }
        if world.edge_margin < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::world.edge_margin must be >= 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&world.boundary_restitution) {
            return Err(ConfigError::Validation(
                "game.toml::world.boundary_restitution must be in [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&world.building_restitution) {
            return Err(ConfigError::Validation(
                "game.toml::world.building_restitution must be in [0, 1]".to_string(),
            ));
        }
        if !world_contains(world, world.spawn_position) {
            return Err(ConfigError::Validation(format!(
                "game.toml::world.spawn_position {:?} lies outside the drivable area",
                world.spawn_position
            )));
        }

        let camera = &self.game.camera;
        if camera.base_distance <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::camera.base_distance must be > 0".to_string(),
            ));
        }
        if !(0.0 < camera.follow_base && camera.follow_base <= camera.follow_cap)
            || camera.follow_cap > 1.0
        {
            return Err(ConfigError::Validation(
                "game.toml::camera follow gains must satisfy 0 < follow_base <= follow_cap <= 1"
                    .to_string(),
            ));
        }
        if !(0.0 < camera.top_down_follow && camera.top_down_follow <= 1.0) {
            return Err(ConfigError::Validation(
                "game.toml::camera.top_down_follow must be in (0, 1]".to_string(),
            ));
        }
        if !(1.0..=170.0).contains(&camera.base_fov_degrees) {
            return Err(ConfigError::Validation(
                "game.toml::camera.base_fov_degrees must be in [1, 170]".to_string(),
            ));
        }

        let fuel = &self.game.fuel;
        if !(0.0..=100.0).contains(&fuel.low_fuel_threshold) {
            return Err(ConfigError::Validation(
                "game.toml::fuel.low_fuel_threshold must be in [0, 100]".to_string(),
            ));
        }
        if !(0.0 < fuel.low_fuel_speed_factor && fuel.low_fuel_speed_factor <= 1.0) {
            return Err(ConfigError::Validation(
                "game.toml::fuel.low_fuel_speed_factor must be in (0, 1]".to_string(),
            ));
        }
        if fuel.base_burn_per_second < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::fuel.base_burn_per_second must be >= 0".to_string(),
            ));
        }

        for (index, vehicle) in self.vehicles.vehicles.iter().enumerate() {
            if vehicle.max_speed <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].max_speed must be > 0"
                )));
            }
            if vehicle.acceleration < 0.0 || vehicle.acceleration_gain <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}] acceleration must be >= 0 and acceleration_gain > 0"
                )));
            }
            if !(0.0..=1.0).contains(&vehicle.power_floor) {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].power_floor must be in [0, 1]"
                )));
            }
            if vehicle.brake_strength < vehicle.reverse_strength {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].brake_strength must be >= reverse_strength"
                )));
            }
            if !(0.0 < vehicle.reverse_fraction && vehicle.reverse_fraction <= 1.0) {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].reverse_fraction must be in (0, 1]"
                )));
            }
            if !(0.0 < vehicle.friction && vehicle.friction <= 1.0) {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].friction must be in (0, 1]"
                )));
            }
            if vehicle.reference_frame_rate <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].reference_frame_rate must be > 0"
                )));
            }
            if vehicle.full_turn_speed <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].full_turn_speed must be > 0"
                )));
            }
            if vehicle.max_step_seconds <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].max_step_seconds must be > 0"
                )));
            }
            if vehicle.half_size[0] <= 0.0 || vehicle.half_size[1] <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].half_size must be positive"
                )));
            }
        }

        if self.sections.sections.is_empty() {
            return Err(ConfigError::Validation(
                "sections.toml::sections must contain at least one section".to_string(),
            ));
        }

        for (index, section) in self.sections.sections.iter().enumerate() {
            if section.title.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "sections.toml::sections[{index}].title cannot be empty"
                )));
            }
            if section.activation_radius <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "sections.toml::sections[{index}].activation_radius must be > 0"
                )));
            }
            if section.size.iter().any(|extent| *extent <= 0.0) {
                return Err(ConfigError::Validation(format!(
                    "sections.toml::sections[{index}].size must be positive on every axis"
                )));
            }
            if !world_contains(world, section.position) {
                return Err(ConfigError::Validation(format!(
                    "sections.toml::sections[{index}] `{}` lies outside the world bounds",
                    section.id
                )));
            }
        }

        for (index, building) in self.sections.scenery.iter().enumerate() {
            if building.size.iter().any(|extent| *extent <= 0.0) {
                return Err(ConfigError::Validation(format!(
                    "sections.toml::scenery[{index}].size must be positive on every axis"
                )));
            }
        }

        Ok(())
    }
}

fn world_contains(world: &WorldConfig, point: [f32; 2]) -> bool {
    point[0] >= world.min[0] + world.edge_margin
        && point[0] <= world.max[0] - world.edge_margin
        && point[1] >= world.min[1] + world.edge_margin
        && point[1] <= world.max[1] - world.edge_margin
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    pub world: WorldConfig,
    pub render: RenderConfig,
    pub camera: CameraConfig,
    pub fuel: FuelConfig,
    pub hud: HudConfig,
    #[serde(default)]
    pub proximity: ProximityConfig,
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub default_vehicle: String,
    pub debug_overlay: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorldConfig {
    pub min: [f32; 2],
    pub max: [f32; 2],
    pub edge_margin: f32,
    #[serde(default = "default_boundary_restitution")]
    pub boundary_restitution: f32,
    #[serde(default = "default_building_collisions")]
    pub building_collisions: bool,
    #[serde(default = "default_building_restitution")]
    pub building_restitution: f32,
    pub spawn_position: [f32; 2],
    #[serde(default)]
    pub spawn_heading_degrees: f32,
}

fn default_boundary_restitution() -> f32 {
    0.3
}

fn default_building_collisions() -> bool {
    true
}

fn default_building_restitution() -> f32 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub projection: WorldProjection,
    #[serde(default = "default_show_minimap")]
    pub show_minimap: bool,
}

fn default_show_minimap() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub base_distance: f32,
    pub base_height: f32,
    pub distance_gain: f32,
    pub height_gain: f32,
    pub follow_base: f32,
    pub follow_speed_gain: f32,
    pub follow_cap: f32,
    pub look_ahead_gain: f32,
    pub look_height: f32,
    pub base_fov_degrees: f32,
    pub max_fov_increase_degrees: f32,
    pub fov_ease_rate: f32,
    pub base_fog_near: f32,
    pub base_fog_far: f32,
    pub fog_speed_range: f32,
    pub min_fog_near: f32,
    pub shake_speed_fraction: f32,
    pub shake_gain: f32,
    pub top_down_height: f32,
    pub top_down_follow: f32,
    pub top_down_view_extent: [f32; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct FuelConfig {
    pub base_burn_per_second: f32,
    pub speed_burn_weight: f32,
    pub throttle_burn_weight: f32,
    pub burn_speed_threshold: f32,
    pub low_fuel_threshold: f32,
    pub low_fuel_speed_factor: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HudConfig {
    pub kmh_per_unit: f32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProximityConfig {
    #[serde(default)]
    pub policy: ProximityPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default)]
    pub force_web_mode: bool,
    #[serde(default = "default_show_touch_controls")]
    pub show_touch_controls: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            force_web_mode: false,
            show_touch_controls: default_show_touch_controls(),
        }
    }
}

fn default_show_touch_controls() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehiclesFile {
    pub vehicles: Vec<VehicleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleConfig {
    pub id: String,
    pub max_speed: f32,
    pub acceleration: f32,
    pub acceleration_gain: f32,
    pub power_floor: f32,
    pub brake_strength: f32,
    pub reverse_strength: f32,
    pub reverse_fraction: f32,
    pub friction: f32,
    #[serde(default = "default_reference_frame_rate")]
    pub reference_frame_rate: f32,
    pub steer_activation_speed: f32,
    pub turn_speed: f32,
    pub full_turn_speed: f32,
    pub max_wheel_angle_degrees: f32,
    pub wheel_return: f32,
    #[serde(default = "default_max_step_seconds")]
    pub max_step_seconds: f32,
    pub half_size: [f32; 2],
    pub color: [f32; 3],
}

fn default_reference_frame_rate() -> f32 {
    60.0
}

fn default_max_step_seconds() -> f32 {
    1.0 / 30.0
}

impl HasId for VehicleConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionsFile {
    pub sections: Vec<SectionConfig>,
    #[serde(default)]
    pub scenery: Vec<SceneryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionConfig {
    pub id: String,
    pub title: String,
    pub label: String,
    pub description: String,
    pub kind: BuildingKind,
    pub position: [f32; 2],
    pub size: [f32; 3],
    pub activation_radius: f32,
    pub color: [f32; 3],
    pub content: SectionContentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionContentConfig {
    pub title: String,
    pub body: String,
}

impl HasId for SectionConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneryConfig {
    pub kind: BuildingKind,
    pub position: [f32; 2],
    pub size: [f32; 3],
    pub color: [f32; 3],
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_vehicle() -> VehicleConfig {
        VehicleConfig {
            id: "coupe".to_string(),
            max_speed: 40.0,
            acceleration: 3.0,
            acceleration_gain: 25.0,
            power_floor: 0.2,
            brake_strength: 5.0,
            reverse_strength: 1.8,
            reverse_fraction: 0.3,
            friction: 0.985,
            reference_frame_rate: 60.0,
            steer_activation_speed: 0.5,
            turn_speed: 0.045,
            full_turn_speed: 10.0,
            max_wheel_angle_degrees: 30.0,
            wheel_return: 0.85,
            max_step_seconds: 1.0 / 30.0,
            half_size: [1.0, 2.0],
            color: [0.9, 0.2, 0.2],
        }
    }

    pub(crate) fn sample_section(id: &str, position: [f32; 2]) -> SectionConfig {
        SectionConfig {
            id: id.to_string(),
            title: format!("{id} title"),
            label: id.to_uppercase(),
            description: format!("{id} description"),
            kind: BuildingKind::Office,
            position,
            size: [18.0, 25.0, 12.0],
            activation_radius: 16.0,
            color: [0.2, 0.4, 0.9],
            content: SectionContentConfig {
                title: format!("{id} panel"),
                body: format!("{id} body"),
            },
        }
    }

    pub(crate) fn sample_game_file() -> GameFile {
        GameFile {
            app: AppConfig {
                default_vehicle: "coupe".to_string(),
                debug_overlay: false,
            },
            world: WorldConfig {
                min: [-100.0, -100.0],
                max: [100.0, 100.0],
                edge_margin: 10.0,
                boundary_restitution: 0.3,
                building_collisions: true,
                building_restitution: 0.5,
                spawn_position: [0.0, 0.0],
                spawn_heading_degrees: 0.0,
            },
            render: RenderConfig {
                projection: WorldProjection::Chase,
                show_minimap: true,
            },
            camera: CameraConfig {
                base_distance: 15.0,
                base_height: 8.0,
                distance_gain: 0.8,
                height_gain: 0.5,
                follow_base: 0.08,
                follow_speed_gain: 0.004,
                follow_cap: 0.2,
                look_ahead_gain: 1.2,
                look_height: 2.0,
                base_fov_degrees: 75.0,
                max_fov_increase_degrees: 25.0,
                fov_ease_rate: 8.0,
                base_fog_near: 80.0,
                base_fog_far: 250.0,
                fog_speed_range: 50.0,
                min_fog_near: 15.0,
                shake_speed_fraction: 0.7,
                shake_gain: 0.8,
                top_down_height: 60.0,
                top_down_follow: 0.1,
                top_down_view_extent: [60.0, 34.0],
            },
            fuel: FuelConfig {
                base_burn_per_second: 0.6,
                speed_burn_weight: 2.0,
                throttle_burn_weight: 1.0,
                burn_speed_threshold: 0.5,
                low_fuel_threshold: 20.0,
                low_fuel_speed_factor: 0.6,
            },
            hud: HudConfig { kmh_per_unit: 15.0 },
            proximity: ProximityConfig::default(),
            web: WebConfig::default(),
        }
    }

    pub(crate) fn sample_config() -> GameConfig {
        GameConfig::from_files(
            sample_game_file(),
            VehiclesFile {
                vehicles: vec![sample_vehicle()],
            },
            SectionsFile {
                sections: vec![
                    sample_section("about", [-50.0, -15.0]),
                    sample_section("projects", [50.0, -15.0]),
                ],
                scenery: Vec::new(),
            },
        )
        .expect("sample config should validate")
    }

    #[test]
    fn sample_config_validates() {
        let config = sample_config();
        assert_eq!(config.sections_by_id.len(), 2);
        assert!(config.active_vehicle().is_some());
    }

    #[test]
    fn validation_fails_for_missing_default_vehicle() {
        let mut game = sample_game_file();
        game.app.default_vehicle = "missing_car".to_string();

        let error = GameConfig::from_files(
            game,
            VehiclesFile {
                vehicles: vec![sample_vehicle()],
            },
            SectionsFile {
                sections: vec![sample_section("about", [0.0, 20.0])],
                scenery: Vec::new(),
            },
        )
        .expect_err("validation should fail");
        let message = error.to_string();

        assert!(message.contains("default_vehicle"));
        assert!(message.contains("missing_car"));
    }

    #[test]
    fn validation_rejects_duplicate_section_ids() {
        let error = GameConfig::from_files(
            sample_game_file(),
            VehiclesFile {
                vehicles: vec![sample_vehicle()],
            },
            SectionsFile {
                sections: vec![
                    sample_section("about", [0.0, 20.0]),
                    sample_section("about", [20.0, 20.0]),
                ],
                scenery: Vec::new(),
            },
        )
        .expect_err("duplicate ids should fail");

        assert!(error.to_string().contains("duplicate id `about`"));
    }

    #[test]
    fn validation_rejects_section_outside_world() {
        let error = GameConfig::from_files(
            sample_game_file(),
            VehiclesFile {
                vehicles: vec![sample_vehicle()],
            },
            SectionsFile {
                sections: vec![sample_section("far_away", [500.0, 0.0])],
                scenery: Vec::new(),
            },
        )
        .expect_err("out of bounds section should fail");

        assert!(error.to_string().contains("far_away"));
    }

    #[test]
    fn validation_rejects_empty_catalog() {
        let error = GameConfig::from_files(
            sample_game_file(),
            VehiclesFile {
                vehicles: vec![sample_vehicle()],
            },
            SectionsFile {
                sections: Vec::new(),
                scenery: Vec::new(),
            },
        )
        .expect_err("empty catalog should fail");

        assert!(error.to_string().contains("at least one section"));
    }

    #[test]
    fn validation_rejects_friction_above_one() {
        let mut vehicle = sample_vehicle();
        vehicle.friction = 1.2;

        let error = GameConfig::from_files(
            sample_game_file(),
            VehiclesFile {
                vehicles: vec![vehicle],
            },
            SectionsFile {
                sections: vec![sample_section("about", [0.0, 20.0])],
                scenery: Vec::new(),
            },
        )
        .expect_err("friction above one should fail");

        assert!(error.to_string().contains("friction"));
    }

    #[test]
    fn shipped_config_files_parse_and_validate() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join(CONFIG_DIR);
        let config = GameConfig::load_from_dir(&dir).expect("shipped config should load");

        assert!(config.sections_by_id.contains_key("about"));
        assert!(config.sections_by_id.contains_key("contact"));
    }

    #[test]
    fn missing_config_dir_reports_io_error() {
        let error = GameConfig::load_from_dir(Path::new("definitely/not/a/config/dir"))
            .expect_err("missing dir should fail");

        assert!(matches!(error, ConfigError::Io { .. }));
        assert!(error.to_string().contains("game.toml"));
    }
}
