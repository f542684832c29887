use crate::config::CameraConfig;
use crate::gameplay::vehicle::VehicleState;
use crate::gameplay::{next_signed_unit_random, REFERENCE_FRAME_RATE};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

const SHAKE_SEED: u64 = 0x8A37_2BC1_D9E4_1023;
const SHAKE_AXIS_SCALE: Vec3 = Vec3::new(0.5, 0.15, 0.25);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldProjection {
    TopDown,
    #[default]
    Chase,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTuning {
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
    pub top_down_view_extent: Vec2,
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
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
            top_down_view_extent: Vec2::new(60.0, 34.0),
        }
    }
}

impl CameraTuning {
    pub fn from_config(camera: &CameraConfig) -> Self {
        Self {
            base_distance: camera.base_distance,
            base_height: camera.base_height,
            distance_gain: camera.distance_gain,
            height_gain: camera.height_gain,
            follow_base: camera.follow_base,
            follow_speed_gain: camera.follow_speed_gain,
            follow_cap: camera.follow_cap,
            look_ahead_gain: camera.look_ahead_gain,
            look_height: camera.look_height,
            base_fov_degrees: camera.base_fov_degrees,
            max_fov_increase_degrees: camera.max_fov_increase_degrees,
            fov_ease_rate: camera.fov_ease_rate,
            base_fog_near: camera.base_fog_near,
            base_fog_far: camera.base_fog_far,
            fog_speed_range: camera.fog_speed_range,
            min_fog_near: camera.min_fog_near,
            shake_speed_fraction: camera.shake_speed_fraction,
            shake_gain: camera.shake_gain,
            top_down_height: camera.top_down_height,
            top_down_follow: camera.top_down_follow,
            top_down_view_extent: Vec2::from(camera.top_down_view_extent),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub eye: Vec3,
    pub look_at: Vec3,
    pub fov_degrees: f32,
    pub fog_near: f32,
    pub fog_far: f32,
    // Render-only; never fed back into the follow.
    pub shake_offset: Vec3,
}

impl CameraState {
    pub fn is_finite(&self) -> bool {
        self.eye.is_finite()
            && self.look_at.is_finite()
            && self.fov_degrees.is_finite()
            && self.fog_near.is_finite()
            && self.fog_far.is_finite()
            && self.shake_offset.is_finite()
    }

    pub fn rendered_eye(&self) -> Vec3 {
        self.eye + self.shake_offset
    }
}

pub fn ground_to_world(position: Vec2, height: f32) -> Vec3 {
    Vec3::new(position.x, height, position.y)
}

#[derive(Debug, Clone)]
pub struct CameraRig {
    projection: WorldProjection,
    tuning: CameraTuning,
    world_min: Vec2,
    world_max: Vec2,
    state: CameraState,
    initialized: bool,
    rng_state: u64,
}

impl CameraRig {
    pub fn new(
        projection: WorldProjection,
        tuning: CameraTuning,
        world_min: Vec2,
        world_max: Vec2,
    ) -> Self {
        Self {
            projection,
            state: CameraState {
                eye: Vec3::new(0.0, tuning.base_height, -tuning.base_distance),
                look_at: Vec3::ZERO,
                fov_degrees: tuning.base_fov_degrees,
                fog_near: tuning.base_fog_near,
                fog_far: tuning.base_fog_far,
                shake_offset: Vec3::ZERO,
            },
            tuning,
            world_min,
            world_max,
            initialized: false,
            rng_state: SHAKE_SEED,
        }
    }

    pub fn projection(&self) -> WorldProjection {
        self.projection
    }

    pub fn tuning(&self) -> &CameraTuning {
        &self.tuning
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.initialized = false;
        self.rng_state = SHAKE_SEED;
        self.state.fov_degrees = self.tuning.base_fov_degrees;
        self.state.shake_offset = Vec3::ZERO;
    }

    pub fn update(&mut self, vehicle: &VehicleState, max_speed: f32, dt: f32) -> CameraState {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        match self.projection {
            WorldProjection::Chase => self.update_chase(vehicle, max_speed, dt),
            WorldProjection::TopDown => self.update_top_down(vehicle, dt),
        }
        self.initialized = true;
        self.state
    }

    fn update_chase(&mut self, vehicle: &VehicleState, max_speed: f32, dt: f32) {
        let tuning = self.tuning;
        let frames = dt * REFERENCE_FRAME_RATE;
        let speed = vehicle.speed.abs();
        let forward = vehicle.forward();

        let speed_distance = speed * tuning.distance_gain;
        let distance = tuning.base_distance + speed_distance;
        let height = tuning.base_height + speed_distance * tuning.height_gain;
        let target = ground_to_world(vehicle.position - forward * distance, height);

        if self.initialized {
            let gain = (tuning.follow_base + speed * tuning.follow_speed_gain).min(tuning.follow_cap);
            let blend = per_frame_blend(gain, frames);
            self.state.eye.x = self.state.eye.x.lerp(target.x, blend);
            self.state.eye.z = self.state.eye.z.lerp(target.z, blend);
            self.state.eye.y = height;
        } else {
            self.state.eye = target;
        }

        let look_ahead = vehicle.speed * tuning.look_ahead_gain;
        self.state.look_at = ground_to_world(vehicle.position + forward * look_ahead, tuning.look_height);

        let speed_factor = if max_speed > 0.0 {
            (speed / max_speed).min(1.0)
        } else {
            0.0
        };
        let target_fov = tuning.base_fov_degrees + speed_factor * tuning.max_fov_increase_degrees;
        self.state.fov_degrees += (target_fov - self.state.fov_degrees) * (dt * tuning.fov_ease_rate).min(1.0);

        let speed_blur = speed_factor * tuning.fog_speed_range;
        self.state.fog_near = (tuning.base_fog_near - speed_blur).max(tuning.min_fog_near);
        self.state.fog_far = tuning.base_fog_far + speed_blur * 2.0;

        self.state.shake_offset = if speed_factor > tuning.shake_speed_fraction {
            let intensity = (speed_factor - tuning.shake_speed_fraction) * tuning.shake_gain;
            Vec3::new(
                next_signed_unit_random(&mut self.rng_state),
                next_signed_unit_random(&mut self.rng_state),
                next_signed_unit_random(&mut self.rng_state),
            ) * SHAKE_AXIS_SCALE
                * intensity
        } else {
            Vec3::ZERO
        };
    }

    fn update_top_down(&mut self, vehicle: &VehicleState, dt: f32) {
        let tuning = self.tuning;
        let blend = per_frame_blend(tuning.top_down_follow, dt * REFERENCE_FRAME_RATE);
        let target = self.clamp_view_center(vehicle.position);

        let center = if self.initialized {
            let current = Vec2::new(self.state.eye.x, self.state.eye.z);
            self.clamp_view_center(current.lerp(target, blend))
        } else {
            target
        };

        self.state.eye = ground_to_world(center, tuning.top_down_height);
        self.state.look_at = ground_to_world(center, 0.0);
        self.state.fov_degrees = tuning.base_fov_degrees;
        self.state.fog_near = tuning.base_fog_near;
        self.state.fog_far = tuning.base_fog_far;
        self.state.shake_offset = Vec3::ZERO;
    }

    fn clamp_view_center(&self, center: Vec2) -> Vec2 {
        let half_view = self.tuning.top_down_view_extent * 0.5;
        let low = self.world_min + half_view;
        let high = self.world_max - half_view;
        let middle = (self.world_min + self.world_max) * 0.5;
        Vec2::new(
            if low.x <= high.x {
                center.x.clamp(low.x, high.x)
            } else {
                middle.x
            },
            if low.y <= high.y {
                center.y.clamp(low.y, high.y)
            } else {
                middle.y
            },
        )
    }
}

fn per_frame_blend(gain: f32, frames: f32) -> f32 {
    1.0 - (1.0 - gain.clamp(0.0, 1.0)).powf(frames)
}
