pub mod bounds;
pub mod camera;
pub mod fuel;
pub mod interaction;
pub mod sections;
pub mod session;
pub mod vehicle;

use bevy::prelude::*;
use session::DriveSessionPlugin;

pub const REFERENCE_FRAME_RATE: f32 = 60.0;

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(DriveSessionPlugin);
    }
}

pub(crate) fn next_signed_unit_random(seed: &mut u64) -> f32 {
    (next_unit_random(seed) * 2.0) - 1.0
}

pub(crate) fn next_unit_random(seed: &mut u64) -> f32 {
    *seed = seed
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    ((*seed >> 32) as u32) as f32 / u32::MAX as f32
}
