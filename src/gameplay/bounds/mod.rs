use crate::config::WorldConfig;
use crate::gameplay::vehicle::VehicleState;
use bevy::prelude::*;

const SEPARATION_SLOP: f32 = 1.0e-3;
const GRAZE_COSINE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl Footprint {
    pub fn new(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    pub fn of_vehicle(state: &VehicleState, half_size: Vec2) -> Self {
        let (sin, cos) = state.heading.sin_cos();
        let half_extents = Vec2::new(
            cos.abs() * half_size.x + sin.abs() * half_size.y,
            sin.abs() * half_size.x + cos.abs() * half_size.y,
        );
        Self::new(state.position, half_extents)
    }

    pub fn overlaps(&self, other: &Footprint) -> bool {
        let gap = (self.center - other.center).abs();
        let reach = self.half_extents + other.half_extents;
        gap.x < reach.x && gap.y < reach.y
    }

    pub fn separation(&self, other: &Footprint) -> Option<Vec2> {
        let delta = self.center - other.center;
        let overlap = self.half_extents + other.half_extents - delta.abs();
        if overlap.x <= 0.0 || overlap.y <= 0.0 {
            return None;
        }
        let away = |offset: f32| if offset < 0.0 { -1.0 } else { 1.0 };
        if overlap.x < overlap.y {
            Some(Vec2::new(away(delta.x) * (overlap.x + SEPARATION_SLOP), 0.0))
        } else {
            Some(Vec2::new(0.0, away(delta.y) * (overlap.y + SEPARATION_SLOP)))
        }
    }

    pub fn min(&self) -> Vec2 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec2 {
        self.center + self.half_extents
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub min: Vec2,
    pub max: Vec2,
    pub restitution: f32,
}

impl WorldBounds {
    pub fn new(min: Vec2, max: Vec2, margin: f32, restitution: f32) -> Self {
        Self {
            min: min + Vec2::splat(margin),
            max: max - Vec2::splat(margin),
            restitution,
        }
    }

    pub fn from_config(world: &WorldConfig) -> Self {
        Self::new(
            Vec2::from(world.min),
            Vec2::from(world.max),
            world.edge_margin,
            world.boundary_restitution,
        )
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn clamp(&self, state: &mut VehicleState) -> bool {
        let clamped = state.position.clamp(self.min, self.max);
        if clamped == state.position {
            return false;
        }

        state.position = clamped;
        state.speed *= -self.restitution;
        true
    }
}

// Shallow contacts slide on; steeper ones lose the normal part of the velocity.
pub fn resolve_building_collisions(
    state: &mut VehicleState,
    vehicle_half_size: Vec2,
    buildings: &[Footprint],
    restitution: f32,
) -> Option<usize> {
    let mut hit = None;
    let mut total_push = Vec2::ZERO;
    for (index, building) in buildings.iter().enumerate() {
        let vehicle = Footprint::of_vehicle(state, vehicle_half_size);
        let Some(push) = vehicle.separation(building) else {
            continue;
        };
        state.position += push;
        total_push += push;
        if hit.is_none() {
            hit = Some(index);
        }
    }
    let hit = hit?;

    let along_normal = state.forward().dot(total_push.normalize_or_zero());
    let approaching = state.speed * along_normal < 0.0;
    if approaching && along_normal.abs() > GRAZE_COSINE {
        state.speed *= 1.0 - (1.0 + restitution) * along_normal * along_normal;
    }
    Some(hit)
}
