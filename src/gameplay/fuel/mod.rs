use crate::config::FuelConfig;

pub const FULL_TANK: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelTuning {
    pub base_burn_per_second: f32,
    pub speed_burn_weight: f32,
    pub throttle_burn_weight: f32,
    pub burn_speed_threshold: f32,
    pub low_fuel_threshold: f32,
    pub low_fuel_speed_factor: f32,
}

impl Default for FuelTuning {
    fn default() -> Self {
        Self {
            base_burn_per_second: 0.6,
            speed_burn_weight: 2.0,
            throttle_burn_weight: 1.0,
            burn_speed_threshold: 0.5,
            low_fuel_threshold: 20.0,
            low_fuel_speed_factor: 0.6,
        }
    }
}

impl FuelTuning {
    pub fn from_config(fuel: &FuelConfig) -> Self {
        Self {
            base_burn_per_second: fuel.base_burn_per_second,
            speed_burn_weight: fuel.speed_burn_weight,
            throttle_burn_weight: fuel.throttle_burn_weight,
            burn_speed_threshold: fuel.burn_speed_threshold,
            low_fuel_threshold: fuel.low_fuel_threshold,
            low_fuel_speed_factor: fuel.low_fuel_speed_factor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelTank {
    tuning: FuelTuning,
    level: f32,
}

impl FuelTank {
    pub fn new(tuning: FuelTuning) -> Self {
        Self {
            tuning,
            level: FULL_TANK,
        }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn refill(&mut self) {
        self.level = FULL_TANK;
    }

    pub fn is_low(&self) -> bool {
        self.level < self.tuning.low_fuel_threshold
    }

    pub fn effective_max_speed(&self, max_speed: f32) -> f32 {
        if self.is_low() {
            max_speed * self.tuning.low_fuel_speed_factor
        } else {
            max_speed
        }
    }

    pub fn burn(&mut self, speed: f32, throttle: f32, max_speed: f32, dt: f32) -> f32 {
        if !dt.is_finite() || dt <= 0.0 || speed.abs() <= self.tuning.burn_speed_threshold {
            return self.level;
        }

        let speed_ratio = if max_speed > 0.0 {
            (speed.abs() / max_speed).min(1.0)
        } else {
            0.0
        };
        let rate = self.tuning.base_burn_per_second
            * (1.0 + self.tuning.speed_burn_weight * speed_ratio)
            * (1.0 + self.tuning.throttle_burn_weight * throttle.clamp(0.0, 1.0));
        self.level = (self.level - rate * dt).clamp(0.0, FULL_TANK);
        self.level
    }
}
