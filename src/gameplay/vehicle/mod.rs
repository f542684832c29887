use crate::config::VehicleConfig;
use bevy::prelude::*;
use std::f32::consts::TAU;

const LINEARISED_RATE_EPSILON: f32 = 1.0e-6;
const WHEEL_STEER_RATE_PER_FRAME: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleTuning {
    pub max_speed: f32,
    pub acceleration: f32,
    pub acceleration_gain: f32,
    pub power_floor: f32,
    pub brake_strength: f32,
    pub reverse_strength: f32,
    pub reverse_fraction: f32,
    pub friction: f32,
    pub reference_frame_rate: f32,
    pub steer_activation_speed: f32,
    pub turn_speed: f32,
    pub full_turn_speed: f32,
    pub max_wheel_angle: f32,
    pub wheel_return: f32,
    pub max_step_seconds: f32,
    pub half_size: Vec2,
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
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
            max_wheel_angle: 30.0_f32.to_radians(),
            wheel_return: 0.85,
            max_step_seconds: 1.0 / 30.0,
            half_size: Vec2::new(1.0, 2.0),
        }
    }
}

impl VehicleTuning {
    pub fn from_config(vehicle: &VehicleConfig) -> Self {
        Self {
            max_speed: vehicle.max_speed,
            acceleration: vehicle.acceleration,
            acceleration_gain: vehicle.acceleration_gain,
            power_floor: vehicle.power_floor,
            brake_strength: vehicle.brake_strength,
            reverse_strength: vehicle.reverse_strength,
            reverse_fraction: vehicle.reverse_fraction,
            friction: vehicle.friction,
            reference_frame_rate: vehicle.reference_frame_rate,
            steer_activation_speed: vehicle.steer_activation_speed,
            turn_speed: vehicle.turn_speed,
            full_turn_speed: vehicle.full_turn_speed,
            max_wheel_angle: vehicle.max_wheel_angle_degrees.to_radians(),
            wheel_return: vehicle.wheel_return,
            max_step_seconds: vehicle.max_step_seconds,
            half_size: Vec2::from(vehicle.half_size),
        }
    }

    // exp(-k * dt) == friction^(dt * reference_frame_rate)
    pub fn friction_rate(&self) -> f32 {
        -self.friction.clamp(f32::MIN_POSITIVE, 1.0).ln() * self.reference_frame_rate
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlInput {
    pub accelerate: bool,
    pub reverse: bool,
    pub steer_left: bool,
    pub steer_right: bool,
}

impl ControlInput {
    pub fn steer(&self) -> f32 {
        match (self.steer_left, self.steer_right) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }

    pub fn throttle(&self) -> f32 {
        if self.accelerate {
            1.0
        } else {
            0.0
        }
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub position: Vec2,
    pub heading: f32,
    pub speed: f32,
    pub wheel_angle: f32,
}

impl VehicleState {
    pub fn at_rest(position: Vec2, heading: f32) -> Self {
        Self {
            position,
            heading: wrap_heading(heading),
            speed: 0.0,
            wheel_angle: 0.0,
        }
    }

    pub fn forward(&self) -> Vec2 {
        Vec2::new(self.heading.sin(), self.heading.cos())
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.heading.is_finite()
            && self.speed.is_finite()
            && self.wheel_angle.is_finite()
    }
}

// rem_euclid alone can round tiny negatives up to TAU.
pub fn wrap_heading(heading: f32) -> f32 {
    let wrapped = heading.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

#[derive(Debug, Clone)]
pub struct VehicleModel {
    tuning: VehicleTuning,
    state: VehicleState,
}

impl VehicleModel {
    pub fn new(tuning: VehicleTuning, spawn: VehicleState) -> Self {
        Self {
            tuning,
            state: spawn,
        }
    }

    pub fn tuning(&self) -> &VehicleTuning {
        &self.tuning
    }

    pub fn set_tuning(&mut self, tuning: VehicleTuning) {
        self.tuning = tuning;
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut VehicleState {
        &mut self.state
    }

    pub fn reset(&mut self, spawn: VehicleState) {
        self.state = spawn;
    }

    pub fn max_reverse_speed(&self, max_speed: f32) -> f32 {
        (max_speed * self.tuning.reverse_fraction).max(0.0)
    }

    pub fn step(&mut self, input: &ControlInput, dt: f32, max_speed: f32) -> VehicleState {
        if !dt.is_finite() || dt <= 0.0 {
            return self.state;
        }
        let dt = dt.min(self.tuning.max_step_seconds);
        let max_speed = max_speed.max(f32::EPSILON);
        let frames = dt * self.tuning.reference_frame_rate;

        let speed = self.integrate_speed(input, dt, max_speed);
        self.state.speed = speed.clamp(-self.max_reverse_speed(max_speed), max_speed);

        let steer = input.steer();
        if steer != 0.0 && self.state.speed.abs() > self.tuning.steer_activation_speed {
            let turn_rate = self.tuning.turn_speed
                * (self.state.speed.abs() / self.tuning.full_turn_speed).min(1.0);
            let direction = if self.state.speed < 0.0 { -steer } else { steer };
            self.state.heading = wrap_heading(self.state.heading + direction * turn_rate * frames);
        }

        if steer != 0.0 {
            self.state.wheel_angle = (self.state.wheel_angle
                + steer * self.tuning.max_wheel_angle * WHEEL_STEER_RATE_PER_FRAME * frames)
                .clamp(-self.tuning.max_wheel_angle, self.tuning.max_wheel_angle);
        } else {
            self.state.wheel_angle *= self.tuning.wheel_return.powf(frames);
        }

        let forward = self.state.forward();
        self.state.position += forward * self.state.speed * dt;
        self.state
    }

    // ds/dt = drive(s) - k*s, drive linearised around the current speed.
    fn integrate_speed(&self, input: &ControlInput, dt: f32, max_speed: f32) -> f32 {
        let tuning = &self.tuning;
        let speed = self.state.speed;
        let gain = tuning.acceleration_gain;

        let mut drive = 0.0;
        let mut drive_slope = 0.0;
        if input.accelerate {
            let peak = tuning.acceleration * gain;
            let power = 1.0 - speed / max_speed;
            if power > tuning.power_floor {
                drive += peak * power;
                drive_slope -= peak / max_speed;
            } else {
                drive += peak * tuning.power_floor;
            }
        }
        if input.reverse {
            drive -= if speed > 0.0 {
                tuning.brake_strength * gain
            } else {
                tuning.reverse_strength * gain
            };
        }

        let constant = drive - drive_slope * speed;
        let rate = tuning.friction_rate() - drive_slope;
        if rate.abs() < LINEARISED_RATE_EPSILON {
            return speed + constant * dt;
        }

        let decay = (-rate * dt).exp();
        speed * decay + (constant / rate) * (1.0 - decay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f32 = 1.0 / 60.0;

    fn accelerate() -> ControlInput {
        ControlInput {
            accelerate: true,
            ..default()
        }
    }

    fn reverse() -> ControlInput {
        ControlInput {
            reverse: true,
            ..default()
        }
    }

    fn model() -> VehicleModel {
        VehicleModel::new(VehicleTuning::default(), VehicleState::at_rest(Vec2::ZERO, 0.0))
    }

    #[test]
    fn sustained_throttle_never_exceeds_max_speed() {
        let mut vehicle = model();
        let max_speed = vehicle.tuning().max_speed;
        let frame_times = [FRAME, 0.001, 0.25, 1.0 / 144.0, 3.0];

        for index in 0..20_000 {
            let state = vehicle.step(&accelerate(), frame_times[index % frame_times.len()], max_speed);
            assert!(state.speed.abs() <= max_speed, "speed {} at step {index}", state.speed);
        }
    }

    #[test]
    fn lowered_max_speed_is_applied_immediately() {
        let mut vehicle = model();
        vehicle.state_mut().speed = 35.0;

        let state = vehicle.step(&ControlInput::default(), FRAME, 24.0);

        assert!(state.speed <= 24.0);
    }

    #[test]
    fn sustained_reverse_never_exceeds_reverse_cap() {
        let mut vehicle = model();
        let max_speed = vehicle.tuning().max_speed;
        let floor = -max_speed * vehicle.tuning().reverse_fraction;
        vehicle.state_mut().speed = 20.0;

        for _ in 0..5_000 {
            let state = vehicle.step(&reverse(), FRAME, max_speed);
            assert!(state.speed >= floor - 1.0e-4, "speed {}", state.speed);
        }
        assert!(vehicle.state().speed < 0.0);
    }

    #[test]
    fn braking_while_rolling_forward_is_stronger_than_reverse_drive() {
        let mut braking = model();
        braking.state_mut().speed = 10.0;
        let braked = braking.step(&reverse(), FRAME, 40.0).speed;

        let mut reversing = model();
        let reversed = reversing.step(&reverse(), FRAME, 40.0).speed;

        assert!(10.0 - braked > -reversed);
    }

    #[test]
    fn friction_decays_toward_zero_without_sign_change() {
        for initial in [25.0_f32, -9.0] {
            let mut vehicle = model();
            vehicle.state_mut().speed = initial;
            let mut previous = initial.abs();

            for _ in 0..2_000 {
                let state = vehicle.step(&ControlInput::default(), FRAME, 40.0);
                assert!(state.speed.abs() <= previous);
                assert_eq!(state.speed.signum(), initial.signum());
                previous = state.speed.abs();
            }
            assert!(previous < 0.01);
        }
    }

    #[test]
    fn idle_friction_matches_per_frame_multiplier() {
        let mut vehicle = model();
        vehicle.state_mut().speed = 20.0;

        let state = vehicle.step(&ControlInput::default(), FRAME, 40.0);

        assert!((state.speed - 20.0 * 0.985).abs() < 1.0e-4);
    }

    #[test]
    fn one_long_step_matches_ten_short_steps() {
        let tuning = VehicleTuning {
            max_step_seconds: 0.25,
            ..default()
        };

        for (input, initial) in [(accelerate(), 0.0), (accelerate(), 12.0), (reverse(), -2.0)] {
            let mut coarse = VehicleModel::new(tuning, VehicleState::at_rest(Vec2::ZERO, 0.0));
            coarse.state_mut().speed = initial;
            let mut fine = coarse.clone();

            coarse.step(&input, 0.1, tuning.max_speed);
            for _ in 0..10 {
                fine.step(&input, 0.01, tuning.max_speed);
            }

            let difference = (coarse.state().speed - fine.state().speed).abs();
            assert!(
                difference < 0.05,
                "coarse {} fine {}",
                coarse.state().speed,
                fine.state().speed
            );
        }
    }

    #[test]
    fn non_positive_or_invalid_dt_is_a_no_op() {
        let mut vehicle = model();
        vehicle.state_mut().speed = 5.0;
        let before = *vehicle.state();

        for dt in [0.0, -0.2, f32::NAN, f32::INFINITY] {
            assert_eq!(vehicle.step(&accelerate(), dt, 40.0), before);
        }
    }

    #[test]
    fn large_dt_is_capped_to_one_max_step() {
        let mut capped = model();
        let mut reference = model();

        capped.step(&accelerate(), 5.0, 40.0);
        reference.step(&accelerate(), 1.0 / 30.0, 40.0);

        assert_eq!(capped.state(), reference.state());
    }

    #[test]
    fn two_seconds_of_throttle_from_spawn_moves_forward_monotonically() {
        let mut vehicle = model();
        let mut previous = *vehicle.state();

        for _ in 0..120 {
            let state = vehicle.step(&accelerate(), FRAME, 40.0);
            assert!(state.speed > previous.speed);
            assert!(state.position.y > previous.position.y);
            assert_eq!(state.position.x, 0.0);
            previous = state;
        }

        assert!(previous.speed > 20.0 && previous.speed <= 40.0);
    }

    #[test]
    fn steering_requires_minimum_speed() {
        let mut vehicle = model();
        vehicle.state_mut().speed = 0.3;
        let input = ControlInput {
            steer_left: true,
            ..default()
        };

        let state = vehicle.step(&input, FRAME, 40.0);

        assert_eq!(state.heading, 0.0);
        assert!(state.wheel_angle > 0.0);
    }

    #[test]
    fn steering_is_inverted_in_reverse() {
        let input = ControlInput {
            steer_left: true,
            ..default()
        };

        let mut forward = model();
        forward.state_mut().speed = 8.0;
        let forward_heading = forward.step(&input, FRAME, 40.0).heading;

        let mut backward = model();
        backward.state_mut().speed = -8.0;
        let backward_heading = backward.step(&input, FRAME, 40.0).heading;

        assert!(forward_heading > 0.0 && forward_heading < 1.0);
        assert!(backward_heading > TAU - 1.0);
    }

    #[test]
    fn heading_stays_wrapped_over_long_sessions() {
        let mut vehicle = model();
        let input = ControlInput {
            accelerate: true,
            steer_right: true,
            ..default()
        };

        for _ in 0..100_000 {
            let state = vehicle.step(&input, FRAME, 40.0);
            assert!((0.0..TAU).contains(&state.heading));
        }
    }

    #[test]
    fn wheel_angle_recentres_when_steering_released() {
        let mut vehicle = model();
        vehicle.state_mut().wheel_angle = 0.4;

        for _ in 0..60 {
            vehicle.step(&ControlInput::default(), FRAME, 40.0);
        }

        assert!(vehicle.state().wheel_angle.abs() < 0.01);
    }

    #[test]
    fn negative_reverse_fraction_disables_reverse_instead_of_panicking() {
        let mut vehicle = VehicleModel::new(
            VehicleTuning {
                reverse_fraction: -2.0,
                ..default()
            },
            VehicleState::at_rest(Vec2::ZERO, 0.0),
        );
        let input = ControlInput {
            reverse: true,
            ..default()
        };

        vehicle.step(&input, FRAME, 40.0);

        assert_eq!(vehicle.state().speed, 0.0);
    }
}
