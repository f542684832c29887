use crate::gameplay::session::drive_loop_running;
use crate::gameplay::vehicle::ControlInput;
use crate::states::GameState;
use crate::web::VirtualControlState;
use bevy::prelude::*;

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InputState>()
            .init_resource::<InputBindings>()
            .add_systems(OnEnter(GameState::Driving), reset_input_state)
            .add_systems(OnExit(GameState::Driving), reset_input_state)
            .add_systems(
                Update,
                read_drive_input
                    .in_set(DriveInputSet)
                    .run_if(in_state(GameState::Driving))
                    .run_if(drive_loop_running),
            );
    }
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct DriveInputSet;

#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub accelerate: bool,
    pub reverse: bool,
    pub steer_left: bool,
    pub steer_right: bool,
    pub interact: bool,
    pub close: bool,
    pub toggle: bool,
}

impl InputState {
    pub fn controls(&self) -> ControlInput {
        ControlInput {
            accelerate: self.accelerate,
            reverse: self.reverse,
            steer_left: self.steer_left,
            steer_right: self.steer_right,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn clear_actions(&mut self) {
        self.interact = false;
        self.close = false;
        self.toggle = false;
    }
}

#[derive(Resource, Debug, Clone)]
pub struct InputBindings {
    pub accelerate: Vec<KeyCode>,
    pub reverse: Vec<KeyCode>,
    pub steer_left: Vec<KeyCode>,
    pub steer_right: Vec<KeyCode>,
    pub interact: Vec<KeyCode>,
    pub close: Vec<KeyCode>,
}

impl Default for InputBindings {
    fn default() -> Self {
        Self {
            accelerate: vec![KeyCode::KeyW, KeyCode::ArrowUp],
            reverse: vec![KeyCode::KeyS, KeyCode::ArrowDown],
            steer_left: vec![KeyCode::KeyA, KeyCode::ArrowLeft],
            steer_right: vec![KeyCode::KeyD, KeyCode::ArrowRight],
            interact: vec![KeyCode::KeyE],
            close: vec![KeyCode::KeyQ, KeyCode::Escape],
        }
    }
}

fn reset_input_state(mut input_state: ResMut<InputState>) {
    input_state.clear();
}

fn read_drive_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<InputBindings>,
    virtual_controls: Option<Res<VirtualControlState>>,
    mut input_state: ResMut<InputState>,
) {
    let touch = virtual_controls.map(|controls| *controls).unwrap_or_default();
    apply_keyboard_and_touch(&keyboard, &bindings, &touch, &mut input_state);
}

// Actions latch until the drive step consumes them.
pub fn apply_keyboard_and_touch(
    keyboard: &ButtonInput<KeyCode>,
    bindings: &InputBindings,
    touch: &VirtualControlState,
    input_state: &mut InputState,
) {
    let held = |keys: &[KeyCode]| keys.iter().any(|key| keyboard.pressed(*key));
    let pressed = |keys: &[KeyCode]| keys.iter().any(|key| keyboard.just_pressed(*key));
    // Shift+Escape leaves drive mode instead of closing a panel.
    let shift = keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]);

    input_state.accelerate = held(&bindings.accelerate) || touch.accelerate;
    input_state.reverse = held(&bindings.reverse) || touch.reverse;
    input_state.steer_left = held(&bindings.steer_left) || touch.steer_left;
    input_state.steer_right = held(&bindings.steer_right) || touch.steer_right;
    input_state.interact |= pressed(&bindings.interact);
    input_state.close |= !shift && pressed(&bindings.close);
    input_state.toggle |= touch.interact_just_pressed;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_and_touch_merge_into_held_flags() {
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::ArrowUp);
        let touch = VirtualControlState {
            steer_left: true,
            ..default()
        };
        let mut state = InputState::default();

        apply_keyboard_and_touch(&keyboard, &InputBindings::default(), &touch, &mut state);

        assert!(state.accelerate && state.steer_left);
        assert!(!state.reverse && !state.steer_right);
        assert_eq!(
            state.controls(),
            ControlInput {
                accelerate: true,
                steer_left: true,
                ..default()
            }
        );
    }

    #[test]
    fn actions_latch_until_cleared() {
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::KeyE);
        let mut state = InputState::default();
        let bindings = InputBindings::default();
        let touch = VirtualControlState::default();

        apply_keyboard_and_touch(&keyboard, &bindings, &touch, &mut state);
        keyboard.clear();
        apply_keyboard_and_touch(&keyboard, &bindings, &touch, &mut state);
        assert!(state.interact);

        state.clear_actions();
        assert!(!state.interact);
    }

    #[test]
    fn shift_escape_is_not_a_panel_close() {
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::ShiftLeft);
        keyboard.press(KeyCode::Escape);
        let mut state = InputState::default();

        apply_keyboard_and_touch(
            &keyboard,
            &InputBindings::default(),
            &VirtualControlState::default(),
            &mut state,
        );

        assert!(!state.close);
    }

    #[test]
    fn clear_drops_held_controls() {
        let mut state = InputState {
            accelerate: true,
            steer_right: true,
            close: true,
            ..default()
        };

        state.clear();

        assert_eq!(state, InputState::default());
        assert!(state.controls().is_idle());
    }
}
