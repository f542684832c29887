use crate::gameplay::sections::PointOfInterest;
use crate::input::InputState;
use bevy::prelude::*;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum InteractionState {
    #[default]
    Driving,
    PanelOpen { section: PointOfInterest },
}

#[derive(Message, Debug, Clone, PartialEq)]
pub enum InteractionEvent {
    Opened { section_id: String, title: String },
    Closed { section_id: String },
}

#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    state: InteractionState,
}

impl InteractionController {
    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn is_panel_open(&self) -> bool {
        matches!(self.state, InteractionState::PanelOpen { .. })
    }

    pub fn active_section(&self) -> Option<&PointOfInterest> {
        match &self.state {
            InteractionState::PanelOpen { section } => Some(section),
            InteractionState::Driving => None,
        }
    }

    pub fn try_open(
        &mut self,
        nearest: Option<&PointOfInterest>,
        input: &mut InputState,
    ) -> Option<InteractionEvent> {
        if self.is_panel_open() {
            return None;
        }
        let section = nearest?;

        input.clear();
        self.state = InteractionState::PanelOpen {
            section: section.clone(),
        };
        Some(InteractionEvent::Opened {
            section_id: section.id.clone(),
            title: section.title.clone(),
        })
    }

    pub fn close(&mut self, input: &mut InputState) -> Option<InteractionEvent> {
        let InteractionState::PanelOpen { section } = std::mem::take(&mut self.state) else {
            return None;
        };

        input.clear();
        Some(InteractionEvent::Closed {
            section_id: section.id,
        })
    }

    pub fn toggle(
        &mut self,
        nearest: Option<&PointOfInterest>,
        input: &mut InputState,
    ) -> Option<InteractionEvent> {
        if self.is_panel_open() {
            self.close(input)
        } else {
            self.try_open(nearest, input)
        }
    }

    pub fn handle_actions(
        &mut self,
        nearest: Option<&PointOfInterest>,
        input: &mut InputState,
    ) -> Option<InteractionEvent> {
        let (interact, close, toggle) = (input.interact, input.close, input.toggle);
        input.clear_actions();

        if close {
            if let Some(event) = self.close(input) {
                return Some(event);
            }
        }
        if toggle {
            return self.toggle(nearest, input);
        }
        if interact {
            return self.try_open(nearest, input);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_section;

    fn section() -> PointOfInterest {
        PointOfInterest::from_config(&sample_section("projects", [50.0, -15.0]))
    }

    fn held_input() -> InputState {
        InputState {
            accelerate: true,
            steer_left: true,
            ..default()
        }
    }

    #[test]
    fn interact_without_nearby_section_stays_driving() {
        let mut controller = InteractionController::default();
        let mut input = held_input();

        assert_eq!(controller.try_open(None, &mut input), None);
        assert!(!controller.is_panel_open());
        assert!(input.accelerate);
    }

    #[test]
    fn opening_clears_held_input() {
        let mut controller = InteractionController::default();
        let section = section();
        let mut input = held_input();

        let event = controller.try_open(Some(&section), &mut input);

        assert_eq!(
            event,
            Some(InteractionEvent::Opened {
                section_id: "projects".to_string(),
                title: "projects title".to_string(),
            })
        );
        assert_eq!(controller.active_section(), Some(&section));
        assert_eq!(input, InputState::default());
    }

    #[test]
    fn closing_clears_held_input_and_returns_to_driving() {
        let mut controller = InteractionController::default();
        let section = section();
        controller.try_open(Some(&section), &mut InputState::default());
        let mut input = held_input();

        let event = controller.close(&mut input);

        assert!(matches!(event, Some(InteractionEvent::Closed { .. })));
        assert_eq!(controller.state(), &InteractionState::Driving);
        assert!(input.controls().is_idle());
    }

    #[test]
    fn close_is_reachable_after_catalog_is_dropped() {
        let mut controller = InteractionController::default();
        {
            let catalog = vec![section()];
            controller.try_open(catalog.first(), &mut InputState::default());
        }

        assert_eq!(controller.active_section().map(|s| s.id.as_str()), Some("projects"));
        assert!(controller.close(&mut InputState::default()).is_some());
        assert!(!controller.is_panel_open());
    }

    #[test]
    fn close_while_driving_is_ignored() {
        let mut controller = InteractionController::default();
        let mut input = held_input();

        assert_eq!(controller.close(&mut input), None);
        assert!(input.accelerate);
    }

    #[test]
    fn toggle_opens_then_closes() {
        let mut controller = InteractionController::default();
        let section = section();
        let mut input = InputState::default();

        assert!(matches!(
            controller.toggle(Some(&section), &mut input),
            Some(InteractionEvent::Opened { .. })
        ));
        assert!(matches!(
            controller.toggle(None, &mut input),
            Some(InteractionEvent::Closed { .. })
        ));
    }

    #[test]
    fn latched_actions_are_consumed() {
        let mut controller = InteractionController::default();
        let section = section();
        let mut input = InputState {
            interact: true,
            ..default()
        };

        assert!(controller.handle_actions(Some(&section), &mut input).is_some());
        assert!(!input.interact);
        assert_eq!(controller.handle_actions(Some(&section), &mut input), None);

        input.close = true;
        input.interact = true;
        assert!(matches!(
            controller.handle_actions(Some(&section), &mut input),
            Some(InteractionEvent::Closed { .. })
        ));
        assert!(!controller.is_panel_open());
    }
}
