//! Input actions and the cached state the controller reads each tick.

use rapier3d::prelude::Real;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Move,
    Jump,
    Aim,
    /// Camera orbit delta in radians (yaw, pitch).
    Look,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Move => "move",
            Action::Jump => "jump",
            Action::Aim => "aim",
            Action::Look => "look",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "move" => Some(Action::Move),
            "jump" => Some(Action::Jump),
            "aim" => Some(Action::Aim),
            "look" => Some(Action::Look),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    /// The action fired; buttons carry no meaningful value.
    Performed([Real; 2]),
    Canceled,
}

impl InputEvent {
    pub fn pressed() -> Self {
        InputEvent::Performed([1.0, 0.0])
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ActionState {
    pub move_direction: [Real; 2],
    pub jump_pressed: bool,
    pub aiming: bool,
    pub look_delta: [Real; 2],
}

/// What a handled event changed, so the caller can mirror it elsewhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionChange {
    None,
    Aiming(bool),
}

impl ActionState {
    /// Applies one event. Jump presses only register while `grounded`.
    pub fn apply(&mut self, action: Action, event: InputEvent, grounded: bool) -> ActionChange {
        match (action, event) {
            (Action::Move, InputEvent::Performed(value)) => {
                self.move_direction = value;
            }
            (Action::Move, InputEvent::Canceled) => {
                self.move_direction = [0.0, 0.0];
            }
            (Action::Jump, InputEvent::Performed(_)) => {
                if grounded {
                    self.jump_pressed = true;
                }
            }
            (Action::Jump, InputEvent::Canceled) => {
                self.jump_pressed = false;
            }
            (Action::Aim, InputEvent::Performed(_)) => {
                self.aiming = true;
                return ActionChange::Aiming(true);
            }
            (Action::Aim, InputEvent::Canceled) => {
                self.aiming = false;
                return ActionChange::Aiming(false);
            }
            (Action::Look, InputEvent::Performed(delta)) => {
                self.look_delta[0] += delta[0];
                self.look_delta[1] += delta[1];
            }
            (Action::Look, InputEvent::Canceled) => {}
        }
        ActionChange::None
    }

    pub fn take_look_delta(&mut self) -> [Real; 2] {
        std::mem::take(&mut self.look_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_is_cached_until_canceled() {
        let mut state = ActionState::default();
        state.apply(Action::Move, InputEvent::Performed([0.5, -0.5]), true);
        assert_eq!(state.move_direction, [0.5, -0.5]);
        state.apply(Action::Move, InputEvent::Canceled, true);
        assert_eq!(state.move_direction, [0.0, 0.0]);
    }

    #[test]
    fn jump_press_requires_ground() {
        let mut state = ActionState::default();
        state.apply(Action::Jump, InputEvent::pressed(), false);
        assert!(!state.jump_pressed);
        state.apply(Action::Jump, InputEvent::pressed(), true);
        assert!(state.jump_pressed);
        state.apply(Action::Jump, InputEvent::Canceled, false);
        assert!(!state.jump_pressed);
    }

    #[test]
    fn aim_reports_change() {
        let mut state = ActionState::default();
        assert_eq!(
            state.apply(Action::Aim, InputEvent::pressed(), false),
            ActionChange::Aiming(true)
        );
        assert!(state.aiming);
        assert_eq!(
            state.apply(Action::Aim, InputEvent::Canceled, false),
            ActionChange::Aiming(false)
        );
        assert!(!state.aiming);
    }

    #[test]
    fn look_accumulates_and_drains() {
        let mut state = ActionState::default();
        state.apply(Action::Look, InputEvent::Performed([0.1, 0.2]), true);
        state.apply(Action::Look, InputEvent::Performed([0.1, -0.1]), true);
        let delta = state.take_look_delta();
        assert!((delta[0] - 0.2).abs() < 1.0e-6);
        assert!((delta[1] - 0.1).abs() < 1.0e-6);
        assert_eq!(state.take_look_delta(), [0.0, 0.0]);
    }

    #[test]
    fn action_names_round_trip() {
        for action in [Action::Move, Action::Jump, Action::Aim, Action::Look] {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse(" JUMP "), Some(Action::Jump));
        assert_eq!(Action::parse("fire"), None);
    }
}
