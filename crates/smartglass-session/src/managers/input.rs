//! `SystemInput` — gamepad state.
//!
//! Stateless beyond the channel binding itself: the console never sends
//! anything meaningful back over this channel, so a message arriving
//! here is always unexpected.

use smartglass_protocol::enums::GamePadButton;
use smartglass_protocol::payloads::{Gamepad, Payload};

#[derive(Debug, Default)]
pub struct InputManager;

impl InputManager {
    pub fn new() -> Self {
        Self
    }

    /// Build a gamepad-state payload stamped with the given timestamp
    /// (seconds since whatever epoch the caller chooses — the wire
    /// format only cares that it increases).
    #[allow(clippy::too_many_arguments)]
    pub fn gamepad_input(
        &self,
        timestamp: u64,
        buttons: GamePadButton,
        left_trigger: f32,
        right_trigger: f32,
        left_thumbstick_x: f32,
        left_thumbstick_y: f32,
        right_thumbstick_x: f32,
        right_thumbstick_y: f32,
    ) -> Payload {
        Payload::Gamepad(Gamepad {
            timestamp,
            buttons,
            left_trigger,
            right_trigger,
            left_thumbstick_x,
            left_thumbstick_y,
            right_thumbstick_x,
            right_thumbstick_y,
        })
    }

    /// Every message this channel receives is unexpected.
    pub fn handle_message(&self, payload: &Payload) {
        tracing::warn!(?payload, "unexpected message on SystemInput channel");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gamepad_input_stamps_all_axes() {
        let mgr = InputManager::new();
        let payload = mgr.gamepad_input(42, GamePadButton::A | GamePadButton::B, 0.0, 1.0, -1.0, 0.5, 0.0, 0.0);
        match payload {
            Payload::Gamepad(g) => {
                assert_eq!(g.timestamp, 42);
                assert!(g.buttons.contains(GamePadButton::A));
                assert!(g.buttons.contains(GamePadButton::B));
                assert_eq!(g.right_trigger, 1.0);
            }
            _ => panic!("expected Gamepad payload"),
        }
    }
}
