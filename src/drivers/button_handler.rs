use crate::config::BUTTON_DEBOUNCE_POLLS;

/// Bit of the pressed mask for the top-line button
pub const TOP_BUTTON: u8 = 0b01;
/// Bit of the pressed mask for the bottom-line button
pub const BOTTOM_BUTTON: u8 = 0b10;
const BOTH_BUTTONS: u8 = TOP_BUTTON | BOTTOM_BUTTON;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    CycleTop,
    CycleBottom,
    /// Both buttons together: fold and zero the session counters
    ResetSession,
}

/// Debounces the two-bit pressed mask and turns accepted presses into actions
pub struct ButtonHandler {
    state: u8,
    candidate: u8,
    debounce_counter: u8,
}

impl ButtonHandler {
    pub const fn new() -> Self {
        Self {
            state: 0,
            candidate: 0,
            debounce_counter: 0,
        }
    }

    /// Feed one poll of the pressed mask (bit set = pressed)
    pub fn poll(&mut self, raw: u8) -> Option<ButtonAction> {
        let raw = raw & BOTH_BUTTONS;

        if raw == self.state {
            self.debounce_counter = 0;
            return None;
        }

        if raw != self.candidate {
            self.candidate = raw;
            self.debounce_counter = 0;
        }
        self.debounce_counter = self.debounce_counter.saturating_add(1);
        if self.debounce_counter < BUTTON_DEBOUNCE_POLLS {
            return None;
        }

        self.state = raw;
        self.debounce_counter = 0;
        match raw {
            TOP_BUTTON => Some(ButtonAction::CycleTop),
            BOTTOM_BUTTON => Some(ButtonAction::CycleBottom),
            BOTH_BUTTONS => Some(ButtonAction::ResetSession),
            _ => None,
        }
    }

    pub fn pressed(&self) -> u8 {
        self.state
    }
}

impl Default for ButtonHandler {
    fn default() -> Self {
        Self::new()
    }
}
