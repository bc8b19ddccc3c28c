//! Front-panel input state machine.
//!
//! Three numbered states, with the state number shown in binary on the
//! two LEDs.  Button 0 toggles between states one and two; button 1
//! advances from two to three; two presses while in state three reset
//! the machine.
//!
//! | State | LED0 | LED1 | btn0      | btn1      | 2 presses |
//! |-------|------|------|-----------|-----------|-----------|
//! | One   | on   | off  | → Two     | —         | —         |
//! | Two   | off  | on   | → One     | → Three   | —         |
//! | Three | on   | on   | —         | —         | → One     |

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    One,
    Two,
    Three,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    B0,
    B1,
}

/// Press bookkeeping and transition rules.  Presses are recorded as
/// they arrive; the rules run when the check-input event is dispatched.
pub struct InputMachine {
    state: InputState,
    /// Presses recorded since entering the current state.
    presses: u8,
    btn0: bool,
    btn1: bool,
}

impl InputMachine {
    pub fn new() -> Self {
        Self {
            state: InputState::One,
            presses: 0,
            btn0: false,
            btn1: false,
        }
    }

    pub fn state(&self) -> InputState {
        self.state
    }

    /// Note a button press.  Transitions apply on the next [`step`](Self::step).
    pub fn record(&mut self, button: Button) {
        match button {
            Button::B0 => self.btn0 = true,
            Button::B1 => self.btn1 = true,
        }
        self.presses = self.presses.saturating_add(1);
    }

    /// Apply the transition rules.  Returns `true` when the state
    /// changed (the caller refreshes the LEDs).
    pub fn step(&mut self) -> bool {
        match self.state {
            InputState::One => {
                if self.btn0 {
                    self.enter(InputState::Two);
                    return true;
                }
            }
            InputState::Two => {
                if self.btn0 {
                    self.enter(InputState::One);
                    return true;
                }
                if self.btn1 {
                    self.enter(InputState::Three);
                    return true;
                }
            }
            InputState::Three => {
                if self.presses >= 2 {
                    self.enter(InputState::One);
                    return true;
                }
            }
        }
        false
    }

    /// The state number in binary on (LED0, LED1).
    pub fn led_pattern(&self) -> (bool, bool) {
        match self.state {
            InputState::One => (true, false),
            InputState::Two => (false, true),
            InputState::Three => (true, true),
        }
    }

    fn enter(&mut self, next: InputState) {
        self.state = next;
        self.presses = 0;
        self.btn0 = false;
        self.btn1 = false;
    }
}

impl Default for InputMachine {
    fn default() -> Self {
        Self::new()
    }
}
