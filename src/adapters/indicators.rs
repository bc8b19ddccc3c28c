//! Indicator LED adapters.

use embedded_hal::digital::OutputPin;
use log::info;

use crate::app::IndicatorPort;

/// Drives the two front-panel LEDs through `embedded-hal` output pins.
/// Pin errors are ignored: the indicator is best-effort and the GPIO
/// blocks on these parts are infallible anyway.
pub struct PinIndicators<L0: OutputPin, L1: OutputPin> {
    led0: L0,
    led1: L1,
}

impl<L0: OutputPin, L1: OutputPin> PinIndicators<L0, L1> {
    pub fn new(led0: L0, led1: L1) -> Self {
        Self { led0, led1 }
    }
}

impl<L0: OutputPin, L1: OutputPin> IndicatorPort for PinIndicators<L0, L1> {
    fn set_leds(&mut self, led0: bool, led1: bool) {
        self.led0.set_state(led0.into()).ok();
        self.led1.set_state(led1.into()).ok();
    }
}

/// Host-simulation indicators: logs pattern changes instead of driving
/// pins.
pub struct LogIndicators {
    last: Option<(bool, bool)>,
}

impl LogIndicators {
    pub fn new() -> Self {
        Self { last: None }
    }
}

impl Default for LogIndicators {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorPort for LogIndicators {
    fn set_leds(&mut self, led0: bool, led1: bool) {
        if self.last != Some((led0, led1)) {
            self.last = Some((led0, led1));
            info!(
                "leds: LED0 {} | LED1 {}",
                if led0 { "on" } else { "off" },
                if led1 { "on" } else { "off" }
            );
        }
    }
}
