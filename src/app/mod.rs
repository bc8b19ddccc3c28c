//! Main-loop event dispatch and front-panel behaviour.
//!
//! [`App`] is the single consumer of the event mask: once per wake cycle
//! it drains every pending kind in the fixed priority order and runs the
//! matching handler.  A bit is always consumed *before* its handler runs,
//! so a kind re-raised mid-handler is dispatched on the next pass rather
//! than lost.
//!
//! Handlers are short and non-blocking.  The only long-running work in
//! the system — the sensor read — is started here but completes in
//! interrupt context; its completion comes back around as another event.

pub mod input;

use log::{info, trace, warn};

use crate::bus::port::BusPort;
use crate::bus::I2cController;
use crate::config::SystemConfig;
use crate::error::Result;
use crate::events::{EventFlags, EventKind};
use crate::power::SleepManager;
use crate::sensors::si7021::Si7021;
use input::{Button, InputMachine};

// ── Indicator port ────────────────────────────────────────────

/// Write-side port for the two front-panel LEDs.
pub trait IndicatorPort {
    fn set_leds(&mut self, led0: bool, led1: bool);
}

// ── Dispatcher ────────────────────────────────────────────────

/// The main-loop controller: owns the per-device drivers and dispatches
/// drained events to them.  Shared subsystems (event mask, arbiter, bus)
/// are borrowed from the entry point's context.
pub struct App<'a, B: BusPort, L: IndicatorPort> {
    events: &'a EventFlags,
    sleep: &'a SleepManager,
    bus: &'a I2cController<'a, B>,
    sensor: Si7021,
    input: InputMachine,
    indicators: L,
    ambient_threshold_c: f32,
    last_temp_c: Option<f32>,
}

impl<'a, B: BusPort, L: IndicatorPort> App<'a, B, L> {
    pub fn new(
        events: &'a EventFlags,
        sleep: &'a SleepManager,
        bus: &'a I2cController<'a, B>,
        sensor: Si7021,
        mut indicators: L,
        config: &SystemConfig,
    ) -> Self {
        let input = InputMachine::new();
        let (led0, led1) = input.led_pattern();
        indicators.set_leds(led0, led1);
        Self {
            events,
            sleep,
            bus,
            sensor,
            input,
            indicators,
            ambient_threshold_c: config.ambient_threshold_c,
            last_temp_c: None,
        }
    }

    /// Drain every currently pending event once, in priority order.
    ///
    /// One pass per wake cycle: bits raised by these handlers (or by an
    /// interrupt landing mid-pass) keep the loop awake and are picked up
    /// on the next pass.
    pub fn drain(&mut self) -> Result<()> {
        for kind in EventKind::PRIORITY {
            if self.events.pending().contains(kind) {
                self.events.consume(kind);
                self.handle(kind)?;
            }
        }
        Ok(())
    }

    fn handle(&mut self, kind: EventKind) -> Result<()> {
        match kind {
            // Pin-change lines fan out to their buttons.
            EventKind::PinInterruptEven => self.events.raise(EventKind::Button0Pressed),
            EventKind::PinInterruptOdd => self.events.raise(EventKind::Button1Pressed),

            EventKind::Button0Pressed => self.on_button(Button::B0)?,
            EventKind::Button1Pressed => self.on_button(Button::B1)?,

            EventKind::CheckInput => {
                if self.input.step() {
                    let (led0, led1) = self.input.led_pattern();
                    self.indicators.set_leds(led0, led1);
                    info!("input: state {:?}", self.input.state());
                }
            }

            // Cycle-top and active-slice hooks; nothing wired to them yet.
            EventKind::TimerComp0 => trace!("timer: comp0"),
            EventKind::TimerComp1 => trace!("timer: comp1"),

            EventKind::TimerUnderflow => self.sensor.start_temp_read(self.bus)?,

            EventKind::SensorReadComplete => self.on_reading(),
        }
        Ok(())
    }

    /// A button press steps the profiling blocker and feeds the input
    /// machine.
    fn on_button(&mut self, button: Button) -> Result<()> {
        self.step_blocked_mode(button)?;
        self.input.record(button);
        self.events.raise(EventKind::CheckInput);
        Ok(())
    }

    /// Power-profiling control: button 0 moves the shallowest active
    /// blocker one mode shallower (wrapping to the deepest), button 1
    /// one mode deeper (wrapping to fully active).  Lets a technician
    /// walk the device through every sleep depth in the field.
    fn step_blocked_mode(&mut self, button: Button) -> Result<()> {
        let Some(current) = self.sleep.current_blocked_mode() else {
            warn!("input: no blocked mode to step");
            return Ok(());
        };
        self.sleep.unblock(current)?;
        let next = match button {
            Button::B0 => current.shallower().unwrap_or(crate::power::EnergyMode::Em4),
            Button::B1 => current.deeper().unwrap_or(crate::power::EnergyMode::Em0),
        };
        self.sleep.block(next)?;
        info!("power: blocked mode stepped {current} -> {next}");
        Ok(())
    }

    /// Convert the completed reading and drive the warm/cool indicator.
    fn on_reading(&mut self) {
        let raw = self.bus.last_reading();
        let temp = Si7021::convert_temp(raw);
        self.last_temp_c = Some(temp);
        info!("sensor: {temp:.2} C (raw {raw:#06x})");
        if temp >= self.ambient_threshold_c {
            self.indicators.set_leds(false, true);
        } else {
            self.indicators.set_leds(false, false);
        }
    }

    /// Most recent converted temperature, if a read has completed.
    pub fn last_temperature_c(&self) -> Option<f32> {
        self.last_temp_c
    }

    /// Current front-panel state (diagnostics and tests).
    pub fn input_state(&self) -> input::InputState {
        self.input.state()
    }

    /// Access the indicator port (tests).
    pub fn indicators(&self) -> &L {
        &self.indicators
    }
}
