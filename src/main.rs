//! Thermasense firmware — main entry point.
//!
//! Event-driven execution with reference-counted sleep arbitration.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                     Interrupt context                          │
//! │                                                                │
//! │   Timer ISR          Pin ISRs          Bus ISR                 │
//! │   (comp0/comp1/uf)   (even/odd edge)   (ACK/NACK/DATA/STOP)    │
//! │        │                  │                │                   │
//! │        ▼                  ▼                ▼                   │
//! │   EventFlags.raise   EventFlags.raise  I2cController.service   │
//! │                                                                │
//! │  ─────────────────────── wake ──────────────────────────       │
//! │                                                                │
//! │   Main loop:  sleep if idle → drain events → repeat            │
//! │   SleepManager decides the deepest permitted wait each pass    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This binary runs the host simulation: the port traits are bound to
//! [`SimBus`], [`HostSleep`] and [`LogIndicators`], so the whole control
//! core — engine, arbiter, event mask, handlers — executes unmodified.
//! The board support crate binds the same traits to the MCU registers.

#![deny(unused_must_use)]

use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::info;

use thermasense::adapters::host_sleep::HostSleep;
use thermasense::adapters::indicators::LogIndicators;
use thermasense::adapters::sim_bus::SimBus;
use thermasense::app::App;
use thermasense::bus::I2cController;
use thermasense::config::SystemConfig;
use thermasense::events::{EventFlags, EventKind};
use thermasense::power::{EnergyMode, SleepManager};
use thermasense::sensors::si7021::Si7021;

/// Starting raw code for the simulated sensor (≈20.6 °C) and its
/// per-read drift (≈0.7 °C), so the demo crosses the ambient threshold
/// after a handful of cycles.
const SIM_START_RAW: u16 = 0x6236;
const SIM_DRIFT: i16 = 0x0100;

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("thermasense v{} (host simulation)", env!("CARGO_PKG_VERSION"));

    let config = SystemConfig::default();

    // ── 2. Shared context ─────────────────────────────────────
    // The event mask and the arbiter are owned here and lent to every
    // component; ISRs get the same shared handles instead of globals.
    let events = EventFlags::new();
    let sleep = SleepManager::new();

    // ── 3. Bus + sensor ───────────────────────────────────────
    let sim = SimBus::new(config.sensor_address, SIM_START_RAW)
        .with_conversion_nacks(1)
        .with_drift(SIM_DRIFT);
    let bus = I2cController::new(sim, &events, &sleep, config.bus_acquire_spin_limit);

    // Sensor settle time before the first command.
    thread::sleep(Duration::from_millis(u64::from(config.sensor_power_up_ms)));

    let sensor = Si7021::new(config.sensor_address);
    let mut app = App::new(&events, &sleep, &bus, sensor, LogIndicators::new(), &config);

    // ── 4. Measurement timer ──────────────────────────────────
    // The low-energy timer needs its clock domain alive for as long as
    // it runs, so starting it registers a blocker on the deepest mode.
    sleep
        .block(EnergyMode::Em4)
        .map_err(thermasense::error::Error::from)?;

    let cycle = Duration::from_secs_f32(config.cycle_period_s);
    let mut sleep_port = HostSleep::new(cycle);

    info!(
        "system ready: {}s cycle, sensor at {:#04x}",
        config.cycle_period_s, config.sensor_address
    );

    // ── 5. Event loop ─────────────────────────────────────────
    let mut cycle_count: u64 = 0;
    loop {
        if events.pending().is_empty() {
            // Nothing to do: take the deepest permitted wait.  The
            // arbiter re-checks under its own critical section, so an
            // event raised between our check and the wait either
            // prevents the sleep or wakes the core immediately.
            sleep.enter_sleep(&mut sleep_port);
            if !sleep_port.take_slept() {
                // A shallow mode is blocked: the core stays awake.
                // Wall time still passes until the timer interrupt.
                thread::sleep(cycle);
            }

            // Timer ISR: one full cycle elapsed.
            cycle_count += 1;
            events.raise(EventKind::TimerComp0);
            events.raise(EventKind::TimerComp1);
            events.raise(EventKind::TimerUnderflow);

            // Pin ISRs: the simulated technician walks the sleep
            // depths now and then.
            if cycle_count % 5 == 0 {
                events.raise(EventKind::PinInterruptEven);
            }
            if cycle_count % 13 == 0 {
                events.raise(EventKind::PinInterruptOdd);
            }
        }

        // Drain everything pending, in fixed priority order.
        if let Err(e) = app.drain() {
            // Protocol or balance violations mean the system can no
            // longer reason about its own state: halt.
            log::error!("fatal: {e} — halting");
            return Err(e.into());
        }

        // Bus ISR: pump the simulator's queued signal conditions
        // through the engine until the wire is quiet.
        while let Some(signals) = bus.with_port(SimBus::take_signals) {
            if let Err(e) = bus.service(signals) {
                log::error!("fatal: {e} — halting");
                return Err(e.into());
            }
        }
    }
}
