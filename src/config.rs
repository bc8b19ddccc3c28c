//! System configuration parameters.
//!
//! All tunable parameters for the monitor.  The values mirror the board
//! defaults; a product build overrides them from the board support
//! crate before constructing the control loop.

/// Core system configuration.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    // --- Measurement timer ---
    /// Full wake-cycle period (seconds).
    pub cycle_period_s: f32,
    /// Active slice within each cycle (seconds).
    pub active_slice_s: f32,

    // --- Sensor ---
    /// 7-bit bus address of the temperature sensor.
    pub sensor_address: u8,
    /// Settle time after sensor power-up (milliseconds).
    pub sensor_power_up_ms: u32,
    /// Ambient threshold for the indicator LED (Celsius).
    pub ambient_threshold_c: f32,

    // --- Bus ---
    /// Spin budget while waiting for the previous transaction's busy
    /// flag.  Exhausting it is a typed error, not a hang.
    pub bus_acquire_spin_limit: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Timer: 3 s cycle with a 25 ms active slice
            cycle_period_s: 3.0,
            active_slice_s: 0.025,

            // Sensor
            sensor_address: 0x40,
            sensor_power_up_ms: 80,
            ambient_threshold_c: 26.0,

            // Bus: a full 2-byte read finishes in well under a million
            // spins at any supported core clock
            bus_acquire_spin_limit: 1_000_000,
        }
    }
}
