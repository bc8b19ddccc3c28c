//! Si7021 digital humidity/temperature sensor (temperature channel).
//!
//! The sensor sits on the two-wire bus at address `0x40`.  A measurement
//! is the "no hold master" flow: write the measure command, repeated
//! START, then read two data bytes MSB-first while the device NACKs the
//! read address until conversion finishes (the engine's retry path
//! absorbs that).  Conversion to Celsius follows the datasheet formula.

use crate::bus::port::BusPort;
use crate::bus::{I2cController, ReadRequest};
use crate::error::Result;
use crate::events::EventKind;

/// Default 7-bit bus address.
pub const I2C_ADDRESS: u8 = 0x40;

/// Measure temperature, no hold master mode.
pub const CMD_MEASURE_TEMP: u8 = 0xF3;

/// A temperature measurement is two data bytes, MSB first.
const TEMP_READ_LEN: u8 = 2;

/// Si7021 driver: owns the addressing and command details, delegates
/// the wire work to the bus engine.
pub struct Si7021 {
    address: u8,
}

impl Si7021 {
    pub fn new(address: u8) -> Self {
        Self { address }
    }

    /// Kick off an asynchronous temperature read.  The engine raises
    /// [`EventKind::SensorReadComplete`] when the raw value is ready in
    /// its result register.
    pub fn start_temp_read<P: BusPort>(&self, bus: &I2cController<'_, P>) -> Result<()> {
        bus.start_read(ReadRequest {
            device_address: self.address,
            command: CMD_MEASURE_TEMP,
            len: TEMP_READ_LEN,
            completion: EventKind::SensorReadComplete,
        })
    }

    /// Datasheet conversion from the 16-bit raw temperature code.
    pub fn convert_temp(raw: u32) -> f32 {
        175.72 * raw as f32 / 65536.0 - 46.85
    }
}

impl Default for Si7021 {
    fn default() -> Self {
        Self::new(I2C_ADDRESS)
    }
}
