//! Simulated two-wire bus with an Si7021-style device on the far end.
//!
//! Implements [`BusPort`] by emulating the addressed sensor: it answers
//! the write address, accepts a command byte, NACKs the read address
//! while a "conversion" is pending, then serves the measurement bytes
//! one ACK at a time.  Signals the real controller would raise as
//! interrupts are queued here instead; the main loop pumps them into
//! [`I2cController::service`](crate::bus::I2cController::service) via
//! [`take_signals`](SimBus::take_signals), playing the role of the ISR.

use heapless::{Deque, Vec};
use log::trace;

use crate::bus::port::BusPort;
use crate::bus::{Signal, SignalSet};

/// Queued-signal capacity; a transaction never has more than a couple
/// of conditions outstanding.
const SIGNAL_QUEUE_CAP: usize = 8;

/// Emulated sensor on a simulated bus.
pub struct SimBus {
    /// 7-bit address the device answers to.
    address: u8,
    /// Raw 16-bit code returned by the next measurement.
    measurement: u16,
    /// Added to the measurement after each read (demo liveliness).
    drift_per_read: i16,
    /// NACKs served on the read address before data is ready,
    /// emulating the conversion time of a real no-hold read.
    conversion_nacks: u8,
    nacks_remaining: u8,
    /// Measurement bytes for the read in progress.
    bytes: Vec<u8, 4>,
    /// Next byte to clock out.
    cursor: usize,
    /// The byte behind the data-ready condition.
    data_reg: u8,
    queue: Deque<SignalSet, SIGNAL_QUEUE_CAP>,
}

impl SimBus {
    pub fn new(address: u8, measurement: u16) -> Self {
        Self {
            address,
            measurement,
            drift_per_read: 0,
            conversion_nacks: 0,
            nacks_remaining: 0,
            bytes: Vec::new(),
            cursor: 0,
            data_reg: 0,
            queue: Deque::new(),
        }
    }

    /// Serve `count` NACKs on each read address before data is ready.
    pub fn with_conversion_nacks(mut self, count: u8) -> Self {
        self.conversion_nacks = count;
        self.nacks_remaining = count;
        self
    }

    /// Wobble the measurement after every completed read.
    pub fn with_drift(mut self, drift_per_read: i16) -> Self {
        self.drift_per_read = drift_per_read;
        self
    }

    pub fn set_measurement(&mut self, raw: u16) {
        self.measurement = raw;
    }

    /// Next queued signal set, if any.  The main loop feeds these to
    /// the controller exactly as the bus ISR would.
    pub fn take_signals(&mut self) -> Option<SignalSet> {
        self.queue.pop_front()
    }

    fn push(&mut self, signals: SignalSet) {
        // The queue is sized for the deepest real burst; dropping
        // beyond it would be a simulator bug.
        self.queue.push_back(signals).ok();
    }

    fn write_address(&self) -> u8 {
        self.address << 1
    }

    fn read_address(&self) -> u8 {
        (self.address << 1) | 1
    }
}

impl BusPort for SimBus {
    fn send_start(&mut self) {
        trace!("sim-bus: START");
    }

    fn transmit(&mut self, byte: u8) {
        if byte == self.write_address() {
            self.push(Signal::Ack.into());
        } else if byte == self.read_address() {
            if self.nacks_remaining > 0 {
                // Conversion still running; the device refuses the
                // read address and the engine retries.
                self.nacks_remaining -= 1;
                self.push(Signal::Nack.into());
            } else {
                // Conversion done: first data byte goes on the wire
                // together with the address ACK, so the ISR sees both
                // conditions in one invocation.
                self.bytes.clear();
                self.bytes
                    .extend_from_slice(&self.measurement.to_be_bytes())
                    .ok();
                self.data_reg = self.bytes[0];
                self.cursor = 1;
                self.push(SignalSet::of(&[Signal::Ack, Signal::DataReady]));
            }
        } else {
            // Any other byte while addressed is a command write.
            trace!("sim-bus: command {byte:#04x}");
            self.push(Signal::Ack.into());
        }
    }

    fn read_data(&mut self) -> u8 {
        self.data_reg
    }

    fn send_ack(&mut self) {
        if self.cursor < self.bytes.len() {
            self.data_reg = self.bytes[self.cursor];
            self.cursor += 1;
            self.push(Signal::DataReady.into());
        }
    }

    fn send_nack(&mut self) {
        // Device releases the data line; nothing further to serve.
    }

    fn send_stop(&mut self) {
        self.push(Signal::Stop.into());
        self.nacks_remaining = self.conversion_nacks;
        self.measurement = self.measurement.wrapping_add_signed(self.drift_per_read);
    }

    fn clear_pending(&mut self) {
        self.queue.clear();
    }

    fn reset(&mut self) {
        trace!("sim-bus: recovery cycle");
        self.queue.clear();
        self.bytes.clear();
        self.cursor = 0;
        self.nacks_remaining = self.conversion_nacks;
    }
}
