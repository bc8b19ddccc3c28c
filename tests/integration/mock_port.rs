//! Recording mock for the bus controller port.
//!
//! Records every register-level command the engine issues so tests can
//! assert on the exact wire traffic, and serves scripted receive bytes.

use std::collections::VecDeque;

use thermasense::bus::port::BusPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortCall {
    Start,
    Transmit(u8),
    ReadData,
    Ack,
    Nack,
    Stop,
    ClearPending,
    Reset,
}

pub struct MockPort {
    pub calls: Vec<PortCall>,
    rx: VecDeque<u8>,
}

#[allow(dead_code)]
impl MockPort {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            rx: VecDeque::new(),
        }
    }

    /// Bytes served by successive `read_data` calls.
    pub fn with_rx(mut self, bytes: &[u8]) -> Self {
        self.rx = bytes.iter().copied().collect();
        self
    }
}

impl BusPort for MockPort {
    fn send_start(&mut self) {
        self.calls.push(PortCall::Start);
    }

    fn transmit(&mut self, byte: u8) {
        self.calls.push(PortCall::Transmit(byte));
    }

    fn read_data(&mut self) -> u8 {
        self.calls.push(PortCall::ReadData);
        self.rx.pop_front().unwrap_or(0)
    }

    fn send_ack(&mut self) {
        self.calls.push(PortCall::Ack);
    }

    fn send_nack(&mut self) {
        self.calls.push(PortCall::Nack);
    }

    fn send_stop(&mut self) {
        self.calls.push(PortCall::Stop);
    }

    fn clear_pending(&mut self) {
        self.calls.push(PortCall::ClearPending);
    }

    fn reset(&mut self) {
        self.calls.push(PortCall::Reset);
    }
}
