//! Unified error types for the thermasense firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! top-level loop's error handling uniform.  All variants are `Copy` so
//! they pass through interrupt-context code without allocation.
//!
//! Protocol and balance violations are unrecoverable where they are
//! detected — a desynchronised bus or an unbalanced blocker count means
//! the system can no longer reason about its own state.  The subsystems
//! report them as typed values and the entry point decides the global
//! response (halt, on this device).

use core::fmt;

use crate::bus::BusError;
use crate::power::PowerError;

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Bus engine failure: protocol violation or acquire timeout.
    Bus(BusError),
    /// Energy-mode blocker accounting violation.
    Power(PowerError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Power(e) => write!(f, "power: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<PowerError> for Error {
    fn from(e: PowerError) -> Self {
        Self::Power(e)
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
