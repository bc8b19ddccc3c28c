//! Host-side adapters.
//!
//! The control core only talks to port traits ([`crate::bus::port::BusPort`],
//! [`crate::power::SleepPort`], [`crate::app::IndicatorPort`]).  These
//! adapters implement them for the host-simulation binary and the test
//! suite; the MCU register adapters live in the board support crate.

pub mod host_sleep;
pub mod indicators;
pub mod sim_bus;
