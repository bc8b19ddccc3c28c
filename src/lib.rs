//! Thermasense control core.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection.  Hardware register access is confined to the port traits
//! ([`bus::port::BusPort`], [`power::SleepPort`], [`app::IndicatorPort`]);
//! the MCU adapters binding them to real peripherals live in the board
//! support crate.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod power;
pub mod sensors;
