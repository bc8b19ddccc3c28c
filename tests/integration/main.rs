//! Integration tests for the control core.
//!
//! Everything runs on the host: the bus engine is driven through a
//! recording mock port (scripted signal sequences) or the full
//! [`SimBus`](thermasense::adapters::sim_bus::SimBus) device emulation.

mod mock_port;
mod protocol_tests;
