//! Host-simulation sleep port.
//!
//! On hardware, the wait instruction suspends the core until the next
//! interrupt; the dominant wake source is the low-energy timer at the
//! end of each measurement cycle.  The host stand-in sleeps the thread
//! for one cycle period, after which the caller raises the timer events
//! exactly as the timer ISR would.

use std::thread;
use std::time::Duration;

use log::trace;

use crate::power::{SleepDepth, SleepPort};

pub struct HostSleep {
    cycle: Duration,
    slept: bool,
}

impl HostSleep {
    pub fn new(cycle: Duration) -> Self {
        Self {
            cycle,
            slept: false,
        }
    }

    /// Whether the last arbiter pass actually issued a wait.  When it
    /// did not (a shallow mode was blocked), the caller models the
    /// busy-spin until the next timer interrupt itself.
    pub fn take_slept(&mut self) -> bool {
        core::mem::take(&mut self.slept)
    }
}

impl SleepPort for HostSleep {
    fn wait(&mut self, depth: SleepDepth) {
        trace!("sleep: {depth:?} wait for {:?}", self.cycle);
        self.slept = true;
        thread::sleep(self.cycle);
    }
}
