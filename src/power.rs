//! Reference-counted energy-mode arbitration.
//!
//! Every peripheral that needs a clock domain alive registers a *blocker*
//! against the shallowest energy mode that would lose that domain.  The
//! arbiter keeps one counter per mode and answers the only question the
//! main loop asks: "how deep may we sleep right now?"
//!
//! ```text
//!  mode      0      1      2      3      4
//!          ┌──────┬──────┬──────┬──────┬──────┐
//! blockers │  0   │  0   │  2   │  0   │  1   │
//!          └──────┴──────┴──────┴──────┴──────┘
//!                            ▲
//!                first nonzero counter → sleep one mode shallower (Em1)
//! ```
//!
//! Counting (instead of boolean flags) lets independent drivers share the
//! decision without knowing about each other: each blocks on entry to an
//! activity and unblocks on exit.  The whole correctness contract is that
//! those calls stay balanced; an unbalanced pair is a driver bug and
//! surfaces as a typed error the runner treats as fatal.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use log::trace;

/// Energy modes, shallow to deep.  `Em0` is fully active; each deeper
/// mode stops more clocks and peripherals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(usize)]
pub enum EnergyMode {
    Em0 = 0,
    Em1 = 1,
    Em2 = 2,
    Em3 = 3,
    Em4 = 4,
}

impl EnergyMode {
    pub const COUNT: usize = 5;

    /// All modes, shallow to deep.
    pub const ALL: [EnergyMode; EnergyMode::COUNT] = [
        EnergyMode::Em0,
        EnergyMode::Em1,
        EnergyMode::Em2,
        EnergyMode::Em3,
        EnergyMode::Em4,
    ];

    /// One mode shallower, or `None` at `Em0`.
    pub const fn shallower(self) -> Option<EnergyMode> {
        match self {
            EnergyMode::Em0 => None,
            EnergyMode::Em1 => Some(EnergyMode::Em0),
            EnergyMode::Em2 => Some(EnergyMode::Em1),
            EnergyMode::Em3 => Some(EnergyMode::Em2),
            EnergyMode::Em4 => Some(EnergyMode::Em3),
        }
    }

    /// One mode deeper, or `None` at `Em4`.
    pub const fn deeper(self) -> Option<EnergyMode> {
        match self {
            EnergyMode::Em0 => Some(EnergyMode::Em1),
            EnergyMode::Em1 => Some(EnergyMode::Em2),
            EnergyMode::Em2 => Some(EnergyMode::Em3),
            EnergyMode::Em3 => Some(EnergyMode::Em4),
            EnergyMode::Em4 => None,
        }
    }
}

impl fmt::Display for EnergyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EM{}", *self as usize)
    }
}

/// The three low-power wait instructions beyond staying active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepDepth {
    /// CPU halted, all high-frequency clocks running.
    Shallow,
    /// High-frequency clocks gated, low-energy peripherals live.
    Mid,
    /// Only the ultra-low-frequency domain left running.
    Deep,
}

/// Issues the low-power wait instruction for a given depth.
///
/// The hardware implementation must unmask interrupts and suspend in a
/// single non-interruptible step (WFI with PRIMASK handover), so an event
/// raised between the pending-check and the wait either prevents the
/// sleep or wakes the core immediately.  [`SleepManager::enter_sleep`]
/// calls this while still inside its critical section to make that
/// possible.
pub trait SleepPort {
    fn wait(&mut self, depth: SleepDepth);
}

/// Balance violations in the blocker accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerError {
    /// `block` would overflow the counter: far more outstanding blocks
    /// than any sane driver set can produce.
    BlockOverflow(EnergyMode),
    /// `unblock` on a mode with no outstanding blockers.
    UnblockUnderflow(EnergyMode),
}

impl fmt::Display for PowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockOverflow(m) => write!(f, "blocker overflow on {m}"),
            Self::UnblockUnderflow(m) => write!(f, "unblock without matching block on {m}"),
        }
    }
}

// ── Arbiter ───────────────────────────────────────────────────

/// Per-mode blocker counters.  All mutation happens under a critical
/// section; `block`/`unblock` are callable from interrupt or main
/// context.
pub struct SleepManager {
    counters: Mutex<RefCell<[u8; EnergyMode::COUNT]>>,
}

impl SleepManager {
    /// A new arbiter with no blockers: the deepest mode is permitted.
    pub const fn new() -> Self {
        Self {
            counters: Mutex::new(RefCell::new([0; EnergyMode::COUNT])),
        }
    }

    /// Register one more reason `mode` must not be entered.
    pub fn block(&self, mode: EnergyMode) -> Result<(), PowerError> {
        critical_section::with(|cs| {
            let mut counters = self.counters.borrow_ref_mut(cs);
            let slot = &mut counters[mode as usize];
            *slot = slot
                .checked_add(1)
                .ok_or(PowerError::BlockOverflow(mode))?;
            trace!("power: block {mode} (now {})", *slot);
            Ok(())
        })
    }

    /// Release one blocker on `mode`.
    pub fn unblock(&self, mode: EnergyMode) -> Result<(), PowerError> {
        critical_section::with(|cs| {
            let mut counters = self.counters.borrow_ref_mut(cs);
            let slot = &mut counters[mode as usize];
            *slot = slot
                .checked_sub(1)
                .ok_or(PowerError::UnblockUnderflow(mode))?;
            trace!("power: unblock {mode} (now {})", *slot);
            Ok(())
        })
    }

    /// The shallowest mode with a nonzero blocker count, or `None` when
    /// every mode is permitted.
    pub fn current_blocked_mode(&self) -> Option<EnergyMode> {
        critical_section::with(|cs| {
            let counters = self.counters.borrow_ref(cs);
            EnergyMode::ALL
                .into_iter()
                .find(|&mode| counters[mode as usize] != 0)
        })
    }

    /// Issue the deepest permitted low-power wait, or return immediately
    /// if the two shallowest modes are blocked (stay busy).
    ///
    /// The scan and the wait both happen inside one critical section:
    /// combined with the [`SleepPort`] atomic unmask-and-suspend
    /// contract, an event raised after the caller's pending-check can
    /// never be silently slept through.
    pub fn enter_sleep(&self, port: &mut impl SleepPort) {
        critical_section::with(|cs| {
            let counters = self.counters.borrow_ref(cs);
            if counters[EnergyMode::Em0 as usize] > 0 || counters[EnergyMode::Em1 as usize] > 0 {
                // Something needs the core active; spin back to the loop.
            } else if counters[EnergyMode::Em2 as usize] > 0 {
                port.wait(SleepDepth::Shallow);
            } else if counters[EnergyMode::Em3 as usize] > 0 {
                port.wait(SleepDepth::Mid);
            } else {
                port.wait(SleepDepth::Deep);
            }
        });
    }
}

impl Default for SleepManager {
    fn default() -> Self {
        Self::new()
    }
}
