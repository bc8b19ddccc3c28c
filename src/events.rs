//! Interrupt-driven event flags.
//!
//! Events are produced by:
//! - Pin-change ISRs (button edges on the even/odd interrupt lines)
//! - The low-energy timer ISR (compare-0, compare-1, underflow)
//! - The bus engine (transaction completion)
//! - Software (handlers re-raising follow-up work)
//!
//! Events are consumed by the main control loop, which drains the mask in
//! a fixed priority order once per wake cycle.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Pin ISR     │────▶│              │     │              │
//! │ Timer ISR   │────▶│  Event Mask  │────▶│  Main Loop   │
//! │ Bus ISR     │────▶│ (level-set,  │     │  (drains in  │
//! │ Software    │────▶│  coalescing) │     │  prio order) │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! The mask is level-set: raising a kind that is already pending is a
//! no-op, so bursts coalesce into one dispatch.  Events carry no payload;
//! a handler pulls whatever data it needs from the producer's own state
//! (e.g. the bus engine's result register).

use core::cell::Cell;

use critical_section::Mutex;

/// System event kinds, one bit each.  Declaration order is the fixed
/// drain priority of the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum EventKind {
    /// Edge on the even pin-interrupt line (button 0's pin).
    PinInterruptEven   = 1 << 0,
    /// Edge on the odd pin-interrupt line (button 1's pin).
    PinInterruptOdd    = 1 << 1,
    /// Button 0 press, raised by the even-line handler.
    Button0Pressed     = 1 << 2,
    /// Button 1 press, raised by the odd-line handler.
    Button1Pressed     = 1 << 3,
    /// Re-evaluate the input state machine.
    CheckInput         = 1 << 4,
    /// Low-energy timer compare-0 match (top of cycle).
    TimerComp0         = 1 << 5,
    /// Low-energy timer compare-1 match (end of active slice).
    TimerComp1         = 1 << 6,
    /// Low-energy timer underflow (cycle expired).
    TimerUnderflow     = 1 << 7,
    /// Bus read transaction completed; result register is valid.
    SensorReadComplete = 1 << 8,
}

impl EventKind {
    /// All kinds in drain priority order (highest first).
    pub const PRIORITY: [EventKind; 9] = [
        EventKind::PinInterruptEven,
        EventKind::PinInterruptOdd,
        EventKind::Button0Pressed,
        EventKind::Button1Pressed,
        EventKind::CheckInput,
        EventKind::TimerComp0,
        EventKind::TimerComp1,
        EventKind::TimerUnderflow,
        EventKind::SensorReadComplete,
    ];

    /// The bitmask for this kind.
    pub const fn mask(self) -> u16 {
        self as u16
    }
}

/// Snapshot of the pending mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventMask(u16);

impl EventMask {
    pub const EMPTY: EventMask = EventMask(0);

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, kind: EventKind) -> bool {
        self.0 & kind.mask() != 0
    }

    pub const fn bits(self) -> u16 {
        self.0
    }
}

// ── Shared pending mask ───────────────────────────────────────
//
// Written from interrupt context, read and cleared from the main loop.
// Every read-modify-write runs under a critical section so an ISR can
// never interleave with a half-updated mask.

/// The process-wide pending-event mask.
///
/// Owned by the entry point; ISRs and handlers receive a shared
/// reference rather than reaching for a global.
pub struct EventFlags {
    mask: Mutex<Cell<u16>>,
}

impl EventFlags {
    /// A new, empty mask.
    pub const fn new() -> Self {
        Self {
            mask: Mutex::new(Cell::new(0)),
        }
    }

    /// Idempotently mark `kind` pending.  Callable from interrupt or
    /// main context.
    pub fn raise(&self, kind: EventKind) {
        critical_section::with(|cs| {
            let mask = self.mask.borrow(cs);
            mask.set(mask.get() | kind.mask());
        });
    }

    /// Snapshot of the currently pending kinds.
    pub fn pending(&self) -> EventMask {
        critical_section::with(|cs| EventMask(self.mask.borrow(cs).get()))
    }

    /// Clear `kind` from the mask.
    ///
    /// The dispatcher must call this *before* running the handler: a
    /// re-raise during handling then lands in the mask and is seen on
    /// the next drain pass instead of being lost.
    pub fn consume(&self, kind: EventKind) {
        critical_section::with(|cs| {
            let mask = self.mask.borrow(cs);
            mask.set(mask.get() & !kind.mask());
        });
    }
}

impl Default for EventFlags {
    fn default() -> Self {
        Self::new()
    }
}
