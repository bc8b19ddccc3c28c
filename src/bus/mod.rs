//! Asynchronous master-mode two-wire bus engine.
//!
//! One read transaction is a four-phase exchange driven entirely by
//! hardware signals; the main loop only starts it and later collects the
//! result when the completion event fires.
//!
//! ```text
//!             ACK                ACK                 ACK
//!  ┌──────┐  addr+W   ┌─────────┐  cmd    ┌──────────┐  rep-START ┌─────────────┐
//!  │ Init ├──────────▶│ SendCmd ├────────▶│ SendAddr ├──addr+R───▶│ ReceiveData │
//!  └──┬───┘           └────┬────┘         └────┬─────┘            └──────┬──────┘
//!     │ NACK: retry        │ NACK: retry       │ NACK: retry            │ DataReady × n
//!     │ START + addr+W     │ cmd               │ rep-START + addr+R     │ (ACK each, NACK+STOP
//!     ▼                    ▼                   ▼                        │  on the last)
//!    (same state)         (same state)        (same state)              ▼
//!                                                             STOP → completion event
//! ```
//!
//! Any signal outside this table is a protocol violation: the engine
//! reports it as a typed error and the runner halts, because a bus whose
//! state disagrees with the device's cannot be resynchronised safely.
//!
//! The engine blocks the energy mode that keeps the bus clock alive for
//! the whole life of a transaction and raises the session's completion
//! event from the STOP handler.

pub mod port;

use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use log::{debug, trace};

use crate::error::Result;
use crate::events::{EventFlags, EventKind};
use crate::power::{EnergyMode, SleepManager};
use port::BusPort;

/// Energy mode that must stay blocked while the bus clock is needed.
pub const BUS_ACTIVE_BLOCK: EnergyMode = EnergyMode::Em2;

// ── Signals ───────────────────────────────────────────────────

/// The four hardware signal conditions that drive the engine.
/// More than one can be asserted in a single interrupt invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Signal {
    /// Device acknowledged the last transmitted byte.
    Ack       = 0b0001,
    /// Device refused the last transmitted byte.
    Nack      = 0b0010,
    /// One received byte is waiting in the data register.
    DataReady = 0b0100,
    /// The STOP condition completed on the wire.
    Stop      = 0b1000,
}

impl Signal {
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::DataReady => "DATA-READY",
            Self::Stop => "STOP",
        };
        f.write_str(name)
    }
}

/// Set of currently asserted signals, as read from the interrupt flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalSet(u8);

impl SignalSet {
    pub const EMPTY: SignalSet = SignalSet(0);

    pub const fn of(signals: &[Signal]) -> SignalSet {
        let mut bits = 0;
        let mut i = 0;
        while i < signals.len() {
            bits |= signals[i].mask();
            i += 1;
        }
        SignalSet(bits)
    }

    pub const fn contains(self, signal: Signal) -> bool {
        self.0 & signal.mask() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, signal: Signal) {
        self.0 |= signal.mask();
    }
}

impl From<Signal> for SignalSet {
    fn from(signal: Signal) -> Self {
        SignalSet(signal.mask())
    }
}

// ── Protocol state ────────────────────────────────────────────

/// Engine states.  The transaction closes implicitly from
/// `ReceiveData` when the STOP signal lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    /// START issued, waiting for the write-address ACK.
    Init,
    /// Device command byte in flight.
    SendCmd,
    /// Repeated START and read-address in flight.
    SendAddr,
    /// Clocking data bytes in.
    ReceiveData,
}

/// Transfer direction bit, ORed into the shifted device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Write = 0,
    Read = 1,
}

/// Bus engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// A signal arrived that the current state has no transition for.
    ProtocolViolation { signal: Signal, state: BusState },
    /// The previous transaction's busy flag never cleared within the
    /// configured spin budget.
    AcquireTimeout,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtocolViolation { signal, state } => {
                write!(f, "unexpected {signal} in state {state:?}")
            }
            Self::AcquireTimeout => write!(f, "bus busy: acquire spin budget exhausted"),
        }
    }
}

/// Parameters for one read transaction.
#[derive(Debug, Clone, Copy)]
pub struct ReadRequest {
    /// 7-bit device address.
    pub device_address: u8,
    /// Command byte written before the repeated START.
    pub command: u8,
    /// Number of data bytes to clock in.
    pub len: u8,
    /// Event raised when the STOP signal retires the transaction.
    pub completion: EventKind,
}

/// The single in-flight transaction record.
struct Session {
    state: BusState,
    direction: Direction,
    device_address: u8,
    command: u8,
    expected: u8,
    received: u8,
    acc: u32,
    completion: EventKind,
}

impl Session {
    const fn idle() -> Self {
        Self {
            state: BusState::Init,
            direction: Direction::Write,
            device_address: 0,
            command: 0,
            expected: 0,
            received: 0,
            acc: 0,
            completion: EventKind::SensorReadComplete,
        }
    }
}

// ── Controller ────────────────────────────────────────────────

struct Inner<P: BusPort> {
    port: P,
    session: Session,
}

impl<P: BusPort> Inner<P> {
    fn addressed(&self, direction: Direction) -> u8 {
        (self.session.device_address << 1) | direction as u8
    }

    fn on_ack(&mut self) -> core::result::Result<(), BusError> {
        match self.session.state {
            BusState::Init => {
                self.session.state = BusState::SendCmd;
                let cmd = self.session.command;
                self.port.transmit(cmd);
            }
            BusState::SendCmd => {
                self.session.state = BusState::SendAddr;
                self.session.direction = Direction::Read;
                self.port.send_start();
                let byte = self.addressed(Direction::Read);
                self.port.transmit(byte);
            }
            BusState::SendAddr => {
                // Nothing to transmit; the device drives the next byte
                // and raises data-ready.
                self.session.state = BusState::ReceiveData;
            }
            BusState::ReceiveData => {
                return Err(BusError::ProtocolViolation {
                    signal: Signal::Ack,
                    state: self.session.state,
                });
            }
        }
        Ok(())
    }

    fn on_nack(&mut self) -> core::result::Result<(), BusError> {
        // A NACK retries the step the engine is already in; the device
        // answers NACK while a measurement is still converting, so the
        // retry loop is unbounded by design.
        match self.session.state {
            BusState::Init => {
                self.port.send_start();
                let byte = self.addressed(self.session.direction);
                self.port.transmit(byte);
            }
            BusState::SendCmd => {
                let cmd = self.session.command;
                self.port.transmit(cmd);
            }
            BusState::SendAddr => {
                self.port.send_start();
                let byte = self.addressed(Direction::Read);
                self.port.transmit(byte);
            }
            BusState::ReceiveData => {
                return Err(BusError::ProtocolViolation {
                    signal: Signal::Nack,
                    state: self.session.state,
                });
            }
        }
        Ok(())
    }

    fn on_data_ready(&mut self) -> core::result::Result<(), BusError> {
        if self.session.state != BusState::ReceiveData {
            return Err(BusError::ProtocolViolation {
                signal: Signal::DataReady,
                state: self.session.state,
            });
        }

        let byte = self.port.read_data();
        self.session.received += 1;
        // Most-significant byte first.
        self.session.acc = (self.session.acc << 8) | u32::from(byte);
        trace!(
            "bus: byte {}/{} = {byte:#04x}",
            self.session.received, self.session.expected
        );

        if self.session.received == self.session.expected {
            self.port.send_nack();
            self.port.send_stop();
        } else {
            self.port.send_ack();
        }
        Ok(())
    }

    fn on_stop(&mut self) -> core::result::Result<EventKind, BusError> {
        if self.session.state != BusState::ReceiveData {
            return Err(BusError::ProtocolViolation {
                signal: Signal::Stop,
                state: self.session.state,
            });
        }
        Ok(self.session.completion)
    }
}

/// Master-mode bus controller: the session record, the busy latch and
/// the signal dispatch, generic over the hardware [`BusPort`].
///
/// Constructed once by the entry point; the bus ISR and the drivers get
/// a shared reference.  All session mutation happens under a critical
/// section, the busy latch is a plain atomic so the acquire spin in
/// [`start_read`](Self::start_read) runs outside any critical section.
pub struct I2cController<'a, P: BusPort> {
    inner: Mutex<RefCell<Inner<P>>>,
    busy: AtomicBool,
    acquire_spin_limit: u32,
    events: &'a EventFlags,
    sleep: &'a SleepManager,
}

impl<'a, P: BusPort> I2cController<'a, P> {
    /// Open the bus: run the recovery sequence on `port` and wire the
    /// controller into the event and power subsystems.
    pub fn new(
        mut port: P,
        events: &'a EventFlags,
        sleep: &'a SleepManager,
        acquire_spin_limit: u32,
    ) -> Self {
        port.reset();
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                port,
                session: Session::idle(),
            })),
            busy: AtomicBool::new(false),
            acquire_spin_limit,
            events,
            sleep,
        }
    }

    /// Start a read transaction.
    ///
    /// Spins (outside any critical section) until the previous session's
    /// busy flag clears, up to the configured budget; a stalled bus
    /// surfaces as [`BusError::AcquireTimeout`] instead of a silent
    /// infinite spin.  On success the session record is rebuilt, the
    /// bus-clock energy mode is blocked and the START + write-address
    /// goes out; everything after that happens in interrupt context.
    pub fn start_read(&self, request: ReadRequest) -> Result<()> {
        let mut spins: u32 = 0;
        while self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            if spins >= self.acquire_spin_limit {
                return Err(BusError::AcquireTimeout.into());
            }
            spins += 1;
            core::hint::spin_loop();
        }

        self.sleep.block(BUS_ACTIVE_BLOCK)?;

        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            inner.session = Session {
                state: BusState::Init,
                direction: Direction::Write,
                device_address: request.device_address,
                command: request.command,
                expected: request.len,
                received: 0,
                acc: 0,
                completion: request.completion,
            };
            inner.port.clear_pending();
            inner.port.send_start();
            let byte = inner.addressed(Direction::Write);
            inner.port.transmit(byte);
        });

        debug!(
            "bus: read started, addr {:#04x} cmd {:#04x} len {}",
            request.device_address, request.command, request.len
        );
        Ok(())
    }

    /// Service every asserted signal, in the hardware flag-test order
    /// ACK, NACK, DATA-READY, STOP.  Called from the bus ISR (or the
    /// simulator pump on the host).
    pub fn service(&self, signals: SignalSet) -> Result<()> {
        let completed = critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let mut completed = None;
            if signals.contains(Signal::Ack) {
                inner.on_ack()?;
            }
            if signals.contains(Signal::Nack) {
                inner.on_nack()?;
            }
            if signals.contains(Signal::DataReady) {
                inner.on_data_ready()?;
            }
            if signals.contains(Signal::Stop) {
                completed = Some(inner.on_stop()?);
            }
            Ok::<_, BusError>(completed)
        })?;

        if let Some(kind) = completed {
            // Retire the session: release the bus, let the clock domain
            // power down, then tell the consumer the result is ready.
            self.busy.store(false, Ordering::Release);
            self.sleep.unblock(BUS_ACTIVE_BLOCK)?;
            self.events.raise(kind);
            debug!("bus: transaction complete, raw {:#06x}", self.last_reading());
        }
        Ok(())
    }

    /// The accumulated result of the most recently completed read,
    /// most-significant byte first.
    pub fn last_reading(&self) -> u32 {
        critical_section::with(|cs| self.inner.borrow_ref(cs).session.acc)
    }

    /// Whether a transaction is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Current engine state (diagnostics and tests).
    pub fn state(&self) -> BusState {
        critical_section::with(|cs| self.inner.borrow_ref(cs).session.state)
    }

    /// Run `f` against the port under the session critical section.
    /// The host simulator uses this to hand queued signals back to the
    /// service loop; tests use it to inspect recorded port traffic.
    pub fn with_port<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs).port))
    }
}
