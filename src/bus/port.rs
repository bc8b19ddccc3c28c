//! Port trait for the two-wire bus controller hardware.
//!
//! The engine in [`super`] is pure protocol logic; everything that
//! touches controller registers goes through this trait.  The MCU
//! adapter maps each method onto the CMD/TXDATA/RXDATA registers; the
//! host build uses [`crate::adapters::sim_bus::SimBus`], which emulates
//! an addressed sensor on the other end of the wire.

/// Master-mode bus controller operations.
///
/// Methods are infallible by design: the controller accepts commands
/// unconditionally and reports outcomes asynchronously through the four
/// signal lines ([`super::Signal`]).  A command that the device rejects
/// shows up as a NACK signal, not as a return value here.
pub trait BusPort {
    /// Issue a START (or repeated START mid-transaction).
    fn send_start(&mut self);

    /// Load one byte into the transmit register.  The controller clocks
    /// it out and the device answers with ACK or NACK.
    fn transmit(&mut self, byte: u8);

    /// Consume the received byte that raised the data-ready signal.
    /// Reading also retires the controller's data-ready condition.
    fn read_data(&mut self) -> u8;

    /// Acknowledge the last received byte (request another).
    fn send_ack(&mut self);

    /// Refuse further bytes (end of read).
    fn send_nack(&mut self);

    /// Issue a STOP condition.
    fn send_stop(&mut self);

    /// Drop any stale signal conditions left over from a previous
    /// transaction.  Called once before each START.
    fn clear_pending(&mut self);

    /// Full bus recovery: abort whatever is in flight, flush the
    /// transmit path and run a START/STOP flush cycle so a device left
    /// mid-byte releases the data line.  Called once at open.
    fn reset(&mut self);
}
