//! The GPIO capability the renderer drives.
//!
//! The crate does not talk to hardware itself. A platform driver implements
//! [`GpioLines`], typically on top of a memory-mapped GPIO register block
//! where one store to a set or clear register changes any number of lines.

/// Batched GPIO output access.
///
/// `set_high` and `set_low` are called several times per shifted column, at
/// multi-MHz rates, from the render thread. Implementations must map each
/// call to a single register write: no syscalls, no per-bit loops, no
/// allocation.
///
/// The driver is moved into the render thread while rendering and handed back
/// when the thread exits, so it only needs to be [`Send`].
pub trait GpioLines: Send + 'static {
    /// Error returned when a line cannot be claimed.
    type Error: core::fmt::Debug;

    /// Configure `line` as an output.
    ///
    /// # Errors
    ///
    /// When the line does not exist or is already claimed.
    fn open_output(&mut self, line: u8) -> Result<(), Self::Error>;

    /// Drive every line whose bit is set in `mask` high.
    fn set_high(&mut self, mask: u64);

    /// Drive every line whose bit is set in `mask` low.
    fn set_low(&mut self, mask: u64);
}
