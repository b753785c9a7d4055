//! Boundary to the QSPI peripheral.
//!
//! The driver never touches peripheral registers. It sends one
//! [QspiCommand] per transaction and, when the command has a data phase,
//! follows it with exactly one [QspiTransport::receive] or
//! [QspiTransport::transmit] of `data().len` bytes.
use crate::command::QspiCommand;

/// State of a data phase after it was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferState {
    /// All bytes are already transferred
    Complete,
    /// Transfer handed off to DMA or interrupts, poll [QspiTransport::is_ready]
    Pending,
}

/// A QSPI peripheral able to run NAND flash transactions.
///
/// Implementations may finish data phases synchronously or hand them to
/// DMA. For a [TransferState::Pending] transfer the buffer stays borrowed
/// by the driver until [QspiTransport::is_ready] returns true, and no other
/// method is called in between.
pub trait QspiTransport {
    type Error: core::fmt::Debug;

    /// Send the instruction, address and dummy phases of `cmd`.
    ///
    /// Commands without a data phase are complete when this returns.
    fn command(&mut self, cmd: &QspiCommand) -> Result<(), Self::Error>;

    /// Run the read data phase of the last command into `buf`
    fn receive(&mut self, buf: &mut [u8]) -> Result<TransferState, Self::Error>;

    /// Run the write data phase of the last command from `buf`
    fn transmit(&mut self, buf: &[u8]) -> Result<TransferState, Self::Error>;

    /// True once the last data phase has finished
    fn is_ready(&mut self) -> Result<bool, Self::Error>;
}

impl<T: QspiTransport + ?Sized> QspiTransport for &mut T {
    type Error = T::Error;

    fn command(&mut self, cmd: &QspiCommand) -> Result<(), Self::Error> {
        T::command(self, cmd)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<TransferState, Self::Error> {
        T::receive(self, buf)
    }

    fn transmit(&mut self, buf: &[u8]) -> Result<TransferState, Self::Error> {
        T::transmit(self, buf)
    }

    fn is_ready(&mut self) -> Result<bool, Self::Error> {
        T::is_ready(self)
    }
}
