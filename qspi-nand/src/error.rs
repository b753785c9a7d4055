use core::fmt::Debug;
use embedded_nand::{NandFlashError, NandFlashErrorKind};

use crate::{register::Register, JedecID};

/// Error type for the QSPI NAND driver.
///
/// Generic over the transport error type (TE), so any QSPI peripheral
/// driver can sit underneath.
#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QspiNandError<TE> {
    /// Error from the QSPI peripheral or its DMA
    #[error("Transport error: {0:?}")]
    Transport(TE),
    /// A pending data transfer never reported ready
    #[error("Data transfer did not complete")]
    TransferTimeout,
    /// Status poll budget exhausted before the device reached the expected state
    #[error("Status poll timed out")]
    PollTimeout,
    /// Block Erase failed.
    /// The device set E_FAIL, the block is protected or has failed.
    #[error("Erase failed")]
    EraseFailed,
    /// Program failed.
    /// The device set P_FAIL, the block is protected or has failed.
    #[error("Program failed")]
    ProgramFailed,
    /// Read completed, but the ECC status is at or above the uncorrectable threshold
    #[error("ECC uncorrectable")]
    EccUncorrectable,
    /// Manufacturer or device ID does not match the configured part
    #[error("ID mismatch: expected {expected:?}, found {found:?}")]
    IdMismatch { expected: JedecID, found: JedecID },
    /// A register write did not read back as written
    #[error("Register {register:?} verify failed, read back {read_back:#04x}")]
    FeatureVerify { register: Register, read_back: u8 },
    /// The factory unique ID failed its complement check
    #[error("Unique ID integrity check failed")]
    UidIntegrity,
    /// Requested bytes out of bounds
    #[error("Requested bytes out of bounds")]
    OutOfBounds,
    /// Requested bytes not aligned
    #[error("Requested bytes not aligned")]
    NotAligned,
    /// Source and destination of a move or copy overlap
    #[error("Source and destination overlap")]
    Overlap,
    /// Device info requested before initialization finished
    #[error("Device not initialized")]
    NotInitialized,
    /// Other error
    #[error("Other error. Should not happen")]
    Other,
}

// Convert to the more generic NandFlashError
impl<TE: Debug> NandFlashError for QspiNandError<TE> {
    fn kind(&self) -> NandFlashErrorKind {
        match self {
            QspiNandError::NotAligned => NandFlashErrorKind::NotAligned,
            QspiNandError::OutOfBounds => NandFlashErrorKind::OutOfBounds,
            QspiNandError::EraseFailed => NandFlashErrorKind::BlockFail(None),
            QspiNandError::ProgramFailed => NandFlashErrorKind::BlockFail(None),
            QspiNandError::EccUncorrectable => NandFlashErrorKind::BlockFail(None),
            QspiNandError::Transport(_)
            | QspiNandError::TransferTimeout
            | QspiNandError::PollTimeout
            | QspiNandError::IdMismatch { .. }
            | QspiNandError::FeatureVerify { .. }
            | QspiNandError::UidIntegrity
            | QspiNandError::Overlap
            | QspiNandError::NotInitialized
            | QspiNandError::Other => NandFlashErrorKind::Other,
        }
    }
}

// Only for the bounds / alignment helpers, so `?` converts their errors
impl<TE> From<NandFlashErrorKind> for QspiNandError<TE> {
    fn from(kind: NandFlashErrorKind) -> Self {
        match kind {
            NandFlashErrorKind::NotAligned => QspiNandError::NotAligned,
            NandFlashErrorKind::OutOfBounds => QspiNandError::OutOfBounds,
            _ => QspiNandError::Other,
        }
    }
}
