//! Feature and status registers reached with get/set feature.
use bitflags::bitflags;

use crate::ECCStatus;

/// Register address sent as the 8 bit address of get/set feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Register {
    /// Block protection bits
    Protection,
    /// OTP, ECC, block protection lock and quad enable
    Features1,
    /// Busy, write enable latch, fail and ECC bits
    Status1,
    /// Drive strength and second feature byte
    Features2,
    /// Extended ECC status, read after a protection write
    Status2,
}

impl Register {
    pub const fn address(&self) -> u8 {
        match self {
            Register::Protection => 0xA0,
            Register::Features1 => 0xB0,
            Register::Status1 => 0xC0,
            Register::Features2 => 0xD0,
            Register::Status2 => 0xF0,
        }
    }
}

bitflags! {
    /// Status register 1 (0xC0)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u8 {
        /// Operation in progress
        const OIP = 0x01;
        /// Write enable latch
        const WEL = 0x02;
        /// Erase failed
        const E_FAIL = 0x04;
        /// Program failed
        const P_FAIL = 0x08;
        /// ECC status, low bit
        const ECCS0 = 0x10;
        /// ECC status, high bit
        const ECCS1 = 0x20;

        // Reserved bits still read back from the device
        const _ = !0;
    }
}

impl Status {
    pub fn is_busy(&self) -> bool {
        self.contains(Status::OIP)
    }

    /// Decode the ECC status bits left by the last read
    pub fn ecc(&self) -> ECCStatus {
        match self.bits() & (Status::ECCS0.bits() | Status::ECCS1.bits()) {
            0x00 => ECCStatus::Ok,
            0x10 => ECCStatus::Corrected,
            0x20 => ECCStatus::Failed,
            _ => ECCStatus::Failing,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Status({:02X})", self.bits());
    }
}

bitflags! {
    /// Feature register 1 (0xB0)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Features1: u8 {
        /// Quad enable
        const QE = 0x01;
        /// Block protect lock
        const BPL = 0x08;
        /// Internal ECC enable
        const ECC_EN = 0x10;
        /// OTP region access enable
        const OTP_EN = 0x40;
        /// OTP region protect
        const OTP_PRT = 0x80;

        const _ = !0;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Features1 {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Features1({:02X})", self.bits());
    }
}

/// Condition a status poll waits for.
///
/// Each variant selects one of the three poll semantics of
/// [crate::cmd_blocking::QspiNandBlocking::check_status].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCheck {
    /// Succeeds once OIP clears
    Idle,
    /// Succeeds once WEL is set
    WriteEnableLatch,
    /// Succeeds once OIP clears with the bits clear, fails as soon as any
    /// of the bits is set
    NoError(Status),
}

#[cfg(feature = "defmt")]
impl defmt::Format for StatusCheck {
    fn format(&self, f: defmt::Formatter) {
        match self {
            StatusCheck::Idle => defmt::write!(f, "Idle"),
            StatusCheck::WriteEnableLatch => defmt::write!(f, "WriteEnableLatch"),
            StatusCheck::NoError(mask) => defmt::write!(f, "NoError({})", mask),
        }
    }
}

/// Result of looking at one status value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollStep {
    Done,
    Pending,
    Failed,
}

impl StatusCheck {
    pub(crate) fn step(&self, status: Status) -> PollStep {
        match self {
            StatusCheck::Idle => {
                if status.is_busy() {
                    PollStep::Pending
                } else {
                    PollStep::Done
                }
            }
            StatusCheck::WriteEnableLatch => {
                if status.contains(Status::WEL) {
                    PollStep::Done
                } else {
                    PollStep::Pending
                }
            }
            StatusCheck::NoError(mask) => {
                if !status.is_busy() && !status.intersects(*mask) {
                    PollStep::Done
                } else if status.intersects(*mask) {
                    PollStep::Failed
                } else {
                    PollStep::Pending
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn idle_waits_for_oip_clear() {
        assert_eq!(StatusCheck::Idle.step(Status::OIP), PollStep::Pending);
        assert_eq!(
            StatusCheck::Idle.step(Status::OIP | Status::WEL),
            PollStep::Pending
        );
        assert_eq!(StatusCheck::Idle.step(Status::WEL), PollStep::Done);
        assert_eq!(StatusCheck::Idle.step(Status::empty()), PollStep::Done);
    }

    #[test]
    fn write_enable_latch_waits_for_wel_set() {
        assert_eq!(
            StatusCheck::WriteEnableLatch.step(Status::empty()),
            PollStep::Pending
        );
        assert_eq!(
            StatusCheck::WriteEnableLatch.step(Status::WEL | Status::OIP),
            PollStep::Done
        );
    }

    #[test]
    fn error_mask_fails_fast() {
        let check = StatusCheck::NoError(Status::E_FAIL);
        assert_eq!(check.step(Status::OIP), PollStep::Pending);
        assert_eq!(check.step(Status::OIP | Status::E_FAIL), PollStep::Failed);
        assert_eq!(check.step(Status::E_FAIL), PollStep::Failed);
        assert_eq!(check.step(Status::P_FAIL), PollStep::Done);
        assert_eq!(check.step(Status::empty()), PollStep::Done);
    }

    #[test]
    fn ecc_bits_decode() {
        assert_eq!(Status::from_bits_retain(0x00).ecc(), ECCStatus::Ok);
        assert_eq!(Status::from_bits_retain(0x10).ecc(), ECCStatus::Corrected);
        assert_eq!(Status::from_bits_retain(0x21).ecc(), ECCStatus::Failed);
        assert_eq!(Status::from_bits_retain(0x30).ecc(), ECCStatus::Failing);
    }

    #[test]
    fn register_addresses() {
        assert_eq!(Register::Protection.address(), 0xA0);
        assert_eq!(Register::Features1.address(), 0xB0);
        assert_eq!(Register::Status1.address(), 0xC0);
        assert_eq!(Register::Status2.address(), 0xF0);
    }
}
