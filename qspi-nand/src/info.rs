//! Identity data read out of the OTP region during initialization.

/// Length of the factory unique ID
pub const UID_LEN: usize = 32;
/// Bytes of the parameter page kept after initialization
pub const PARAMETER_PAGE_LEN: usize = 128;

/// Unique ID and parameter page of the device.
///
/// Filled once by [crate::QspiNandDevice::initialize], read only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceInfo {
    uid: [u8; UID_LEN],
    parameter_page: [u8; PARAMETER_PAGE_LEN],
}

impl DeviceInfo {
    pub const fn new(uid: [u8; UID_LEN], parameter_page: [u8; PARAMETER_PAGE_LEN]) -> Self {
        DeviceInfo {
            uid,
            parameter_page,
        }
    }

    pub fn uid(&self) -> &[u8; UID_LEN] {
        &self.uid
    }

    pub fn parameter_page(&self) -> &[u8; PARAMETER_PAGE_LEN] {
        &self.parameter_page
    }

    /// True if the unique ID passes its complement check
    pub fn uid_is_valid(&self) -> bool {
        check_uid(&self.uid)
    }
}

/// The second half of the unique ID must be the bitwise complement of the first
pub fn check_uid(uid: &[u8; UID_LEN]) -> bool {
    let (low, high) = uid.split_at(UID_LEN / 2);
    low.iter().zip(high).all(|(a, b)| a ^ b == 0xFF)
}

/// Furthest step of initialization the device completed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InitState {
    #[default]
    Uninitialized,
    /// Power on reset done
    Reset,
    /// ID read back as a different part, initialization stopped
    IdMismatch,
    /// ID matched the configured part
    IdVerified,
    /// Quad enable set
    FeatureConfigured,
    /// Unique ID and parameter page read and checked
    InfoRead,
    /// All blocks unprotected
    ProtectionCleared,
    Ready,
}
