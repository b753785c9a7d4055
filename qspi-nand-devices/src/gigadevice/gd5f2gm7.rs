use qspi_nand::QspiNand;

/// Concrete type that implements all the flash device features
/// for the GD5F2GM7 2 Gbit QSPI NAND flash.
///
/// The 3.3 V and 1.8 V parts share the command set and layout and differ
/// only in the device ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GD5F2GM7<const ID: u8>();

/// 3.3 V part
pub type GD5F2GM7UE = GD5F2GM7<0x92>;
/// 1.8 V part
pub type GD5F2GM7RE = GD5F2GM7<0x82>;

impl<const ID: u8> GD5F2GM7<ID> {
    /// Creates a new instance of the GD5F2GM7 flash device.
    pub fn new() -> Self {
        Self()
    }
}

impl<const ID: u8> Default for GD5F2GM7<ID> {
    fn default() -> Self {
        Self::new()
    }
}

// 2048 byte pages, 64 byte spare area, 64 byte ECC parity area
impl<const ID: u8> QspiNand<2048> for GD5F2GM7<ID> {
    const PAGES_PER_BLOCK: u32 = 64;
    const BLOCK_COUNT: u32 = 2048;
    const JEDEC_MANUFACTURER_ID: u8 = 0xC8;
    const JEDEC_DEVICE_ID: u8 = ID;
}

// Implement blocking trait
mod blocking {
    use super::GD5F2GM7;
    use qspi_nand::{cmd_blocking::QspiNandBlocking, transport::QspiTransport};

    impl<T: QspiTransport, const ID: u8> QspiNandBlocking<T, 2048> for GD5F2GM7<ID> {}
}
