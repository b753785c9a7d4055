//! Command descriptors for a single QSPI transaction.
//!
//! A [QspiCommand] describes the instruction, address, dummy and data phases
//! of one bus transaction. Fields are private and each constructor matches
//! one device primitive, so a transport never sees a combination the flash
//! does not accept.
use embedded_nand::{ColumnAddress, PageIndex};

/// Number of bus lines used by a phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Lines {
    /// Phase is skipped
    #[default]
    None,
    Single,
    Dual,
    Quad,
}

impl Lines {
    /// Number of data lines, 0 when the phase is skipped
    pub const fn count(&self) -> u8 {
        match self {
            Lines::None => 0,
            Lines::Single => 1,
            Lines::Dual => 2,
            Lines::Quad => 4,
        }
    }
}

/// Width of the address phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressSize {
    /// Register address of get/set feature
    Bits8,
    /// Cache offset
    Bits16,
    /// Raw row address
    Bits24,
}

impl AddressSize {
    /// Number of address bytes on the wire
    pub const fn bytes(&self) -> u8 {
        match self {
            AddressSize::Bits8 => 1,
            AddressSize::Bits16 => 2,
            AddressSize::Bits24 => 3,
        }
    }
}

/// Address phase of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    pub value: u32,
    pub size: AddressSize,
    pub lines: Lines,
}

/// Direction of the data phase, seen from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Device to host
    Read,
    /// Host to device
    Write,
}

/// Data phase of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataPhase {
    pub len: usize,
    pub lines: Lines,
    pub direction: Direction,
}

/// Bus width variant of the read-from-cache command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReadMode {
    /// 1-1-1, 8 dummy cycles
    X1,
    /// 1-1-2, 8 dummy cycles
    X2,
    /// 1-1-4, 8 dummy cycles
    X4,
    /// 1-2-2, 4 dummy cycles
    DualIo,
    /// 1-4-4, 4 dummy cycles
    #[default]
    QuadIo,
    /// 1-4-4 double data rate, 8 dummy cycles
    QuadIoDtr,
}

impl ReadMode {
    /// Lines used by the cache offset
    pub const fn address_lines(&self) -> Lines {
        match self {
            ReadMode::X1 | ReadMode::X2 | ReadMode::X4 => Lines::Single,
            ReadMode::DualIo => Lines::Dual,
            ReadMode::QuadIo | ReadMode::QuadIoDtr => Lines::Quad,
        }
    }

    /// Lines used by the data phase
    pub const fn data_lines(&self) -> Lines {
        match self {
            ReadMode::X1 => Lines::Single,
            ReadMode::X2 | ReadMode::DualIo => Lines::Dual,
            ReadMode::X4 | ReadMode::QuadIo | ReadMode::QuadIoDtr => Lines::Quad,
        }
    }

    pub const fn dummy_cycles(&self) -> u8 {
        match self {
            ReadMode::DualIo | ReadMode::QuadIo => 4,
            ReadMode::X1 | ReadMode::X2 | ReadMode::X4 | ReadMode::QuadIoDtr => 8,
        }
    }

    pub const fn is_ddr(&self) -> bool {
        matches!(self, ReadMode::QuadIoDtr)
    }
}

/// Variant of the program-load command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProgramMode {
    /// Single line, cache reset to 0xFF first
    Load,
    /// Quad line, cache reset to 0xFF first
    #[default]
    LoadX4,
    /// Single line, rest of the cache kept
    RandomLoad,
    /// Quad line, rest of the cache kept
    RandomLoadX4,
}

impl ProgramMode {
    pub const fn data_lines(&self) -> Lines {
        match self {
            ProgramMode::Load | ProgramMode::RandomLoad => Lines::Single,
            ProgramMode::LoadX4 | ProgramMode::RandomLoadX4 => Lines::Quad,
        }
    }

    /// True if the load leaves cache bytes outside the written range untouched
    pub const fn keeps_cache(&self) -> bool {
        matches!(self, ProgramMode::RandomLoad | ProgramMode::RandomLoadX4)
    }
}

/// A single QSPI transaction.
///
/// The instruction is always sent on a single line. Build it with one of the
/// constructors, then hand it to [crate::transport::QspiTransport::command].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QspiCommand {
    instruction: u8,
    address: Option<Address>,
    dummy_cycles: u8,
    data: Option<DataPhase>,
    ddr: bool,
}

impl QspiCommand {
    const fn new(instruction: u8) -> Self {
        QspiCommand {
            instruction,
            address: None,
            dummy_cycles: 0,
            data: None,
            ddr: false,
        }
    }

    const fn single_address(value: u32, size: AddressSize) -> Option<Address> {
        Some(Address {
            value,
            size,
            lines: Lines::Single,
        })
    }

    /// Instruction with no other phase (reset, write enable/disable)
    pub const fn instruction(instruction: u8) -> Self {
        Self::new(instruction)
    }

    /// Read one byte from a feature/status register
    pub const fn get_feature(instruction: u8, register: u8) -> Self {
        QspiCommand {
            address: Self::single_address(register as u32, AddressSize::Bits8),
            data: Some(DataPhase {
                len: 1,
                lines: Lines::Single,
                direction: Direction::Read,
            }),
            ..Self::new(instruction)
        }
    }

    /// Write one byte to a feature register
    pub const fn set_feature(instruction: u8, register: u8) -> Self {
        QspiCommand {
            address: Self::single_address(register as u32, AddressSize::Bits8),
            data: Some(DataPhase {
                len: 1,
                lines: Lines::Single,
                direction: Direction::Write,
            }),
            ..Self::new(instruction)
        }
    }

    /// Read manufacturer and device ID after 8 dummy cycles
    pub const fn read_id(instruction: u8, len: usize) -> Self {
        QspiCommand {
            dummy_cycles: 8,
            data: Some(DataPhase {
                len,
                lines: Lines::Single,
                direction: Direction::Read,
            }),
            ..Self::new(instruction)
        }
    }

    /// Load a page from the array into the cache
    pub const fn page_to_cache(instruction: u8, page: PageIndex) -> Self {
        QspiCommand {
            address: Self::single_address(page.as_u32(), AddressSize::Bits24),
            ..Self::new(instruction)
        }
    }

    /// Read `len` bytes out of the cache starting at `column`
    pub const fn read_cache(
        instruction: u8,
        mode: ReadMode,
        column: ColumnAddress,
        len: usize,
    ) -> Self {
        QspiCommand {
            address: Some(Address {
                value: column.as_u16() as u32,
                size: AddressSize::Bits16,
                lines: mode.address_lines(),
            }),
            dummy_cycles: mode.dummy_cycles(),
            data: Some(DataPhase {
                len,
                lines: mode.data_lines(),
                direction: Direction::Read,
            }),
            ddr: mode.is_ddr(),
            ..Self::new(instruction)
        }
    }

    /// Load `len` bytes into the cache starting at `column`
    pub const fn program_load(
        instruction: u8,
        mode: ProgramMode,
        column: ColumnAddress,
        len: usize,
    ) -> Self {
        QspiCommand {
            address: Self::single_address(column.as_u16() as u32, AddressSize::Bits16),
            data: Some(DataPhase {
                len,
                lines: mode.data_lines(),
                direction: Direction::Write,
            }),
            ..Self::new(instruction)
        }
    }

    /// Program the cache into the page at `page`
    pub const fn program_execute(instruction: u8, page: PageIndex) -> Self {
        QspiCommand {
            address: Self::single_address(page.as_u32(), AddressSize::Bits24),
            ..Self::new(instruction)
        }
    }

    /// Erase the block starting at `page`
    pub const fn block_erase(instruction: u8, page: PageIndex) -> Self {
        QspiCommand {
            address: Self::single_address(page.as_u32(), AddressSize::Bits24),
            ..Self::new(instruction)
        }
    }

    pub const fn instruction_byte(&self) -> u8 {
        self.instruction
    }

    /// Instruction phase always uses a single line
    pub const fn instruction_lines(&self) -> Lines {
        Lines::Single
    }

    pub const fn address(&self) -> Option<Address> {
        self.address
    }

    pub const fn dummy_cycles(&self) -> u8 {
        self.dummy_cycles
    }

    pub const fn data(&self) -> Option<DataPhase> {
        self.data
    }

    pub const fn is_ddr(&self) -> bool {
        self.ddr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn read_cache_geometry_follows_mode() {
        let cases = [
            (ReadMode::X1, Lines::Single, 8, Lines::Single, false),
            (ReadMode::X2, Lines::Single, 8, Lines::Dual, false),
            (ReadMode::X4, Lines::Single, 8, Lines::Quad, false),
            (ReadMode::DualIo, Lines::Dual, 4, Lines::Dual, false),
            (ReadMode::QuadIo, Lines::Quad, 4, Lines::Quad, false),
            (ReadMode::QuadIoDtr, Lines::Quad, 8, Lines::Quad, true),
        ];
        for (mode, addr_lines, dummy, data_lines, ddr) in cases {
            let cmd = QspiCommand::read_cache(0xEB, mode, ColumnAddress::new(0x800), 16);
            let address = cmd.address().unwrap();
            assert_eq!(address.size, AddressSize::Bits16);
            assert_eq!(address.value, 0x800);
            assert_eq!(address.lines, addr_lines);
            assert_eq!(cmd.dummy_cycles(), dummy);
            let data = cmd.data().unwrap();
            assert_eq!(data.lines, data_lines);
            assert_eq!(data.len, 16);
            assert_eq!(data.direction, Direction::Read);
            assert_eq!(cmd.is_ddr(), ddr);
        }
    }

    #[test]
    fn row_address_commands_use_24_bits_and_no_data() {
        let page = PageIndex::new(0x1_2345);
        for cmd in [
            QspiCommand::page_to_cache(0x13, page),
            QspiCommand::program_execute(0x10, page),
            QspiCommand::block_erase(0xD8, page),
        ] {
            let address = cmd.address().unwrap();
            assert_eq!(address.size, AddressSize::Bits24);
            assert_eq!(address.lines, Lines::Single);
            assert_eq!(address.value, 0x1_2345);
            assert!(cmd.data().is_none());
            assert_eq!(cmd.dummy_cycles(), 0);
        }
    }

    #[test]
    fn feature_commands_carry_register_address() {
        let get = QspiCommand::get_feature(0x0F, 0xC0);
        assert_eq!(get.address().unwrap().size, AddressSize::Bits8);
        assert_eq!(get.address().unwrap().value, 0xC0);
        assert_eq!(get.data().unwrap().direction, Direction::Read);

        let set = QspiCommand::set_feature(0x1F, 0xB0);
        assert_eq!(set.data().unwrap().direction, Direction::Write);
        assert_eq!(set.data().unwrap().len, 1);
    }

    #[test]
    fn read_id_has_dummy_cycles_and_no_address() {
        let cmd = QspiCommand::read_id(0x9F, 2);
        assert!(cmd.address().is_none());
        assert_eq!(cmd.dummy_cycles(), 8);
        assert_eq!(cmd.data().unwrap().len, 2);
    }

    #[test]
    fn program_load_lines_follow_mode() {
        let x1 = QspiCommand::program_load(0x02, ProgramMode::Load, ColumnAddress::new(0), 2048);
        assert_eq!(x1.data().unwrap().lines, Lines::Single);
        let x4 = QspiCommand::program_load(0x32, ProgramMode::LoadX4, ColumnAddress::new(0), 2048);
        assert_eq!(x4.data().unwrap().lines, Lines::Quad);
        assert_eq!(x4.address().unwrap().lines, Lines::Single);
        assert!(ProgramMode::RandomLoadX4.keeps_cache());
        assert!(!ProgramMode::LoadX4.keeps_cache());
    }
}
