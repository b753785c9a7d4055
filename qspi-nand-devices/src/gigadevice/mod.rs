//! GigaDevice QSPI NAND flash
mod gd5f2gm7;

pub use gd5f2gm7::{GD5F2GM7, GD5F2GM7RE, GD5F2GM7UE};
