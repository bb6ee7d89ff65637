//! ## Fundamental types for the Pascal file system
//!
//! Constants fixing the on-disk geometry, the error set, the 4-bit file
//! type enumeration, and the mount-time compatibility policy.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::str::FromStr;

pub const BLOCK_SIZE: usize = 512;
pub const TEXT_PAGE: usize = 1024;
/// first block of the directory, blocks 0-1 are boot blocks
pub const VOL_HEADER_BLOCK: usize = 2;
/// the directory is always exactly 4 blocks, 2 through 5
pub const DIR_BLOCKS: usize = 4;
/// file data starts immediately after the directory
pub const FIRST_DATA_BLOCK: usize = 6;
pub const ENTRY_SIZE: usize = 26;
/// slot 0 is the volume header, the rest are file entries
pub const DIR_SLOTS: usize = 78;
pub const MAX_FILES: usize = DIR_SLOTS - 1;
pub const INVALID_CHARS: &str = "$=?,[#:";

/// Enumerates driver errors.  The `Display` trait will print the long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("directory is unreadable or inconsistent")]
    DirectoryCorrupt,
    #[error("no gap large enough")]
    VolumeFull,
    #[error("directory is full")]
    DirectoryFull,
    #[error("illegal name")]
    InvalidName,
    #[error("name too long")]
    NameTooLong,
    #[error("duplicate file")]
    DuplicateName,
    #[error("no file")]
    FileNotFound,
    #[error("block range out of bounds")]
    InvalidRange,
    #[error("date out of range")]
    DateOutOfRange,
    #[error("unknown file type")]
    BadFileType,
    #[error("text could not be paginated")]
    TextFormat
}

/// Map file type codes to strings for display
pub const TYPE_MAP_DISP: [(u8,&str);9] = [
    (0x00, "NONE"),
    (0x01, "BAD"),
    (0x02, "CODE"),
    (0x03, "TEXT"),
    (0x04, "INFO"),
    (0x05, "DATA"),
    (0x06, "GRAF"),
    (0x07, "FOTO"),
    (0x08, "SECURE")
];

/// Enumerates the low 4 bits of the 16 bit type field.  Available conversions are:
/// * FileType to u8,u16,u32: `as u8` etc.
/// * u8,u16,u32 to FileType: `FileType::from_u8` etc., (use FromPrimitive trait)
/// * &str to FileType: `FileType::from_str`, str can be a number or mnemonic
///
/// `Bad` marks physically damaged blocks; such entries are never moved.
/// Bit 15 of the full field is the filer's wildcard flag, the remaining
/// bits are reserved; the driver preserves but never interprets them.
#[derive(FromPrimitive,Clone,Copy,PartialEq,Eq,Debug)]
pub enum FileType {
    Non = 0x00,
    Bad = 0x01,
    Code = 0x02,
    Text = 0x03,
    Info = 0x04,
    Data = 0x05,
    Graf = 0x06,
    Foto = 0x07,
    Secure = 0x08
}

impl FromStr for FileType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        // string can be the number itself
        if let Ok(num) = u8::from_str(s) {
            return match FileType::from_u8(num) {
                Some(typ) => Ok(typ),
                _ => Err(Error::BadFileType)
            };
        }
        // or a mnemonic
        match s {
            "bin" => Ok(Self::Data),
            "txt" => Ok(Self::Text),
            "pcode" => Ok(Self::Code),
            _ => Err(Error::BadFileType)
        }
    }
}

/// Outcome of unpacking the 16 bit date field.
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum Date {
    /// month field is 0, the no-date convention
    None,
    /// stored year is 100 or more, the filer's creation-in-progress sentinel
    InProgress,
    Ymd(chrono::NaiveDate)
}

/// Mount-time purge rules changed across filer revisions, so the rule for
/// zero-length extents is a policy the caller selects when opening a volume.
/// Entries with a zero byte count, or with the creation-in-progress date
/// sentinel, are purged under every policy.
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum PurgePolicy {
    /// a `begin==end` entry never survives the mount purge
    Strict,
    /// later revisions keep a `begin==end` entry if its byte count is nonzero
    KeepZeroLength
}
