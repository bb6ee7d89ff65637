//! ## Submodule with Pascal directory elements
//!
//! The directory always occupies blocks 2 through 5, read and written as
//! one 2048 byte table of 78 fixed 26-byte records.  Slot 0 is the volume
//! header, slots 1-77 are file entries.  Records are allowed to cross
//! block boundaries, so the four blocks are always handled as a unit.

// a2kit_macro automatically derives `new`, `to_bytes`, `from_bytes`, and `len` for
// the fixed length records.  The full table has a variable logical population,
// so its DiskStruct is written out by hand.
use a2kit_macro::{DiskStruct,DiskStructError};
use a2kit_macro_derive::DiskStruct;

use crate::types::{ENTRY_SIZE,DIR_SLOTS,DIR_BLOCKS,BLOCK_SIZE};

/// Slot 0 of the table.  `begin_block` points at the first boot block (always 0)
/// and `end_block` is the first block past the directory (always 6).
#[derive(DiskStruct,Clone)]
pub struct VolDirHeader {
    pub begin_block: [u8;2],
    pub end_block: [u8;2],
    pub file_type: [u8;2], // 0
    pub name_len: u8, // & 0x07 (LS 3 bits = max 7)
    pub name: [u8;7],
    pub total_blocks: [u8;2],
    pub num_files: [u8;2],
    pub last_access_date: [u8;2],
    pub last_set_date: [u8;2],
    pub pad: [u8;4]
}

/// One file entry.  `end_block` is the first block past the extent, and
/// `last_block_bytes` counts the bytes used in the final block.
#[derive(DiskStruct,Copy,Clone)]
pub struct DirectoryEntry {
    pub begin_block: [u8;2],
    pub end_block: [u8;2],
    pub file_type: [u8;2],
    pub name_len: u8, // & 0x0f (LS 4 bits = max 15)
    pub name: [u8;15],
    pub last_block_bytes: [u8;2],
    pub mod_date: [u8;2]
}

/// The full 2048 byte table.  All 77 entry slots are kept whether or not
/// they are logically in use, so an untouched table is rewritten byte for
/// byte.  The 20 bytes past the last slot are carried along for the same
/// reason.
pub struct Directory {
    pub header: VolDirHeader,
    pub slots: Vec<DirectoryEntry>,
    pub tail: Vec<u8>
}

impl DiskStruct for Directory {
    fn new() -> Self {
        Self {
            header: VolDirHeader::new(),
            slots: (1..DIR_SLOTS).map(|_| DirectoryEntry::new()).collect(),
            tail: vec![0;DIR_BLOCKS*BLOCK_SIZE - DIR_SLOTS*ENTRY_SIZE]
        }
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        ans.append(&mut self.header.to_bytes());
        for i in 0..self.slots.len() {
            ans.append(&mut self.slots[i].to_bytes());
        }
        ans.append(&mut self.tail.clone());
        return ans;
    }
    fn update_from_bytes(&mut self,bytes: &[u8]) -> Result<(),DiskStructError> {
        if bytes.len() != DIR_BLOCKS*BLOCK_SIZE {
            return Err(DiskStructError::UnexpectedSize);
        }
        self.header.update_from_bytes(&bytes[0..ENTRY_SIZE])?;
        self.slots = Vec::new();
        for i in 1..DIR_SLOTS {
            self.slots.push(DirectoryEntry::from_bytes(&bytes[i*ENTRY_SIZE..(i+1)*ENTRY_SIZE])?);
        }
        self.tail = bytes[DIR_SLOTS*ENTRY_SIZE..].to_vec();
        Ok(())
    }
    fn from_bytes(bytes: &[u8]) -> Result<Self,DiskStructError> {
        let mut ans = Self::new();
        ans.update_from_bytes(bytes)?;
        Ok(ans)
    }
    fn len(&self) -> usize {
        return DIR_BLOCKS*BLOCK_SIZE;
    }
}
