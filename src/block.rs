//! ## Block storage collaborator
//!
//! The driver does not know about disk image containers or sector
//! interleaving.  It consumes any block-addressable device through the
//! `BlockDevice` trait and interprets nothing outside blocks 2 and up
//! (0 and 1 are boot blocks, passed through untouched).

use log::debug;
use crate::types::{Error,BLOCK_SIZE};
use crate::{STDRESULT,DYNERR};

/// Abstraction of synchronous 512-byte block storage.  The `Volume`
/// takes ownership of a device and uses it as its backing store.
pub trait BlockDevice {
    /// Read one 512 byte block.
    fn read_block(&mut self,block: usize) -> Result<Vec<u8>,DYNERR>;
    /// Write one block.  If `dat` is shorter than the block, trailing bytes are unaffected.
    fn write_block(&mut self,block: usize,dat: &[u8]) -> STDRESULT;
    /// Capacity of the device in blocks.
    fn total_blocks(&self) -> usize;
}

/// RAM-backed block device.  Serves tests and fresh volume construction;
/// persistence is the caller's concern via `to_bytes`.
pub struct MemoryDevice {
    buf: Vec<u8>
}

impl MemoryDevice {
    pub fn create(num_blocks: usize) -> Self {
        Self {
            buf: vec![0;num_blocks*BLOCK_SIZE]
        }
    }
    pub fn from_bytes(dat: &[u8]) -> Result<Self,DYNERR> {
        if dat.len()==0 || dat.len()%BLOCK_SIZE>0 {
            debug!("byte stream length {} is not block aligned",dat.len());
            return Err(Box::new(Error::InvalidRange));
        }
        Ok(Self {
            buf: dat.to_vec()
        })
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }
}

impl BlockDevice for MemoryDevice {
    fn read_block(&mut self,block: usize) -> Result<Vec<u8>,DYNERR> {
        if block >= self.total_blocks() {
            debug!("block {} is past the end of the device",block);
            return Err(Box::new(Error::InvalidRange));
        }
        Ok(self.buf[block*BLOCK_SIZE..(block+1)*BLOCK_SIZE].to_vec())
    }
    fn write_block(&mut self,block: usize,dat: &[u8]) -> STDRESULT {
        if block >= self.total_blocks() || dat.len() > BLOCK_SIZE {
            debug!("cannot write {} bytes to block {}",dat.len(),block);
            return Err(Box::new(Error::InvalidRange));
        }
        self.buf[block*BLOCK_SIZE..block*BLOCK_SIZE+dat.len()].copy_from_slice(dat);
        Ok(())
    }
    fn total_blocks(&self) -> usize {
        self.buf.len()/BLOCK_SIZE
    }
}
