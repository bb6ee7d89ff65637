//! ## Extent manager
//!
//! The Pascal file system has no free-space bitmap.  Free space is the
//! complement of the occupied extents within `[FIRST_DATA_BLOCK,total)`,
//! so it is always derived from the sorted entry list on demand, never
//! stored.  The volume model guarantees the list it passes in is sorted
//! by start block with pairwise disjoint extents.

use log::debug;
use crate::types::FIRST_DATA_BLOCK;
use crate::volume::FileEntry;

/// Enumerate the free gaps as (start,size) pairs in ascending block order.
pub fn gaps(files: &[FileEntry],total_blocks: u16) -> Vec<(u16,u16)> {
    let mut ans: Vec<(u16,u16)> = Vec::new();
    let mut cursor = FIRST_DATA_BLOCK as u16;
    for f in files {
        if f.begin_block() > cursor {
            ans.push((cursor,f.begin_block()-cursor));
        }
        if f.end_block() > cursor {
            cursor = f.end_block();
        }
    }
    if total_blocks > cursor {
        ans.push((cursor,total_blocks-cursor));
    }
    return ans;
}

/// First-fit search for `num` contiguous free blocks.  `None` covers both a
/// genuinely full volume and a fragmented one; compare `num` against
/// `free_blocks` and `largest_gap` to tell which.
pub fn find_gap(files: &[FileEntry],num: u16,total_blocks: u16) -> Option<u16> {
    for (start,size) in gaps(files,total_blocks) {
        if size >= num {
            debug!("gap of {} at block {}",size,start);
            return Some(start);
        }
    }
    None
}

pub fn free_blocks(files: &[FileEntry],total_blocks: u16) -> u16 {
    gaps(files,total_blocks).iter().map(|g| g.1).sum()
}

pub fn largest_gap(files: &[FileEntry],total_blocks: u16) -> u16 {
    gaps(files,total_blocks).iter().map(|g| g.1).max().unwrap_or(0)
}
