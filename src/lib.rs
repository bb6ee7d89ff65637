//! # `pascalfs` main library
//!
//! This library reads and writes the UCSD Pascal file system found on
//! Apple II volumes.  The format keeps its entire file table in four fixed
//! blocks, allocates every file as one contiguous extent, and has no
//! free-space bitmap; free space is inferred from the gaps between the
//! sorted extents.
//!
//! ## Architecture
//!
//! Operations are built around two objects:
//! * `block::BlockDevice` provides synchronous 512-byte block storage; the
//!   sector order, image containers, and interleaving are its problem
//! * `volume::Volume` imposes the file system on the blocks; it owns the
//!   device and serializes all mutations through `&mut self`
//!
//! Mounting applies the historical purges the filer applied: entries with
//! no bytes in their last block, entries whose date marks a creation left
//! in progress, and (policy dependent) entries with zero-length extents
//! are silently dropped, and the file count is recomputed.  Free space is
//! always derived from the entry list, fragmentation is reported rather
//! than worked around, and the `crunch` operation repacks movable extents
//! while damaged-block files stay anchored.
//!
//! Text files use the filer's paged run-length format for leading spaces;
//! both directions of that transform are committed wire formats.  All
//! other types, code included, are opaque block ranges.

pub mod types;
pub mod block;
pub mod directory;
pub mod pack;
pub mod alloc;
pub mod volume;

pub use types::{Error,FileType,Date,PurgePolicy};
pub use block::{BlockDevice,MemoryDevice};
pub use volume::{Volume,FileEntry};

type DYNERR = Box<dyn std::error::Error>;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;
