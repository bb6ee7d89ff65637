//! ## Pascal volume model
//!
//! In-memory representation of a mounted volume: the raw header plus the
//! ordered list of logical file entries.  The list is kept sorted by start
//! block with pairwise disjoint extents, and every mutation rewrites the
//! whole four-block directory.  The historical mount-time purges are
//! applied here before anything is exposed, and the file count is always
//! recomputed from the surviving entries rather than trusted, since some
//! old tools left it inconsistent after a delete.

use std::collections::HashMap;
use std::str::FromStr;
use a2kit_macro::DiskStruct;
use log::{info,debug,error};
use num_traits::FromPrimitive;
use crate::types::*;
use crate::directory::{Directory,VolDirHeader,DirectoryEntry};
use crate::block::BlockDevice;
use crate::{pack,alloc};
use crate::{STDRESULT,DYNERR};

/// Logical file entry.  The fields are read-only outside the volume model
/// because sortedness and disjointness of the extents are volume invariants.
#[derive(Clone,Debug)]
pub struct FileEntry {
    begin: u16,
    end: u16,
    raw_type: u16,
    name: String,
    last_block_bytes: u16,
    mod_date: [u8;2]
}

impl FileEntry {
    /// Stored form of the name: upper case, no spaces or control characters.
    pub fn name(&self) -> &str {
        &self.name
    }
    /// First block of the extent.
    pub fn begin_block(&self) -> u16 {
        self.begin
    }
    /// First block past the extent.
    pub fn end_block(&self) -> u16 {
        self.end
    }
    pub fn blocks(&self) -> u16 {
        self.end - self.begin
    }
    /// Low 4 bits of the type field; `None` if they are not a defined type.
    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_u16(self.raw_type & 0x0f)
    }
    /// Full 16 bit type field including the wildcard and reserved bits.
    pub fn raw_type(&self) -> u16 {
        self.raw_type
    }
    pub fn last_block_bytes(&self) -> u16 {
        self.last_block_bytes
    }
    pub fn mod_date(&self) -> Date {
        pack::unpack_date(self.mod_date)
    }
    /// Damaged-block files mark physically bad sectors and must stay put.
    pub fn is_movable(&self) -> bool {
        self.raw_type & 0x0f != FileType::Bad as u16
    }
    fn from_slot(slot: &DirectoryEntry) -> Result<Self,Error> {
        for j in 0..(slot.name_len & 0x0f) {
            let c = slot.name[j as usize];
            if c<32 || c>126 {
                debug!("entry name character {}",c);
                return Err(Error::DirectoryCorrupt);
            }
        }
        Ok(Self {
            begin: u16::from_le_bytes(slot.begin_block),
            end: u16::from_le_bytes(slot.end_block),
            raw_type: u16::from_le_bytes(slot.file_type),
            name: pack::file_name_to_string(slot.name,slot.name_len)?,
            last_block_bytes: u16::from_le_bytes(slot.last_block_bytes),
            mod_date: slot.mod_date
        })
    }
    fn to_slot(&self) -> DirectoryEntry {
        DirectoryEntry {
            begin_block: u16::to_le_bytes(self.begin),
            end_block: u16::to_le_bytes(self.end),
            file_type: u16::to_le_bytes(self.raw_type),
            name_len: self.name.len() as u8,
            name: pack::string_to_file_name(&self.name),
            last_block_bytes: u16::to_le_bytes(self.last_block_bytes),
            mod_date: self.mod_date
        }
    }
}

/// Read blocks 2 through 5 into one buffer and parse the full slot table.
/// The records are allowed to cross block boundaries, so the blocks are
/// always gathered before parsing.
fn get_directory(dev: &mut Box<dyn BlockDevice>) -> Result<Directory,DYNERR> {
    let mut buf: Vec<u8> = Vec::new();
    for iblock in VOL_HEADER_BLOCK..FIRST_DATA_BLOCK {
        buf.append(&mut dev.read_block(iblock)?);
    }
    Ok(Directory::from_bytes(&buf)?)
}

/// The primary interface for operations on one mounted volume.
/// The volume takes ownership of the block device and requires `&mut self`
/// for every mutation, so writers are serialized by construction.
pub struct Volume {
    dev: Box<dyn BlockDevice>,
    header: VolDirHeader,
    tail: Vec<u8>,
    files: Vec<FileEntry>,
    policy: PurgePolicy
}

impl Volume {
    /// Mount a volume: parse the directory, reject corruption, apply the
    /// historical purges, and recompute the file count from the survivors.
    pub fn open(mut dev: Box<dyn BlockDevice>,policy: PurgePolicy) -> Result<Self,DYNERR> {
        let dir = get_directory(&mut dev)?;
        let total = u16::from_le_bytes(dir.header.total_blocks);
        let beg = u16::from_le_bytes(dir.header.begin_block);
        let end = u16::from_le_bytes(dir.header.end_block);
        if beg!=0 || end!=FIRST_DATA_BLOCK as u16 || dir.header.file_type!=[0,0] {
            debug!("bad header: begin {} end {} type {}",beg,end,u16::from_le_bytes(dir.header.file_type));
            return Err(Box::new(Error::DirectoryCorrupt));
        }
        if dir.header.name_len<1 || dir.header.name_len>7 {
            debug!("header name length {}",dir.header.name_len);
            return Err(Box::new(Error::DirectoryCorrupt));
        }
        for i in 0..dir.header.name_len {
            let c = dir.header.name[i as usize];
            if c<32 || c>126 {
                debug!("header name character {}",c);
                return Err(Box::new(Error::DirectoryCorrupt));
            }
        }
        if (total as usize) < FIRST_DATA_BLOCK || total as usize > dev.total_blocks() {
            debug!("header total blocks {}",total);
            return Err(Box::new(Error::DirectoryCorrupt));
        }
        // gather entries, stop trusting the table at the first zero-length name
        let mut files: Vec<FileEntry> = Vec::new();
        for slot in &dir.slots {
            if slot.name_len==0 {
                break;
            }
            files.push(FileEntry::from_slot(slot)?);
        }
        // mount-time purges come before any other entry validation; a
        // half-created entry often carries a garbage extent, and it must be
        // purged rather than fail the mount
        files.retain(|f| {
            if f.last_block_bytes==0 {
                info!("purging {}, no bytes in last block",f.name);
                return false;
            }
            if pack::unpack_date(f.mod_date)==Date::InProgress {
                info!("purging {}, creation was left in progress",f.name);
                return false;
            }
            if f.begin==f.end && policy==PurgePolicy::Strict {
                info!("purging {}, zero length extent",f.name);
                return false;
            }
            true
        });
        // survivors must be fully valid, they will be re-serialized on the
        // next write-back
        for f in &files {
            if pack::check_name(&f.name,false).is_err() {
                debug!("entry name {} cannot be stored",f.name);
                return Err(Box::new(Error::DirectoryCorrupt));
            }
            if f.begin < FIRST_DATA_BLOCK as u16 || f.end < f.begin || f.end > total {
                debug!("entry {} begin {} end {}",f.name,f.begin,f.end);
                return Err(Box::new(Error::DirectoryCorrupt));
            }
        }
        files.sort_by_key(|f| f.begin);
        for i in 1..files.len() {
            if files[i].begin < files[i-1].end {
                error!("extents of {} and {} overlap",files[i-1].name,files[i].name);
                return Err(Box::new(Error::DirectoryCorrupt));
            }
        }
        let stored_count = u16::from_le_bytes(dir.header.num_files);
        if stored_count as usize != files.len() {
            info!("stored file count {} does not match {} surviving entries",stored_count,files.len());
        }
        let mut header = dir.header;
        header.num_files = u16::to_le_bytes(files.len() as u16);
        Ok(Self {
            dev,
            header,
            tail: dir.tail,
            files,
            policy
        })
    }
    /// Build a fresh volume on the device: zeroed boot and directory blocks
    /// and an empty directory.  Data blocks are left alone, and no boot
    /// loader is installed.
    pub fn format(mut dev: Box<dyn BlockDevice>,vol_name: &str,time: Option<chrono::NaiveDateTime>) -> Result<Self,DYNERR> {
        let name = pack::adjust_name(vol_name);
        if let Err(e) = pack::check_name(&name,true) {
            error!("invalid volume name");
            return Err(Box::new(e));
        }
        let num_blocks = dev.total_blocks();
        if num_blocks < FIRST_DATA_BLOCK || num_blocks > u16::MAX as usize {
            error!("device of {} blocks cannot hold this file system",num_blocks);
            return Err(Box::new(Error::InvalidRange));
        }
        for iblock in 0..FIRST_DATA_BLOCK {
            dev.write_block(iblock,&[0;BLOCK_SIZE])?;
        }
        let mut header = VolDirHeader::new();
        header.begin_block = u16::to_le_bytes(0); // points at the first boot block, not the header
        header.end_block = u16::to_le_bytes(FIRST_DATA_BLOCK as u16);
        header.file_type = u16::to_le_bytes(0);
        header.name_len = name.len() as u8;
        header.name = pack::string_to_vol_name(&name);
        header.total_blocks = u16::to_le_bytes(num_blocks as u16);
        header.num_files = u16::to_le_bytes(0);
        header.last_access_date = u16::to_le_bytes(0);
        header.last_set_date = pack::pack_date(time)?;
        header.pad = [0,0,0,0];
        let mut ans = Self {
            dev,
            header,
            tail: vec![0;DIR_BLOCKS*BLOCK_SIZE - DIR_SLOTS*ENTRY_SIZE],
            files: Vec::new(),
            policy: PurgePolicy::Strict
        };
        ans.save_directory()?;
        Ok(ans)
    }
    /// Serialize the table and rewrite all four directory blocks.  A partly
    /// written directory is indistinguishable from corruption, so a subset
    /// of the blocks is never written.
    fn save_directory(&mut self) -> STDRESULT {
        let mut dir = Directory::new();
        dir.header = self.header.clone();
        for (i,f) in self.files.iter().enumerate() {
            dir.slots[i] = f.to_slot();
        }
        // trailing slots stay zero-filled
        dir.tail = self.tail.clone();
        let buf = dir.to_bytes();
        for iblock in 0..DIR_BLOCKS {
            self.dev.write_block(VOL_HEADER_BLOCK+iblock,&buf[iblock*BLOCK_SIZE..(iblock+1)*BLOCK_SIZE])?;
        }
        Ok(())
    }
    fn position(&self,name: &str) -> Option<usize> {
        let target = pack::adjust_name(name);
        self.files.iter().position(|f| f.name==target)
    }
    /// Validate and insert a new sorted entry without writing the directory.
    /// Nothing changes, in memory or on disk, unless every check passes.
    fn alloc_entry(&mut self,name: &str,ftype: FileType,num_blocks: u16,last_block_bytes: u16) -> Result<usize,DYNERR> {
        let stored = pack::adjust_name(name);
        pack::check_name(&stored,false)?;
        if self.position(&stored).is_some() {
            error!("duplicate file name {}",stored);
            return Err(Box::new(Error::DuplicateName));
        }
        if self.files.len() >= MAX_FILES {
            error!("directory is full");
            return Err(Box::new(Error::DirectoryFull));
        }
        if num_blocks==0 {
            error!("cannot allocate an empty extent");
            return Err(Box::new(Error::InvalidRange));
        }
        let total = u16::from_le_bytes(self.header.total_blocks);
        let beg = match alloc::find_gap(&self.files,num_blocks,total) {
            Some(b) => b,
            None => {
                // fragmentation is a first-class failure, the caller may crunch and retry
                error!("no contiguous run of {} blocks",num_blocks);
                return Err(Box::new(Error::VolumeFull));
            }
        };
        let entry = FileEntry {
            begin: beg,
            end: beg + num_blocks,
            raw_type: ftype as u16,
            name: stored,
            last_block_bytes,
            mod_date: pack::pack_date(None)?
        };
        let idx = self.files.iter().position(|f| f.begin > beg).unwrap_or(self.files.len());
        self.files.insert(idx,entry);
        self.header.num_files = u16::to_le_bytes(self.files.len() as u16);
        self.header.last_access_date = pack::pack_date(None)?;
        Ok(idx)
    }
    /// Create a file occupying `num_blocks` contiguous blocks.  Fails with
    /// `VolumeFull` when no single gap is large enough, even if the total
    /// free space would suffice; `free_blocks` and `largest_gap` tell the
    /// two cases apart.
    pub fn create_file(&mut self,name: &str,ftype: FileType,num_blocks: u16) -> Result<FileEntry,DYNERR> {
        let idx = self.alloc_entry(name,ftype,num_blocks,BLOCK_SIZE as u16)?;
        self.save_directory()?;
        Ok(self.files[idx].clone())
    }
    pub fn delete_file(&mut self,name: &str) -> STDRESULT {
        match self.position(name) {
            Some(idx) => {
                self.files.remove(idx);
                self.header.num_files = u16::to_le_bytes(self.files.len() as u16);
                self.save_directory()
            },
            None => Err(Box::new(Error::FileNotFound))
        }
    }
    /// Rename in place; extent and date are unaffected.
    pub fn rename_file(&mut self,old_name: &str,new_name: &str) -> STDRESULT {
        let stored = pack::adjust_name(new_name);
        pack::check_name(&stored,false)?;
        let idx = match self.position(old_name) {
            Some(idx) => idx,
            None => return Err(Box::new(Error::FileNotFound))
        };
        if let Some(other) = self.position(&stored) {
            if other!=idx {
                error!("duplicate file name {}",stored);
                return Err(Box::new(Error::DuplicateName));
            }
        }
        self.files[idx].name = stored;
        self.save_directory()
    }
    /// Change the low 4 bits of the type field, preserving the wildcard
    /// and reserved bits.
    pub fn retype_file(&mut self,name: &str,ftype: FileType) -> STDRESULT {
        match self.position(name) {
            Some(idx) => {
                self.files[idx].raw_type = (self.files[idx].raw_type & 0xfff0) | ftype as u16;
                self.save_directory()
            },
            None => Err(Box::new(Error::FileNotFound))
        }
    }
    pub fn set_volume_name(&mut self,vol_name: &str) -> STDRESULT {
        let name = pack::adjust_name(vol_name);
        pack::check_name(&name,true)?;
        self.header.name_len = name.len() as u8;
        self.header.name = pack::string_to_vol_name(&name);
        self.save_directory()
    }
    /// Set the volume's most-recently-set date.  `None` means the system clock.
    pub fn set_last_set_date(&mut self,time: Option<chrono::NaiveDateTime>) -> STDRESULT {
        self.header.last_set_date = pack::pack_date(time)?;
        self.save_directory()
    }
    pub fn volume_name(&self) -> String {
        match pack::vol_name_to_string(self.header.name,self.header.name_len) {
            Ok(s) => s,
            Err(_) => String::new() // unreachable after open or format validation
        }
    }
    pub fn total_blocks(&self) -> u16 {
        u16::from_le_bytes(self.header.total_blocks)
    }
    pub fn last_set_date(&self) -> Date {
        pack::unpack_date(self.header.last_set_date)
    }
    pub fn policy(&self) -> PurgePolicy {
        self.policy
    }
    /// Entries in ascending start-block order.
    pub fn list_files(&self) -> &[FileEntry] {
        &self.files
    }
    pub fn free_blocks(&self) -> u16 {
        alloc::free_blocks(&self.files,self.total_blocks())
    }
    pub fn largest_gap(&self) -> u16 {
        alloc::largest_gap(&self.files,self.total_blocks())
    }
    /// Read `count` blocks starting `offset` blocks into the file's extent.
    pub fn read_file_blocks(&mut self,name: &str,offset: u16,count: u16) -> Result<Vec<u8>,DYNERR> {
        let idx = match self.position(name) {
            Some(idx) => idx,
            None => return Err(Box::new(Error::FileNotFound))
        };
        let f = &self.files[idx];
        if offset as u32 + count as u32 > f.blocks() as u32 {
            error!("block range {}+{} exceeds extent of {}",offset,count,f.name);
            return Err(Box::new(Error::InvalidRange));
        }
        let beg = f.begin + offset;
        let mut ans: Vec<u8> = Vec::new();
        for iblock in beg..beg+count {
            ans.append(&mut self.dev.read_block(iblock as usize)?);
        }
        Ok(ans)
    }
    /// Write into the file's extent starting `offset` blocks in.  The data
    /// may end mid-block, in which case the trailing bytes of that block are
    /// unaffected.  A range past the extent is refused; growth requires
    /// re-allocation, contiguous layout forbids in-place append.
    pub fn write_file_blocks(&mut self,name: &str,offset: u16,dat: &[u8]) -> STDRESULT {
        let idx = match self.position(name) {
            Some(idx) => idx,
            None => return Err(Box::new(Error::FileNotFound))
        };
        let f = &self.files[idx];
        let count = (dat.len() + BLOCK_SIZE - 1)/BLOCK_SIZE;
        if offset as u32 + count as u32 > f.blocks() as u32 {
            error!("block range {}+{} exceeds extent of {}",offset,count,f.name);
            return Err(Box::new(Error::InvalidRange));
        }
        let beg = (f.begin + offset) as usize;
        for b in 0..count {
            let chunk = &dat[b*BLOCK_SIZE..std::cmp::min((b+1)*BLOCK_SIZE,dat.len())];
            self.dev.write_block(beg+b,chunk)?;
        }
        Ok(())
    }
    /// Read the whole file, trimmed to its logical end.
    pub fn read_file(&mut self,name: &str) -> Result<Vec<u8>,DYNERR> {
        let idx = match self.position(name) {
            Some(idx) => idx,
            None => return Err(Box::new(Error::FileNotFound))
        };
        let blocks = self.files[idx].blocks();
        let last = std::cmp::min(self.files[idx].last_block_bytes as usize,BLOCK_SIZE);
        let name = self.files[idx].name.clone();
        let mut ans = self.read_file_blocks(&name,0,blocks)?;
        if blocks > 0 {
            ans.truncate((blocks as usize - 1)*BLOCK_SIZE + last);
        }
        Ok(ans)
    }
    /// Allocate and write a whole file.  Content blocks are written first,
    /// the directory last.
    pub fn write_file(&mut self,name: &str,ftype: FileType,dat: &[u8]) -> Result<FileEntry,DYNERR> {
        if dat.len()==0 {
            error!("empty data is not allowed for Pascal files");
            return Err(Box::new(Error::InvalidRange));
        }
        let num_blocks = ((dat.len() + BLOCK_SIZE - 1)/BLOCK_SIZE) as u16;
        let last_block_bytes = match dat.len()%BLOCK_SIZE {
            0 => BLOCK_SIZE as u16,
            r => r as u16
        };
        let idx = self.alloc_entry(name,ftype,num_blocks,last_block_bytes)?;
        let beg = self.files[idx].begin as usize;
        for b in 0..num_blocks as usize {
            let chunk = &dat[b*BLOCK_SIZE..std::cmp::min((b+1)*BLOCK_SIZE,dat.len())];
            self.dev.write_block(beg+b,chunk)?;
        }
        self.save_directory()?;
        Ok(self.files[idx].clone())
    }
    /// Decode a text file to UTF8 with LF separators.
    pub fn read_text(&mut self,name: &str) -> Result<String,DYNERR> {
        let raw = self.read_file(name)?;
        let encoder = pack::Encoder::new(vec![0x0d]);
        let txt = pack::SequentialText::from_bytes(&raw)?;
        Ok(encoder.decode(&txt.text)?)
    }
    /// Encode UTF8 text into the paged format and write it as a TEXT file,
    /// editor header page included.
    pub fn write_text(&mut self,name: &str,txt: &str) -> Result<FileEntry,DYNERR> {
        let seq = pack::SequentialText::from_str(txt)?;
        self.write_file(name,FileType::Text,&seq.to_bytes())
    }
    /// Repack movable extents toward the front of the volume in their
    /// existing order.  Damaged-block files never move; the packing routes
    /// around them, leaving only the gaps they force.  Content blocks are
    /// copied before the directory is rewritten, and every file's content
    /// is byte-identical afterward.
    pub fn crunch(&mut self) -> STDRESULT {
        let mut cursor = FIRST_DATA_BLOCK as u16;
        for i in 0..self.files.len() {
            if !self.files[i].is_movable() {
                if self.files[i].end > cursor {
                    cursor = self.files[i].end;
                }
                continue;
            }
            let beg = self.files[i].begin;
            let end = self.files[i].end;
            if beg > cursor {
                debug!("moving {} from block {} to {}",self.files[i].name,beg,cursor);
                for b in 0..end-beg {
                    let buf = self.dev.read_block((beg+b) as usize)?;
                    self.dev.write_block((cursor+b) as usize,&buf)?;
                }
                self.files[i].begin = cursor;
                self.files[i].end = cursor + (end-beg);
            }
            cursor = self.files[i].end;
        }
        self.save_directory()
    }
    /// Expose the device, e.g. for a full-volume copy including the boot
    /// blocks, which this driver never interprets.
    pub fn get_dev(&mut self) -> &mut Box<dyn BlockDevice> {
        &mut self.dev
    }
    /// Write a directory listing in the filer's format.
    pub fn catalog_to_stdout(&self) {
        let typ_map: HashMap<u8,&str> = HashMap::from(TYPE_MAP_DISP);
        println!();
        println!("{}:",self.volume_name());
        for f in &self.files {
            let date = match f.mod_date() {
                Date::Ymd(d) => d.format("%d-%b-%y").to_string(),
                _ => "<NO DATE>".to_string()
            };
            let typ = match typ_map.get(&((f.raw_type & 0x0f) as u8)) {
                Some(s) => s,
                None => "????"
            };
            println!("{:15} {:4} {:9}  {:4}",f.name,f.blocks(),date,typ);
        }
        println!();
        println!("{} files, {} blocks used, {} unused, {} in largest",
            self.files.len(),
            self.total_blocks() - self.free_blocks(),
            self.free_blocks(),
            self.largest_gap());
        println!();
    }
}
