//! ## Packing and unpacking of dates, names, and text
//!
//! The 16 bit date field is laid out `YYYYYYY DDDDD MMMM` little-endian.
//! Stored years 0-39 stand for 2000-2039 and 40-99 for 1940-1999; stored
//! years of 100 or more are not calendar dates at all, the filer writes
//! them while a file creation is in progress.
//!
//! Pascal text is +ASCII split into 1024 byte pages padded with nulls,
//! with CR line separators.  ASCII 0x10 indicates the next byte is an
//! indentation count + 0x20.  Both directions of the text transform are
//! committed wire formats, other tools read what we write.

use chrono::Datelike;
use std::str::FromStr;
use std::fmt;
use a2kit_macro::{DiskStruct,DiskStructError};
use log::{debug,info,error};
use crate::types::{Error,Date,TEXT_PAGE,INVALID_CHARS};

/// Pack a date into the 16 bit directory field.  `None` means use the system clock.
/// Fails with `DateOutOfRange` unless the year is 1940 through 2039.
pub fn pack_date(time: Option<chrono::NaiveDateTime>) -> Result<[u8;2],Error> {
    let now = match time {
        Some(t) => t,
        _ => chrono::Local::now().naive_local()
    };
    let (_is_common_era,year) = now.year_ce();
    if year < 1940 || year > 2039 {
        return Err(Error::DateOutOfRange);
    }
    let packed_date = (now.month() + (now.day() << 4) + ((year%100) << 9)) as u16;
    Ok(u16::to_le_bytes(packed_date))
}

/// Unpack the 16 bit date field.  Month 0 is the no-date convention, and a
/// stored year past 99 is the creation-in-progress sentinel; neither is an error.
pub fn unpack_date(pascal_date: [u8;2]) -> Date {
    let date = u16::from_le_bytes(pascal_date);
    let stored_year = date >> 9;
    let month = date & 15;
    let day = (date >> 4) & 31;
    if stored_year > 99 {
        return Date::InProgress;
    }
    if month == 0 {
        return Date::None;
    }
    let year = match stored_year {
        y if y < 40 => 2000 + y,
        y => 1900 + y
    };
    match chrono::NaiveDate::from_ymd_opt(year as i32,month as u32,day as u32) {
        Some(d) => Date::Ymd(d),
        None => {
            debug!("impossible date, month {} day {}",month,day);
            Date::None
        }
    }
}

/// Put a name into the form the filer stores: upper case, spaces and
/// control characters stripped.
pub fn adjust_name(s: &str) -> String {
    s.chars().filter(|c| *c!=' ' && !c.is_ascii_control()).collect::<String>().to_uppercase()
}

/// Validate a name already in storage form.
pub fn check_name(s: &str,is_vol: bool) -> Result<(),Error> {
    for char in s.chars() {
        if !char.is_ascii() || INVALID_CHARS.contains(char) || char.is_ascii_control() {
            debug!("bad name character `{}` (codepoint {})",char,char as u32);
            return Err(Error::InvalidName);
        }
    }
    if s.len()<1 {
        info!("name is empty");
        return Err(Error::InvalidName);
    }
    if s.len()>7 && is_vol {
        info!("volume name too long, max 7");
        return Err(Error::NameTooLong);
    }
    if s.len()>15 && !is_vol {
        info!("file name too long, max 15");
        return Err(Error::NameTooLong);
    }
    Ok(())
}

pub fn file_name_to_string(fname: [u8;15],len: u8) -> Result<String,Error> {
    let copy = fname[0..(len & 0x0f) as usize].to_vec();
    match String::from_utf8(copy) {
        Ok(result) => Ok(result.trim_end().to_string()),
        Err(_) => Err(Error::DirectoryCorrupt)
    }
}

pub fn vol_name_to_string(fname: [u8;7],len: u8) -> Result<String,Error> {
    let copy = fname[0..(len & 0x07) as usize].to_vec();
    match String::from_utf8(copy) {
        Ok(result) => Ok(result.trim_end().to_string()),
        Err(_) => Err(Error::DirectoryCorrupt)
    }
}

/// Caller must have validated the name; panics otherwise.
pub fn string_to_file_name(s: &str) -> [u8;15] {
    let mut ans: [u8;15] = [0;15]; // load with null
    let mut i = 0;
    if check_name(s,false).is_err() {
        panic!("attempt to store a bad file name")
    }
    for char in s.to_uppercase().chars() {
        char.encode_utf8(&mut ans[i..]);
        i += 1;
    }
    return ans;
}

/// Caller must have validated the name; panics otherwise.
pub fn string_to_vol_name(s: &str) -> [u8;7] {
    let mut ans: [u8;7] = [0;7]; // load with null
    let mut i = 0;
    if check_name(s,true).is_err() {
        panic!("attempt to store a bad volume name")
    }
    for char in s.to_uppercase().chars() {
        char.encode_utf8(&mut ans[i..]);
        i += 1;
    }
    return ans;
}

/// Transforms between UTF8 and the paged Pascal text format.
pub struct Encoder {
    line_terminator: Vec<u8>
}

/// if we moved past a page boundary go back and pad with nulls after the last CR,
/// and move remainder text to the next page.  Return Ok(new page number) or Error
fn paginate(ans: &mut Vec<u8>,page: usize,count_on_page: usize) -> Result<usize,Error> {
    if count_on_page >= TEXT_PAGE {
        let offset = page*TEXT_PAGE;
        for i in (0..TEXT_PAGE).rev() {
            if ans[offset+i]==0x0d {
                for _j in 0..TEXT_PAGE-1-i {
                    ans.insert(offset+i+1,0);
                }
                return Ok(page+1);
            }
        }
        // a single line longer than a page cannot be represented
        return Err(Error::TextFormat);
    }
    return Ok(page);
}

fn is_terminated(bytes: &[u8],term: &[u8]) -> bool {
    if term.len()==0 {
        return true;
    }
    if bytes.len() < term.len() {
        return false;
    }
    for i in 0..term.len() {
        if bytes[i+bytes.len()-term.len()]!=term[i] {
            return false;
        }
    }
    true
}

impl Encoder {
    pub fn new(line_terminator: Vec<u8>) -> Self {
        Self {
            line_terminator
        }
    }
    pub fn encode(&self,txt: &str) -> Result<Vec<u8>,Error> {
        debug!("encoding text");
        let src: Vec<u8> = txt.as_bytes().to_vec();
        let mut ans: Vec<u8> = Vec::new();
        let mut starting_line = true;
        let mut indenting = 0;
        let mut page = 0;
        let mut count_on_page: usize = 0;
        for i in 0..src.len() {
            // handle CRLF
            if i+1 < src.len() && src[i]==0x0d && src[i+1]==0x0a {
                continue;
            }
            // handle indents and line feeds
            // Pascal 1.2 seems to always put the indent code even for no indent, so mimic that.
            if starting_line {
                if i>0 && src[i]==0x20 {
                    indenting += 1;
                    starting_line = false;
                } else {
                    if i>0 {
                        ans.push(0x10);
                        ans.push(0x20);
                        count_on_page += 2;
                    }
                    if src[i]!=0x0a && src[i]!=0x0d {
                        starting_line = false;
                        ans.push(src[i]);
                    } else {
                        ans.push(0x0d);
                    }
                    count_on_page += 1;
                }
            } else if indenting>0 {
                if src[i]==0x20 && indenting+0x20<0xff {
                    indenting += 1;
                } else {
                    ans.push(0x10);
                    ans.push(0x20 + indenting);
                    if src[i]!=0x0a && src[i]!=0x0d {
                        ans.push(src[i]);
                    } else {
                        ans.push(0x0d);
                        starting_line = true;
                    }
                    indenting = 0;
                    count_on_page += 3;
                }
            } else if src[i]==0x0a || src[i]==0x0d {
                ans.push(0x0d);
                count_on_page += 1;
                starting_line = true;
            } else if src[i]<128 {
                ans.push(src[i]);
                count_on_page += 1;
                starting_line = false;
            } else {
                debug!("code point {} cannot be encoded",src[i]);
                return Err(Error::TextFormat);
            }
            // handle pagination
            page = paginate(&mut ans,page,count_on_page)?;
            count_on_page = count_on_page % TEXT_PAGE;
        }
        // if CR is required and missing add it
        if !is_terminated(&ans, &self.line_terminator) && self.line_terminator.len()>0 {
            ans.append(&mut self.line_terminator.clone());
            count_on_page += 1;
        }
        // handle pagination one last time
        paginate(&mut ans,page,count_on_page)?;
        // pad the rest of the last page
        while ans.len()%TEXT_PAGE>0 {
            ans.push(0);
        }
        return Ok(ans);
    }
    pub fn decode(&self,src: &[u8]) -> Result<String,Error> {
        let mut ans: Vec<u8> = Vec::new();
        let mut await_indent = false;
        for i in 0..src.len() {
            if await_indent {
                for _rep in 0..src[i].saturating_sub(32) {
                    ans.push(0x20);
                }
                await_indent = false;
            } else if src[i]==0x0d {
                ans.push(0x0a);
            } else if src[i]==0x10 {
                await_indent = true;
            } else if src[i]<127 && src[i]>0 {
                ans.push(src[i]);
            }
        }
        match String::from_utf8(ans) {
            Ok(s) => Ok(s),
            Err(_) => Err(Error::TextFormat)
        }
    }
}

/// Restartable iterator over the lines of encoded Pascal text.
/// Expands indent codes, skips page padding, strips terminators.
/// Restart by constructing it again over the same bytes.
pub struct TextLines<'a> {
    src: &'a [u8],
    pos: usize
}

impl<'a> TextLines<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self {
            src,
            pos: 0
        }
    }
}

impl<'a> Iterator for TextLines<'a> {
    type Item = String;
    fn next(&mut self) -> Option<String> {
        let mut line: Vec<u8> = Vec::new();
        let mut started = false;
        while self.pos < self.src.len() {
            let b = self.src[self.pos];
            self.pos += 1;
            if b==0x10 {
                if self.pos < self.src.len() {
                    for _rep in 0..self.src[self.pos].saturating_sub(32) {
                        line.push(0x20);
                    }
                    self.pos += 1;
                }
                started = true;
            } else if b==0x0d {
                return String::from_utf8(line).ok();
            } else if b<127 && b>0 {
                line.push(b);
                started = true;
            }
            // nulls are page padding, pass over them
        }
        match started {
            true => String::from_utf8(line).ok(),
            false => None
        }
    }
}

/// Structured representation of text files on disk.  The filer gives every
/// text file a 1K header page for the editor's use, followed by the text pages.
pub struct SequentialText {
    pub header: Vec<u8>,
    pub text: Vec<u8>
}

impl SequentialText {
    /// The meaning of the editor's header data is not documented; these bytes
    /// are taken verbatim from a file the 1.2 editor wrote.
    fn create_header() -> [u8;TEXT_PAGE] {
        let mut ans: [u8;TEXT_PAGE] = [0;TEXT_PAGE];
        ans[0] = 1;
        ans[0x70..0x80].copy_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x4F, 0x00, 0x05, 0x00, 0x5E, 0x00]);
        ans[0x80..0x90].copy_from_slice(&[0x13, 0xA3, 0x13, 0xA3, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        ans
    }
}

/// Allows the structure to be created from string slices using `from_str`.
impl FromStr for SequentialText {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        let encoder = Encoder::new(vec![0x0d]);
        let dat = encoder.encode(s)?;
        Ok(Self {
            header: Self::create_header().to_vec(),
            text: dat
        })
    }
}

/// Allows the text to be displayed to the console using `println!`.  This also
/// derives `to_string`, so the structure can be converted to `String`.
impl fmt::Display for SequentialText {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoder = Encoder::new(vec![0x0d]);
        if let Ok(ans) = encoder.decode(&self.text) {
            return write!(f,"{}",ans);
        }
        error!("text did not decode");
        write!(f,"err")
    }
}

impl DiskStruct for SequentialText {
    /// Create an empty structure
    fn new() -> Self {
        Self {
            header: Vec::new(),
            text: Vec::new()
        }
    }
    /// Create structure using flattened bytes (typically from disk)
    /// Due to the pagination, we must keep all the nulls.
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> {
        if dat.len() < TEXT_PAGE + 1 {
            return Err(DiskStructError::OutOfData);
        }
        Ok(Self {
            header: dat[0..TEXT_PAGE].to_vec(),
            text: dat[TEXT_PAGE..].to_vec()
        })
    }
    /// Return flattened bytes (typically written to disk)
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        ans.append(&mut self.header.clone());
        ans.append(&mut self.text.clone());
        return ans;
    }
    /// Update with flattened bytes
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError> {
        let temp = SequentialText::from_bytes(&dat)?;
        self.header = temp.header;
        self.text = temp.text;
        Ok(())
    }
    /// Length of the flattened structure
    fn len(&self) -> usize {
        return self.header.len() + self.text.len();
    }
}
