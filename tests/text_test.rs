// test of the paged text format
use pascalfs::pack::{Encoder,SequentialText,TextLines};
use pascalfs::types::{FileType,TEXT_PAGE};
use pascalfs::{MemoryDevice,Volume};
use a2kit_macro::DiskStruct;

// Some sample programs to test
// Indentation is important

const PROG1: &str =
"PROGRAM TEST;
BEGIN
  WRITE('HELLO FROM PASCAL')
END.";

const PROG2: &str =
"
PROGRAM TEST2

BEGIN
        WRITE('ANOTHER SOURCE FILE')
END.";

const PROG3: &str =
"   (* FIRST LINE INDENT **)

 PROGRAM TEST3;

 (* IS THIS SYNTAX OK? *)
    BEGIN
       WRITE('HELLO FROM TEST3')
    END.";

#[test]
fn encode_decode_programs() {
    let encoder = Encoder::new(vec![0x0d]);
    for prog in [PROG1,PROG2,PROG3] {
        let raw = encoder.encode(prog).expect("encode failed");
        assert_eq!(raw.len()%TEXT_PAGE,0);
        assert_eq!(encoder.decode(&raw).expect("decode failed"),String::from(prog)+"\n");
    }
}

#[test]
fn leading_space_run() {
    // a line with 10 leading spaces becomes one marker byte and a count
    let txt = "A\n          B\n";
    let encoder = Encoder::new(vec![0x0d]);
    let raw = encoder.encode(txt).expect("encode failed");
    let mut found = false;
    for i in 0..raw.len()-2 {
        if raw[i..i+3]==[0x10,0x20+10,b'B'] {
            found = true;
        }
    }
    assert!(found,"run marker missing");
    // and decompresses back to exactly 10 spaces
    assert_eq!(encoder.decode(&raw).expect("decode failed"),txt);
}

#[test]
fn lazy_lines() {
    let encoder = Encoder::new(vec![0x0d]);
    let raw = encoder.encode(PROG1).expect("encode failed");
    let expected = vec!["PROGRAM TEST;","BEGIN","  WRITE('HELLO FROM PASCAL')","END."];
    let lines: Vec<String> = TextLines::new(&raw).collect();
    assert_eq!(lines,expected);
    // the sequence restarts from the top every time
    let again: Vec<String> = TextLines::new(&raw).collect();
    assert_eq!(again,expected);
}

#[test]
fn pagination() {
    // no line may straddle a 1024 byte page boundary
    let mut txt = String::new();
    for i in 0..100 {
        txt += &format!("LINE NUMBER {} OF A RATHER LONG SOURCE FILE\n",i);
    }
    let encoder = Encoder::new(vec![0x0d]);
    let raw = encoder.encode(&txt).expect("encode failed");
    assert!(raw.len()%TEXT_PAGE==0 && raw.len()>TEXT_PAGE);
    // the last byte of every page is padding or a line end, never mid-line
    for i in (TEXT_PAGE-1..raw.len()).step_by(TEXT_PAGE) {
        assert!(raw[i]==0 || raw[i]==0x0d,"line straddles the page boundary at {}",i);
    }
    assert_eq!(encoder.decode(&raw).expect("decode failed"),txt);
    // an unbreakable line cannot be represented
    let monster = "X".repeat(2*TEXT_PAGE);
    match encoder.encode(&monster) {
        Ok(_) => panic!("encode should have failed"),
        Err(e) => assert_eq!(e.to_string(),"text could not be paginated")
    }
}

#[test]
fn text_file_on_volume() {
    let dev = MemoryDevice::create(280);
    let mut vol = Volume::format(Box::new(dev),"TEXTS",None).expect("could not format");
    let entry = vol.write_text("hello.text",PROG1).expect("write failed");
    assert_eq!(entry.file_type(),Some(FileType::Text));
    // editor header page plus at least one text page
    assert!(entry.blocks()>=4);
    assert_eq!(vol.read_text("HELLO.TEXT").expect("read failed"),String::from(PROG1)+"\n");
    // the raw bytes carry the 1K editor header
    let raw = vol.read_file("hello.text").expect("read failed");
    let seq = SequentialText::from_bytes(&raw).expect("bad text file");
    assert_eq!(seq.header.len(),TEXT_PAGE);
    assert_eq!(seq.header[0],1);
}
