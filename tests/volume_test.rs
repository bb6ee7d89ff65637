// test of volume-level operations against in-memory devices
use chrono::NaiveDate;
use pascalfs::types::{Date,FileType,PurgePolicy};
use pascalfs::{MemoryDevice,Volume};

const TOTAL: usize = 280;

fn blank_volume() -> Volume {
    let _ = env_logger::builder().is_test(true).try_init();
    let dev = MemoryDevice::create(TOTAL);
    Volume::format(Box::new(dev),"BLANK",None).expect("could not format")
}

fn assert_sorted_disjoint(vol: &Volume) {
    let files = vol.list_files();
    for i in 0..files.len() {
        assert!(files[i].begin_block() < files[i].end_block());
        if i > 0 {
            assert!(files[i-1].end_block() <= files[i].begin_block());
        }
    }
}

#[test]
fn format_and_reopen() {
    let mut vol = blank_volume();
    assert_eq!(vol.volume_name(),"BLANK");
    assert_eq!(vol.total_blocks(),TOTAL as u16);
    assert_eq!(vol.list_files().len(),0);
    assert_eq!(vol.free_blocks(),TOTAL as u16 - 6);
    // the written directory must mount again as the same volume
    let bytes: Vec<u8> = (0..TOTAL).map(|b| vol.get_dev().read_block(b).expect("read failed")).flatten().collect();
    let vol2 = Volume::open(Box::new(MemoryDevice::from_bytes(&bytes).expect("bad buffer")),PurgePolicy::Strict).expect("open failed");
    assert_eq!(vol2.volume_name(),"BLANK");
    assert_eq!(vol2.list_files().len(),0);
}

#[test]
fn first_fit_placement() {
    // volume of 280 blocks, one file at blocks 6-10, a new 3 block file
    // must land at block 10, right behind it
    let mut vol = blank_volume();
    vol.create_file("FIRST",FileType::Data,4).expect("create failed");
    assert_eq!(vol.list_files()[0].begin_block(),6);
    assert_eq!(vol.list_files()[0].end_block(),10);
    let entry = vol.create_file("SECOND",FileType::Data,3).expect("create failed");
    assert_eq!(entry.begin_block(),10);
    assert_eq!(entry.end_block(),13);
    assert_sorted_disjoint(&vol);
}

#[test]
fn create_delete_stays_sorted() {
    let mut vol = blank_volume();
    for (name,blocks) in [("A",10),("B",20),("C",5),("D",40),("E",1)] {
        vol.create_file(name,FileType::Data,blocks).expect("create failed");
        assert_sorted_disjoint(&vol);
    }
    vol.delete_file("B").expect("delete failed");
    assert_sorted_disjoint(&vol);
    vol.delete_file("D").expect("delete failed");
    assert_sorted_disjoint(&vol);
    // a new file drops into the first gap that fits
    let entry = vol.create_file("F",FileType::Data,15).expect("create failed");
    assert_eq!(entry.begin_block(),16);
    assert_sorted_disjoint(&vol);
    match vol.delete_file("NOTHERE") {
        Ok(()) => panic!("delete should have failed"),
        Err(e) => assert_eq!(e.to_string(),"no file")
    }
}

#[test]
fn fragmentation_is_observable() {
    let mut vol = blank_volume();
    // occupy 6..106, 106..206, free 206..280 = 74 blocks
    vol.create_file("A",FileType::Data,100).expect("create failed");
    vol.create_file("B",FileType::Data,100).expect("create failed");
    vol.delete_file("A").expect("delete failed");
    // now 174 blocks are free but the largest gap is 100
    assert_eq!(vol.free_blocks(),174);
    assert_eq!(vol.largest_gap(),100);
    match vol.create_file("BIG",FileType::Data,150) {
        Ok(_) => panic!("create should have failed"),
        Err(e) => assert_eq!(e.to_string(),"no gap large enough")
    }
    // the failure left nothing behind
    assert_eq!(vol.list_files().len(),1);
    assert_eq!(vol.free_blocks(),174);
    // after a crunch the same request succeeds
    vol.crunch().expect("crunch failed");
    assert_eq!(vol.largest_gap(),174);
    vol.create_file("BIG",FileType::Data,150).expect("create failed");
    assert_sorted_disjoint(&vol);
}

#[test]
fn out_of_space() {
    let mut vol = blank_volume();
    vol.create_file("F1",FileType::Data,270).expect("create failed");
    match vol.create_file("F2",FileType::Data,10) {
        Ok(_) => panic!("create should have failed"),
        Err(e) => assert_eq!(e.to_string(),"no gap large enough")
    }
}

#[test]
fn directory_full() {
    let mut vol = blank_volume();
    for i in 0..77 {
        vol.create_file(&format!("F{}",i),FileType::Data,1).expect("create failed");
    }
    match vol.create_file("ONEMORE",FileType::Data,1) {
        Ok(_) => panic!("create should have failed"),
        Err(e) => assert_eq!(e.to_string(),"directory is full")
    }
}

#[test]
fn names_are_case_insensitive() {
    let mut vol = blank_volume();
    vol.create_file("Foo",FileType::Data,1).expect("create failed");
    // stored upper case
    assert_eq!(vol.list_files()[0].name(),"FOO");
    // found under any case
    vol.rename_file("foo","Bar").expect("rename failed");
    assert_eq!(vol.list_files()[0].name(),"BAR");
    match vol.create_file("bar",FileType::Data,1) {
        Ok(_) => panic!("create should have failed"),
        Err(e) => assert_eq!(e.to_string(),"duplicate file")
    }
    vol.delete_file("bAr").expect("delete failed");
    assert_eq!(vol.list_files().len(),0);
}

#[test]
fn name_rules() {
    let mut vol = blank_volume();
    match vol.create_file("WHAT?",FileType::Data,1) {
        Ok(_) => panic!("create should have failed"),
        Err(e) => assert_eq!(e.to_string(),"illegal name")
    }
    match vol.create_file("SIXTEEN.LETTERS!",FileType::Data,1) {
        Ok(_) => panic!("create should have failed"),
        Err(e) => assert_eq!(e.to_string(),"name too long")
    }
    // spaces are stripped, not rejected
    vol.create_file("MY FILE",FileType::Data,1).expect("create failed");
    assert_eq!(vol.list_files()[0].name(),"MYFILE");
    // volume names are capped at 7
    match vol.set_volume_name("TOOLONGNAME") {
        Ok(_) => panic!("rename should have failed"),
        Err(e) => assert_eq!(e.to_string(),"name too long")
    }
    vol.set_volume_name("disk2").expect("rename failed");
    assert_eq!(vol.volume_name(),"DISK2");
}

#[test]
fn last_set_date_survives_remount() {
    let mut vol = blank_volume();
    let d = NaiveDate::from_ymd_opt(1986,6,15).unwrap();
    vol.set_last_set_date(d.and_hms_opt(0,0,0)).expect("set date failed");
    assert_eq!(vol.last_set_date(),Date::Ymd(d));
    let bytes: Vec<u8> = (0..TOTAL).map(|b| vol.get_dev().read_block(b).expect("read failed")).flatten().collect();
    let vol2 = Volume::open(Box::new(MemoryDevice::from_bytes(&bytes).expect("bad buffer")),PurgePolicy::Strict).expect("open failed");
    assert_eq!(vol2.last_set_date(),Date::Ymd(d));
    // out of range dates are refused and leave the header alone
    let bad = NaiveDate::from_ymd_opt(1910,1,1).unwrap().and_hms_opt(0,0,0);
    match vol.set_last_set_date(bad) {
        Ok(_) => panic!("set date should have failed"),
        Err(e) => assert_eq!(e.to_string(),"date out of range")
    }
    assert_eq!(vol.last_set_date(),Date::Ymd(d));
}

#[test]
fn rename_collision() {
    let mut vol = blank_volume();
    vol.create_file("A",FileType::Data,1).expect("create failed");
    vol.create_file("B",FileType::Data,1).expect("create failed");
    match vol.rename_file("A","B") {
        Ok(_) => panic!("rename should have failed"),
        Err(e) => assert_eq!(e.to_string(),"duplicate file")
    }
    // renaming to the same name is allowed
    vol.rename_file("A","a").expect("rename failed");
}

#[test]
fn retype_preserves_reserved_bits() {
    let mut vol = blank_volume();
    vol.create_file("A",FileType::Data,1).expect("create failed");
    vol.retype_file("A",FileType::Code).expect("retype failed");
    assert_eq!(vol.list_files()[0].file_type(),Some(FileType::Code));
}

#[test]
fn content_round_trip() {
    let mut vol = blank_volume();
    let dat: Vec<u8> = (0..2000).map(|i| (i%251) as u8).collect();
    let entry = vol.write_file("DATA",FileType::Data,&dat).expect("write failed");
    assert_eq!(entry.blocks(),4);
    assert_eq!(entry.last_block_bytes(),2000-3*512);
    assert_eq!(vol.read_file("data").expect("read failed"),dat);
}

#[test]
fn block_access_is_bounds_checked() {
    let mut vol = blank_volume();
    vol.create_file("A",FileType::Data,4).expect("create failed");
    vol.write_file_blocks("A",0,&vec![7u8;4*512]).expect("write failed");
    assert_eq!(vol.read_file_blocks("A",1,2).expect("read failed"),vec![7u8;2*512]);
    match vol.read_file_blocks("A",2,3) {
        Ok(_) => panic!("read should have failed"),
        Err(e) => assert_eq!(e.to_string(),"block range out of bounds")
    }
    // a write can never silently grow the file
    match vol.write_file_blocks("A",4,&vec![0u8;512]) {
        Ok(_) => panic!("write should have failed"),
        Err(e) => assert_eq!(e.to_string(),"block range out of bounds")
    }
}
