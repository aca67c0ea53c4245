/**********************************************
  > File Name		: main.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Sun 18 Apr 2021 02:17:45 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Test program of the record management component.
 *
 * Usage: rm_test [test numbers...]
 * Without arguments all tests run. Every test works on the file
 * "testrel" in the current directory and destroys it when done.
 * Set RUST_LOG=debug to watch the free list and the buffer pool.
 */

use std::env;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::process;

use log::{error, warn};
use thiserror::Error;

use arcturus::errors::RecordError;
use arcturus::page_management::page_file::PageFileManager;
use arcturus::record_management::{
    AttrType, CompOp, FileScan, Predicate, RecordFileHandle, RecordFileManager, Value, RID,
};
use arcturus::utils;

const FILE_NAME: &str = "testrel";
const STRLEN: usize = 29;
const NUM_OFFSET: usize = 32;
const R_OFFSET: usize = 36;
const REC_SIZE: usize = 40;
const PROG_UNIT: i32 = 500;
const FEW_RECS: i32 = 20;
const LOTS_OF_RECS: i32 = 12345;
const NUM_TESTS: usize = 7;

#[derive(Debug, Error)]
enum TestError {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("check failed: {0}")]
    Check(String),
}

type TestResult<T> = Result<T, TestError>;

macro_rules! check {
    ($cond: expr, $($arg: tt)+) => {
        if !$cond {
            return Err(TestError::Check(format!($($arg)+)));
        }
    };
}

/*
 * The record used by the tests:
 *   str: STRLEN bytes | padding | num: i32 | r: f32
 * str is NUL terminated and padded with spaces.
 */
struct TestRec {
    s: String,
    num: i32,
    r: f32,
}

impl TestRec {
    fn new(s: String, num: i32) -> Self {
        TestRec { s, num, r: num as f32 }
    }

    fn nth(i: i32) -> Self {
        Self::new(format!("a{}", i), i)
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0u8; REC_SIZE];
        data[..STRLEN].iter_mut().for_each(|b| *b = b' ');
        let len = self.s.len().min(STRLEN - 1);
        data[..len].copy_from_slice(&self.s.as_bytes()[..len]);
        data[len] = 0;
        utils::write_i32(&mut data, NUM_OFFSET, self.num);
        data[R_OFFSET..R_OFFSET + 4].copy_from_slice(&self.r.to_le_bytes());
        data
    }

    fn from_bytes(data: &[u8]) -> Self {
        let s = &data[..STRLEN];
        let end = s.iter().position(|b| *b == 0).unwrap_or(STRLEN);
        let mut r = [0u8; 4];
        r.copy_from_slice(&data[R_OFFSET..R_OFFSET + 4]);
        TestRec {
            s: String::from_utf8_lossy(&s[..end]).into_owned(),
            num: utils::read_i32(data, NUM_OFFSET),
            r: f32::from_le_bytes(r),
        }
    }
}

impl fmt::Display for TestRec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {}, {:.6}]", self.s, self.num, self.r)
    }
}

struct Tester {
    rfm: RecordFileManager,
}

impl Tester {
    fn new() -> Self {
        Tester {
            rfm: RecordFileManager::new(PageFileManager::new()),
        }
    }

    fn create_file(&mut self) -> TestResult<()> {
        println!("\ncreating {}", FILE_NAME);
        self.rfm.create_file(FILE_NAME, REC_SIZE)?;
        Ok(())
    }

    fn destroy_file(&mut self) -> TestResult<()> {
        println!("\ndestroying {}", FILE_NAME);
        self.rfm.destroy_file(FILE_NAME)?;
        Ok(())
    }

    fn open_file(&mut self) -> TestResult<RecordFileHandle> {
        println!("\nopening {}", FILE_NAME);
        Ok(self.rfm.open_file(FILE_NAME)?)
    }

    fn close_file(&mut self, fh: &mut RecordFileHandle) -> TestResult<()> {
        println!("\nclosing {}", FILE_NAME);
        self.rfm.close_file(fh)?;
        Ok(())
    }

    fn create_and_open(&mut self) -> TestResult<RecordFileHandle> {
        self.create_file()?;
        self.open_file()
    }

    fn close_and_destroy(&mut self, mut fh: RecordFileHandle) -> TestResult<()> {
        self.close_file(&mut fh)?;
        self.destroy_file()
    }
}

fn add_recs(fh: &mut RecordFileHandle, num_recs: i32) -> TestResult<()> {
    println!("\nadding {} records", num_recs);
    let mut last = None;
    for i in 0..num_recs {
        last = Some(fh.insert_record(&TestRec::nth(i).to_bytes())?);
        if (i + 1) % PROG_UNIT == 0 {
            print!("{}  ", i + 1);
            let _ = io::stdout().flush();
        }
    }
    if num_recs % PROG_UNIT != 0 {
        println!("{}", num_recs);
    } else {
        println!();
    }
    if let Some(rid) = last {
        println!("Page/Slot: {} {}", rid.get_page_num(), rid.get_slot_num());
    }
    Ok(())
}

fn insert_named(fh: &mut RecordFileHandle, prefix: &str, n: i32) -> TestResult<()> {
    for i in 0..n {
        fh.insert_record(&TestRec::new(format!("{}{}", prefix, i), i).to_bytes())?;
    }
    Ok(())
}

//check that the file holds exactly the records added by add_recs.
fn verify_file(fh: &RecordFileHandle, num_recs: i32) -> TestResult<()> {
    println!("\nverifying file contents");
    let mut found = vec![false; num_recs as usize];
    let mut n = 0;
    let mut fs = FileScan::open(fh, Predicate::all())?;
    while let Some(rec) = fs.next_record(fh)? {
        let tr = TestRec::from_bytes(rec.get_data());
        check!(
            tr.num >= 0 && tr.num < num_recs && tr.s == format!("a{}", tr.num) && tr.r == tr.num as f32,
            "invalid record = {}",
            tr
        );
        check!(!found[tr.num as usize], "duplicate record = {}", tr);
        found[tr.num as usize] = true;
        n += 1;
    }
    fs.close()?;
    check!(n == num_recs, "{} records in file (supposed to be {})", n, num_recs);
    Ok(())
}

//the largest rid in use.
fn last_position_occupied(fh: &RecordFileHandle) -> TestResult<RID> {
    let mut last = RID::new(0, 0);
    let mut fs = FileScan::open(fh, Predicate::all())?;
    while let Some(rec) = fs.next_record(fh)? {
        last = last.max(rec.get_rid());
    }
    fs.close()?;
    println!(
        "Last position occupied = ({}, {})",
        last.get_page_num(),
        last.get_slot_num()
    );
    Ok(last)
}

//delete every record matching the predicate, returns how many.
fn delete_matching(fh: &mut RecordFileHandle, predicate: Predicate) -> TestResult<i32> {
    let mut fs = FileScan::open(fh, predicate)?;
    let mut count = 0;
    while let Some(rec) = fs.next_record(fh)? {
        fh.delete_record(&rec.get_rid())?;
        count += 1;
    }
    fs.close()?;
    Ok(count)
}

fn num_predicate(op: CompOp, v: i32) -> Predicate {
    Predicate::new(AttrType::INT, 4, NUM_OFFSET, op, Some(Value::Int(v)))
}

/*
 * Test1 tests simple creation, opening, closing, and deletion of
 * files.
 */
fn test1(t: &mut Tester) -> TestResult<()> {
    println!("test1 starting ****************");
    let fh = t.create_and_open()?;
    t.close_and_destroy(fh)?;
    println!("\ntest1 done ********************");
    Ok(())
}

//Test2 tests adding a few records to a file.
fn test2(t: &mut Tester) -> TestResult<()> {
    println!("test2 starting ****************");
    let mut fh = t.create_and_open()?;
    add_recs(&mut fh, FEW_RECS)?;
    verify_file(&fh, FEW_RECS)?;
    t.close_and_destroy(fh)?;
    println!("\ntest2 done ********************");
    Ok(())
}

//Test3 tests adding lots of records to a file.
fn test3(t: &mut Tester) -> TestResult<()> {
    println!("test3 starting *******************");
    let mut fh = t.create_and_open()?;
    add_recs(&mut fh, LOTS_OF_RECS)?;
    verify_file(&fh, LOTS_OF_RECS)?;
    t.close_and_destroy(fh)?;
    println!("\ntest3 done *********************");
    Ok(())
}

//Test4 tests a scan with a comparison.
fn test4(t: &mut Tester) -> TestResult<()> {
    println!("test4 starting *******************");
    let mut fh = t.create_and_open()?;
    add_recs(&mut fh, FEW_RECS)?;
    verify_file(&fh, FEW_RECS)?;

    let num_comp = 10;
    println!("scanning records whose num < {}", num_comp);
    let mut fs = FileScan::open(&fh, num_predicate(CompOp::Lt, num_comp))?;
    let mut n = 0;
    while let Some(rec) = fs.next_record(&fh)? {
        let tr = TestRec::from_bytes(rec.get_data());
        check!(tr.num < num_comp, "record {} returned by num < {}", tr, num_comp);
        n += 1;
    }
    fs.close()?;
    println!("{} records found.", n);
    check!(n == num_comp, "{} records found, expected {}", n, num_comp);

    t.close_and_destroy(fh)?;
    println!("\ntest4 done *********************");
    Ok(())
}

//Test5 tests updating some records.
fn test5(t: &mut Tester) -> TestResult<()> {
    println!("test5 starting *******************");
    let mut fh = t.create_and_open()?;
    add_recs(&mut fh, FEW_RECS)?;
    verify_file(&fh, FEW_RECS)?;

    let mut fs = FileScan::open(&fh, Predicate::all())?;
    while let Some(mut rec) = fs.next_record(&fh)? {
        let num = utils::read_i32(rec.get_data(), NUM_OFFSET);
        utils::write_i32(rec.get_data_mut(), NUM_OFFSET, num + 1);
        fh.update_record(&rec)?;
    }
    fs.close()?;

    let mut fs = FileScan::open(&fh, Predicate::all())?;
    while let Some(rec) = fs.next_record(&fh)? {
        let tr = TestRec::from_bytes(rec.get_data());
        let old_num = tr.s.trim_start_matches('a').parse::<i32>().unwrap_or(-1);
        check!(old_num + 1 == tr.num, "record {} was not updated", tr);
    }
    fs.close()?;

    t.close_and_destroy(fh)?;
    println!("\ntest5 done ***********************");
    Ok(())
}

//Test6 tests deleting records found by a string scan.
fn test6(t: &mut Tester) -> TestResult<()> {
    println!("test6 starting ****************");
    let m = 100;
    let mut fh = t.create_and_open()?;
    add_recs(&mut fh, m)?;
    verify_file(&fh, m)?;

    let search = "a8";
    let predicate = || {
        Predicate::new(AttrType::STRING, search.len(), 0, CompOp::Eq, Some(Value::string(search)))
    };
    let mut fs = FileScan::open(&fh, predicate())?;
    while let Some(rec) = fs.next_record(&fh)? {
        println!("{}", TestRec::from_bytes(rec.get_data()));
        fh.delete_record(&rec.get_rid())?;
    }
    fs.close()?;

    let mut fs = FileScan::open(&fh, predicate())?;
    let left = fs.next_record(&fh)?;
    fs.close()?;
    check!(left.is_none(), "a deleted record was found again");

    t.close_and_destroy(fh)?;
    println!("\ntest6 done ********************");
    Ok(())
}

//Test7 tests reusing space of deleted records.
fn test7(t: &mut Tester) -> TestResult<()> {
    println!("test7 starting******************");
    let pages = 5;
    let recs_to_del = 100;
    let mut fh = t.create_and_open()?;
    let n = fh.slots_per_page() as i32 * pages;

    println!("Insert records of {} pages, total {}", pages, n);
    add_recs(&mut fh, n)?;
    verify_file(&fh, n)?;
    let last = last_position_occupied(&fh)?;
    check!(last.get_page_num() == pages as u32, "records spread over {} pages", last.get_page_num());

    println!("Delete first {} records", recs_to_del);
    let count = delete_matching(&mut fh, num_predicate(CompOp::Lt, recs_to_del))?;
    check!(count == recs_to_del, "{} records deleted", count);
    let last = last_position_occupied(&fh)?;
    check!(last.get_page_num() == pages as u32, "last page changed to {}", last.get_page_num());

    println!("Insert another {} records", recs_to_del);
    insert_named(&mut fh, "n", recs_to_del)?;
    let last = last_position_occupied(&fh)?;
    check!(last.get_page_num() == pages as u32, "the file grew to {} pages", last.get_page_num());
    check!(fh.num_pages() == pages as u32, "the file grew to {} pages", fh.num_pages());
    fh.verify_free_list()?;

    println!("Delete last {} records", recs_to_del);
    let count = delete_matching(&mut fh, num_predicate(CompOp::Ge, n - recs_to_del))?;
    check!(count == recs_to_del, "{} records deleted", count);
    last_position_occupied(&fh)?;

    println!("Insert another {} records", recs_to_del);
    insert_named(&mut fh, "m", recs_to_del)?;
    let last = last_position_occupied(&fh)?;
    check!(last.get_page_num() == pages as u32, "the file grew to {} pages", last.get_page_num());
    fh.verify_free_list()?;

    t.close_and_destroy(fh)?;
    println!("test7 done *****************");
    Ok(())
}

fn main() {
    env_logger::init();

    let tests: [fn(&mut Tester) -> TestResult<()>; NUM_TESTS] =
        [test1, test2, test3, test4, test5, test6, test7];
    let mut args = env::args();
    let prog_name = args.next().unwrap_or_else(|| String::from("rm_test"));
    let args: Vec<String> = args.collect();

    println!("Starting RM component test.");

    //delete files from last time
    if let Err(e) = fs::remove_file(FILE_NAME) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Could not remove {}: {}", FILE_NAME, e);
        }
    }

    let selected: Vec<usize> = if args.is_empty() {
        (1..=NUM_TESTS).collect()
    } else {
        args.iter()
            .filter_map(|arg| match arg.parse::<usize>() {
                Err(_) => {
                    eprintln!("{}: {} is not a number", prog_name, arg);
                    None
                }
                Ok(n) if n < 1 || n > NUM_TESTS => {
                    eprintln!("Valid test numbers are between 1 and {}", NUM_TESTS);
                    None
                }
                Ok(n) => Some(n),
            })
            .collect()
    };

    let mut tester = Tester::new();
    for test_num in selected {
        if let Err(e) = tests[test_num - 1](&mut tester) {
            error!("test{} failed: {}", test_num, e);
            eprintln!("test{} failed: {}", test_num, e);
            process::exit(1);
        }
    }

    println!("Ending RM component test.\n");
}
