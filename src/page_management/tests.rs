/**********************************************
  > File Name		: page_management/tests.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Fri 26 Mar 2021 10:20:35 AM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

use super::buffer_manager::*;
use super::page_file::*;
use crate::errors::PageFileError;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/*
 * A raw file of num_pages pages, the first data byte of page i
 * is i.
 */
fn raw_file(dir: &TempDir, name: &str, num_pages: usize) -> Rc<File> {
    let path = dir.path().join(name);
    let mut bytes = vec![0u8; PAGE_FILE_HEADER_SIZE + num_pages * PAGE_SIZE];
    for i in 0..num_pages {
        bytes[PAGE_FILE_HEADER_SIZE + i * PAGE_SIZE + PAGE_HEADER_SIZE] = i as u8;
    }
    fs::write(&path, &bytes).unwrap();
    Rc::new(OpenOptions::new().read(true).write(true).open(&path).unwrap())
}

fn first_byte(data: &PageData) -> u8 {
    data.borrow()[PAGE_HEADER_SIZE]
}

/*
 * Test1:
 * Read 3 pages into a buffer of 3 frames, unpin them in order,
 * the first unpinned one is replaced first.
 */
#[test]
fn buffer_manager_lru_replacement() {
    init();
    let dir = TempDir::new().unwrap();
    let f = raw_file(&dir, "f", 5);
    let mut buffer = BufferManager::new(3);

    for i in 0..3 {
        let data = buffer.get_page(PageKey::new(1, i), &f).unwrap();
        assert_eq!(first_byte(&data), i as u8);
    }
    for i in 0..3 {
        buffer.unpin(PageKey::new(1, i)).unwrap();
    }
    //page 1 is used again, so page 0 then page 2 are the victims.
    buffer.get_page(PageKey::new(1, 1), &f).unwrap();
    buffer.unpin(PageKey::new(1, 1)).unwrap();

    let data = buffer.get_page(PageKey::new(1, 3), &f).unwrap();
    assert_eq!(first_byte(&data), 3);
    assert!(!buffer.contains(PageKey::new(1, 0)));
    assert!(buffer.contains(PageKey::new(1, 1)));
    assert!(buffer.contains(PageKey::new(1, 2)));

    buffer.get_page(PageKey::new(1, 4), &f).unwrap();
    assert!(!buffer.contains(PageKey::new(1, 2)));
    assert!(buffer.contains(PageKey::new(1, 1)));
    assert_eq!(buffer.capacity(), 3);
    assert_eq!(buffer.num_pages(), 3);
}

/*
 * Test2:
 * Pin more pages than frames, the buffer grows instead of failing.
 */
#[test]
fn buffer_manager_grows_when_all_pinned() {
    init();
    let dir = TempDir::new().unwrap();
    let f = raw_file(&dir, "f", 5);
    let mut buffer = BufferManager::new(2);
    for i in 0..5 {
        buffer.get_page(PageKey::new(1, i), &f).unwrap();
    }
    assert_eq!(buffer.capacity(), 8);
    assert_eq!(buffer.num_pages(), 5);

    //pinning a buffered page again only counts.
    buffer.get_page(PageKey::new(1, 0), &f).unwrap();
    assert_eq!(buffer.pin_count(PageKey::new(1, 0)), Some(2));
    assert_eq!(buffer.num_pages(), 5);
}

#[test]
fn buffer_manager_pin_errors() {
    init();
    let dir = TempDir::new().unwrap();
    let f = raw_file(&dir, "f", 2);
    let mut buffer = BufferManager::new(4);
    let key = PageKey::new(1, 0);

    assert!(matches!(buffer.unpin(key), Err(PageFileError::PageNotInBuf(0))));
    buffer.get_page(key, &f).unwrap();
    buffer.unpin(key).unwrap();
    assert!(matches!(buffer.unpin(key), Err(PageFileError::PageUnpinned(0))));
    assert!(matches!(buffer.mark_dirty(key), Err(PageFileError::PageUnpinned(0))));

    //pages past the end of the file can not be read.
    assert!(matches!(
        buffer.get_page(PageKey::new(1, 7), &f),
        Err(PageFileError::IncompleteRead(7))
    ));
    assert!(!buffer.contains(PageKey::new(1, 7)));
}

/*
 * Test3:
 * A dirty page is written back when it is replaced, a clean one
 * is not.
 */
#[test]
fn buffer_manager_writes_back_dirty_victims() {
    init();
    let dir = TempDir::new().unwrap();
    let f = raw_file(&dir, "f", 3);
    let mut buffer = BufferManager::new(1);

    let data = buffer.get_page(PageKey::new(1, 0), &f).unwrap();
    data.borrow_mut()[PAGE_HEADER_SIZE] = 0xab;
    buffer.mark_dirty(PageKey::new(1, 0)).unwrap();
    buffer.unpin(PageKey::new(1, 0)).unwrap();

    let data = buffer.get_page(PageKey::new(1, 1), &f).unwrap();
    data.borrow_mut()[PAGE_HEADER_SIZE] = 0xcd;
    buffer.unpin(PageKey::new(1, 1)).unwrap();

    buffer.get_page(PageKey::new(1, 2), &f).unwrap();
    buffer.unpin(PageKey::new(1, 2)).unwrap();

    let data = buffer.get_page(PageKey::new(1, 0), &f).unwrap();
    assert_eq!(first_byte(&data), 0xab);
    buffer.unpin(PageKey::new(1, 0)).unwrap();
    let data = buffer.get_page(PageKey::new(1, 1), &f).unwrap();
    assert_eq!(first_byte(&data), 1);
    buffer.unpin(PageKey::new(1, 1)).unwrap();
}

#[test]
fn buffer_manager_flush_pages_of_one_file() {
    init();
    let dir = TempDir::new().unwrap();
    let f = raw_file(&dir, "f", 2);
    let g = raw_file(&dir, "g", 2);
    let mut buffer = BufferManager::new(4);

    buffer.get_page(PageKey::new(1, 0), &f).unwrap();
    buffer.get_page(PageKey::new(2, 0), &g).unwrap();
    assert!(matches!(buffer.flush_pages(1), Err(PageFileError::PagePinned(0))));

    buffer.unpin(PageKey::new(1, 0)).unwrap();
    buffer.flush_pages(1).unwrap();
    assert!(!buffer.contains(PageKey::new(1, 0)));
    assert!(buffer.contains(PageKey::new(2, 0)));
    assert_eq!(buffer.num_pages(), 1);
}

fn new_page_file(pfm: &mut PageFileManager, path: &Path) -> PageFileHandle {
    pfm.create_file(path).unwrap();
    pfm.open_file(path).unwrap()
}

/*
 * Page File Unit Test1.
 * Allocate pages, write them, close and reopen the file.
 */
#[test]
fn page_file_persists_pages() {
    init();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pf1");
    let mut pfm = PageFileManager::with_buffer_size(4);
    let mut pfh = new_page_file(&mut pfm, &path);

    for i in 0..16u32 {
        let ph = pfh.allocate_page().unwrap();
        assert_eq!(ph.get_page_num(), i);
        ph.get_data_mut()[..4].copy_from_slice(&i.to_le_bytes());
        pfh.unpin_dirty_page(i).unwrap();
    }
    assert_eq!(pfh.num_pages(), 16);
    pfm.close_file(&mut pfh).unwrap();
    assert!(!pfm.is_open(&path));

    let len = fs::metadata(&path).unwrap().len() as usize;
    assert_eq!(len, PAGE_FILE_HEADER_SIZE + 16 * PAGE_SIZE);

    let pfh = pfm.open_file(&path).unwrap();
    assert_eq!(pfh.num_pages(), 16);
    for i in 0..16u32 {
        let ph = pfh.get_page(i).unwrap();
        assert_eq!(&ph.get_data()[..4], &i.to_le_bytes());
        assert_eq!(ph.get_data().len(), PAGE_DATA_SIZE);
        pfh.unpin_page(i).unwrap();
    }
    assert!(matches!(pfh.get_page(16), Err(PageFileError::InvalidPage(16))));
}

/*
 * Page File Unit Test2.
 * Disposed pages are skipped by scans and reused by allocation.
 */
#[test]
fn page_file_dispose_and_reuse() {
    init();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pf2");
    let mut pfm = PageFileManager::new();
    let mut pfh = new_page_file(&mut pfm, &path);

    for i in 0..4 {
        pfh.allocate_page().unwrap();
        pfh.unpin_page(i).unwrap();
    }

    let ph = pfh.get_page(2).unwrap();
    assert!(matches!(pfh.dispose_page(2), Err(PageFileError::PagePinned(2))));
    pfh.unpin_page(ph.get_page_num()).unwrap();
    pfh.dispose_page(2).unwrap();
    pfh.dispose_page(1).unwrap();
    assert!(matches!(pfh.get_page(1), Err(PageFileError::InvalidPage(1))));
    assert!(matches!(pfh.dispose_page(1), Err(PageFileError::InvalidPage(1))));

    let mut seen = Vec::new();
    let mut next = pfh.get_first_page().unwrap();
    while let Some(ph) = next {
        let page_num = ph.get_page_num();
        seen.push(page_num);
        pfh.unpin_page(page_num).unwrap();
        next = pfh.get_next_page(page_num).unwrap();
    }
    assert_eq!(seen, vec![0, 3]);
    //no page follows the last page number.
    assert!(pfh.get_next_page(u32::MAX).unwrap().is_none());

    //the last disposed page comes back first.
    let ph = pfh.allocate_page().unwrap();
    assert_eq!(ph.get_page_num(), 1);
    assert!(ph.get_data().iter().all(|b| *b == 0));
    pfh.unpin_page(1).unwrap();
    let ph = pfh.allocate_page().unwrap();
    assert_eq!(ph.get_page_num(), 2);
    pfh.unpin_page(2).unwrap();
    let ph = pfh.allocate_page().unwrap();
    assert_eq!(ph.get_page_num(), 4);
    pfh.unpin_page(4).unwrap();
    assert_eq!(pfh.num_pages(), 5);

    pfm.close_file(&mut pfh).unwrap();
}

#[test]
fn page_file_manager_errors() {
    init();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pf3");
    let mut pfm = PageFileManager::new();

    assert!(matches!(pfm.open_file(&path), Err(PageFileError::FileNotFound(_))));
    assert!(matches!(pfm.destroy_file(&path), Err(PageFileError::FileNotFound(_))));

    let mut pfh = new_page_file(&mut pfm, &path);
    assert!(matches!(pfm.create_file(&path), Err(PageFileError::FileExists(_))));
    assert!(matches!(pfm.open_file(&path), Err(PageFileError::FileOpen(_))));
    assert!(matches!(pfm.destroy_file(&path), Err(PageFileError::FileOpen(_))));

    //a pinned page keeps the file open.
    pfh.allocate_page().unwrap();
    assert!(matches!(pfm.close_file(&mut pfh), Err(PageFileError::PagePinned(0))));
    assert!(pfm.is_open(&path));
    pfh.unpin_page(0).unwrap();
    pfm.close_file(&mut pfh).unwrap();
    pfm.destroy_file(&path).unwrap();
    assert!(!path.exists());

    let junk = dir.path().join("junk");
    fs::write(&junk, vec![b'x'; 2 * PAGE_FILE_HEADER_SIZE]).unwrap();
    assert!(matches!(pfm.open_file(&junk), Err(PageFileError::NotPageFile(_))));
    fs::write(&junk, b"short").unwrap();
    assert!(matches!(pfm.open_file(&junk), Err(PageFileError::NotPageFile(_))));
}

/*
 * Two files opened by the same manager share the buffer pool
 * without mixing their pages.
 */
#[test]
fn page_files_share_the_buffer() {
    init();
    let dir = TempDir::new().unwrap();
    let mut pfm = PageFileManager::with_buffer_size(2);
    let mut a = new_page_file(&mut pfm, &dir.path().join("a"));
    let mut b = new_page_file(&mut pfm, &dir.path().join("b"));
    assert_ne!(a.get_file_id(), b.get_file_id());

    for (pfh, fill) in [(&mut a, 0x11u8), (&mut b, 0x22u8)] {
        for i in 0..3 {
            let ph = pfh.allocate_page().unwrap();
            ph.get_data_mut().iter_mut().for_each(|x| *x = fill);
            pfh.unpin_dirty_page(i).unwrap();
        }
    }
    for (pfh, fill) in [(&a, 0x11u8), (&b, 0x22u8)] {
        for i in 0..3 {
            let ph = pfh.get_page(i).unwrap();
            assert!(ph.get_data().iter().all(|x| *x == fill));
            pfh.unpin_page(i).unwrap();
        }
    }
    assert_eq!(pfm.buffer().borrow().capacity(), 2);
    pfm.close_file(&mut a).unwrap();
    pfm.close_file(&mut b).unwrap();
}
