/**********************************************
  > File Name		: page_file.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 01 Mar 2021 07:31:48 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Introduction:
 *
 * The page_file component provides facilities for higer-level
 * components to perform file I/O in terms of pages.
 *
 * In the page_file component, methods are provided to create,
 * destroy, open and close paged files, to scan through the pages of a
 * given file, to read a specific page of a given file, to add and
 * delete pages of a given file.
 *
 * Accessing data on a page of a file requires first reading the page
 * into a buffer pool in main memory, then manipulating its data there.
 * The buffer pool is shared by all files opened through one
 * PageFileManager and uses a Least_Recently_Used (LRU) page
 * replacement policy. When a page is removed from the buffer pool, it
 * is copied back to the file on disk if and only if the page is
 * marked as "dirty".
 *
 * File layout:
 *   file header (PAGE_FILE_HEADER_SIZE bytes):
 *     magic(8) | first_free(4) | num_pages(4) | reserved
 *   pages (PAGE_SIZE bytes each):
 *     next_free(4) | data (PAGE_DATA_SIZE)
 *
 * A page in use has next_free == PAGE_USED. Disposed pages are linked
 * together by next_free, the list ends with PAGE_LIST_END.
 */

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, info};

use super::buffer_manager::{BufferManager, PageData, PageKey};
use crate::errors::{PageFileError, PageFileResult};
use crate::utils;

pub const PAGE_SIZE: usize = 4096;
pub const PAGE_HEADER_SIZE: usize = 4;
pub const PAGE_DATA_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE;
pub const PAGE_FILE_HEADER_SIZE: usize = 40;
pub const DEFAULT_BUFFER_SIZE: usize = 40;

const PAGE_FILE_MAGIC: &[u8; 8] = b"ARCTURPF";
const PAGE_LIST_END: i32 = -1;
const PAGE_USED: i32 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageFileHeader {
    first_free: Option<u32>, //the number of the first disposed page.
    num_pages: u32,          //number of pages, disposed pages included.
}

impl PageFileHeader {
    fn new() -> Self {
        PageFileHeader {
            first_free: None,
            num_pages: 0,
        }
    }

    fn to_bytes(&self) -> [u8; PAGE_FILE_HEADER_SIZE] {
        let mut buf = [0u8; PAGE_FILE_HEADER_SIZE];
        buf[..8].copy_from_slice(PAGE_FILE_MAGIC);
        utils::write_page_link(&mut buf, 8, self.first_free);
        utils::write_i32(&mut buf, 12, self.num_pages as i32);
        buf
    }

    fn from_bytes(buf: &[u8]) -> Option<Self> {
        if &buf[..8] != PAGE_FILE_MAGIC {
            return None;
        }
        let num_pages = utils::read_i32(buf, 12);
        if num_pages < 0 {
            return None;
        }
        Some(PageFileHeader {
            first_free: utils::read_page_link(buf, 8),
            num_pages: num_pages as u32,
        })
    }
}

/*
 * A pinned page. The handle is only a view of the buffer frame,
 * the page must still be unpinned through its PageFileHandle.
 * Data starts right after the page header.
 */
#[derive(Debug, Clone)]
pub struct PageHandle {
    page_num: u32,
    data: PageData,
}

impl PageHandle {
    fn new(page_num: u32, data: PageData) -> Self {
        PageHandle { page_num, data }
    }

    pub fn get_page_num(&self) -> u32 {
        self.page_num
    }

    pub fn get_data(&self) -> Ref<'_, [u8]> {
        Ref::map(self.data.borrow(), |d| &d[PAGE_HEADER_SIZE..])
    }

    pub fn get_data_mut(&self) -> RefMut<'_, [u8]> {
        RefMut::map(self.data.borrow_mut(), |d| &mut d[PAGE_HEADER_SIZE..])
    }

    fn next_free(&self) -> i32 {
        utils::read_i32(&self.data.borrow(), 0)
    }

    fn set_next_free(&self, next_free: i32) {
        utils::write_i32(&mut self.data.borrow_mut(), 0, next_free);
    }
}

/*
 * The PageFileManager handles the creation, deletion, opening,
 * and closing of paged files. It owns the buffer pool, every
 * handle it opens shares it.
 */
#[derive(Debug)]
pub struct PageFileManager {
    buffer: Rc<RefCell<BufferManager>>,
    open_files: HashMap<PathBuf, u32>,
    next_file_id: u32,
}

impl Default for PageFileManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PageFileManager {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(size: usize) -> Self {
        PageFileManager {
            buffer: Rc::new(RefCell::new(BufferManager::new(size))),
            open_files: HashMap::new(),
            next_file_id: 1,
        }
    }

    pub fn buffer(&self) -> Rc<RefCell<BufferManager>> {
        Rc::clone(&self.buffer)
    }

    pub fn is_open<P: AsRef<Path>>(&self, file_name: P) -> bool {
        self.open_files.contains_key(file_name.as_ref())
    }

    pub fn create_file<P: AsRef<Path>>(&mut self, file_name: P) -> PageFileResult<()> {
        let path = file_name.as_ref();
        let fp = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => PageFileError::FileExists(path.to_path_buf()),
                _ => PageFileError::Io(e),
            })?;
        fp.write_all_at(&PageFileHeader::new().to_bytes(), 0)?;
        info!("Created page file {:?}", path);
        Ok(())
    }

    pub fn destroy_file<P: AsRef<Path>>(&mut self, file_name: P) -> PageFileResult<()> {
        let path = file_name.as_ref();
        if self.is_open(path) {
            return Err(PageFileError::FileOpen(path.to_path_buf()));
        }
        fs::remove_file(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PageFileError::FileNotFound(path.to_path_buf()),
            _ => PageFileError::Io(e),
        })?;
        info!("Destroyed page file {:?}", path);
        Ok(())
    }

    pub fn open_file<P: AsRef<Path>>(&mut self, file_name: P) -> PageFileResult<PageFileHandle> {
        let path = file_name.as_ref().to_path_buf();
        if self.is_open(&path) {
            return Err(PageFileError::FileOpen(path));
        }
        let fp = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => PageFileError::FileNotFound(path.clone()),
                _ => PageFileError::Io(e),
            })?;

        let mut buf = [0u8; PAGE_FILE_HEADER_SIZE];
        fp.read_exact_at(&mut buf, 0).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => PageFileError::NotPageFile(path.clone()),
            _ => PageFileError::Io(e),
        })?;
        let header = PageFileHeader::from_bytes(&buf)
            .ok_or_else(|| PageFileError::NotPageFile(path.clone()))?;

        let file_id = self.next_file_id;
        self.next_file_id += 1;
        self.open_files.insert(path.clone(), file_id);
        debug!("Opened page file {:?} as file {}, header={:?}", path, file_id, header);

        Ok(PageFileHandle {
            file_id,
            path,
            fp: Rc::new(fp),
            header,
            header_changed: false,
            buffer: Rc::clone(&self.buffer),
        })
    }

    /*
     * Write back all pages of the file and its header.
     * All pages of the file must be unpinned.
     */
    pub fn close_file(&mut self, pfh: &mut PageFileHandle) -> PageFileResult<()> {
        pfh.flush_pages()?;
        self.open_files.remove(&pfh.path);
        debug!("Closed page file {:?}", pfh.path);
        Ok(())
    }
}

/*
 * The PageFileHandle provides access to the pages of an open
 * file.
 */
#[derive(Debug)]
pub struct PageFileHandle {
    file_id: u32,
    path: PathBuf,
    fp: Rc<File>,
    header: PageFileHeader,
    header_changed: bool,
    buffer: Rc<RefCell<BufferManager>>,
}

impl PageFileHandle {
    pub fn get_file_id(&self) -> u32 {
        self.file_id
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }

    pub fn num_pages(&self) -> u32 {
        self.header.num_pages
    }

    fn key(&self, page_num: u32) -> PageKey {
        PageKey::new(self.file_id, page_num)
    }

    /*
     * Pin a page in use. Disposed pages and pages beyond the end of
     * the file are invalid.
     */
    pub fn get_page(&self, page_num: u32) -> PageFileResult<PageHandle> {
        if page_num >= self.header.num_pages {
            return Err(PageFileError::InvalidPage(page_num));
        }
        let data = self
            .buffer
            .borrow_mut()
            .get_page(self.key(page_num), &self.fp)?;
        let ph = PageHandle::new(page_num, data);
        if ph.next_free() != PAGE_USED {
            self.buffer.borrow_mut().unpin(self.key(page_num))?;
            return Err(PageFileError::InvalidPage(page_num));
        }
        Ok(ph)
    }

    pub fn get_first_page(&self) -> PageFileResult<Option<PageHandle>> {
        self.scan_from(0)
    }

    //the next page in use after page_num.
    pub fn get_next_page(&self, page_num: u32) -> PageFileResult<Option<PageHandle>> {
        match page_num.checked_add(1) {
            Some(start) => self.scan_from(start),
            None => Ok(None),
        }
    }

    fn scan_from(&self, start: u32) -> PageFileResult<Option<PageHandle>> {
        for page_num in start..self.header.num_pages {
            match self.get_page(page_num) {
                Ok(ph) => return Ok(Some(ph)),
                Err(PageFileError::InvalidPage(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /*
     * Allocate a page in the file, a disposed page is reused first.
     * The new page is pinned and zeroed.
     */
    pub fn allocate_page(&mut self) -> PageFileResult<PageHandle> {
        let page_num = match self.header.first_free {
            Some(page_num) => {
                let data = self
                    .buffer
                    .borrow_mut()
                    .get_page(self.key(page_num), &self.fp)?;
                let next = utils::read_page_link(&data.borrow(), 0);
                self.buffer.borrow_mut().unpin(self.key(page_num))?;
                self.header.first_free = next;
                page_num
            }
            None => {
                self.header.num_pages += 1;
                self.header.num_pages - 1
            }
        };
        self.header_changed = true;

        let data = self
            .buffer
            .borrow_mut()
            .allocate_page(self.key(page_num), &self.fp)?;
        let ph = PageHandle::new(page_num, data);
        ph.set_next_free(PAGE_USED);
        debug!("Allocated page {} of file {}", page_num, self.file_id);
        Ok(ph)
    }

    /*
     * Link a page in the disposed list. The page must not be pinned
     * by anyone.
     */
    pub fn dispose_page(&mut self, page_num: u32) -> PageFileResult<()> {
        let ph = self.get_page(page_num)?;
        let key = self.key(page_num);
        if self.buffer.borrow().pin_count(key) != Some(1) {
            self.buffer.borrow_mut().unpin(key)?;
            return Err(PageFileError::PagePinned(page_num));
        }
        ph.set_next_free(self.header.first_free.map_or(PAGE_LIST_END, |v| v as i32));
        self.buffer.borrow_mut().mark_dirty(key)?;
        self.buffer.borrow_mut().unpin(key)?;
        self.header.first_free = Some(page_num);
        self.header_changed = true;
        debug!("Disposed page {} of file {}", page_num, self.file_id);
        Ok(())
    }

    pub fn mark_dirty(&self, page_num: u32) -> PageFileResult<()> {
        self.buffer.borrow_mut().mark_dirty(self.key(page_num))
    }

    pub fn unpin_page(&self, page_num: u32) -> PageFileResult<()> {
        self.buffer.borrow_mut().unpin(self.key(page_num))
    }

    pub fn unpin_dirty_page(&self, page_num: u32) -> PageFileResult<()> {
        let mut buffer = self.buffer.borrow_mut();
        buffer.mark_dirty(self.key(page_num))?;
        buffer.unpin(self.key(page_num))
    }

    /*
     * Write all dirty pages of this file back, release them from
     * the buffer, and write the header if it changed.
     */
    pub fn flush_pages(&mut self) -> PageFileResult<()> {
        self.buffer.borrow_mut().flush_pages(self.file_id)?;
        if self.header_changed {
            self.fp.write_all_at(&self.header.to_bytes(), 0)?;
            self.header_changed = false;
        }
        Ok(())
    }
}
