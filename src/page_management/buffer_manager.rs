/**********************************************
  > File Name		: buffer_manager.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 01 Mar 2021 07:52:27 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::rc::Rc;

use log::{debug, info, trace};

use super::page_file::{PAGE_FILE_HEADER_SIZE, PAGE_SIZE};
use crate::errors::{PageFileError, PageFileResult};

/*
 * Memory and References.
 *
 * Buffer Pages Storage:
 * Every frame owns its bytes through a Rc<RefCell<..>>. A pinned page
 * is handed out as a clone of that Rc, so a page can be referred by
 * many handles at the same time while the frame stays in the table.
 * A frame is only recycled when its pin count drops to 0.
 */
pub type PageData = Rc<RefCell<Box<[u8]>>>;

/*
 * Pages from different files live in the same pool, so a page is
 * identified by the file it belongs to and its number in that file.
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub file_id: u32,
    pub page_num: u32,
}

impl PageKey {
    pub fn new(file_id: u32, page_num: u32) -> Self {
        Self { file_id, page_num }
    }
}

/*
 * Data structure to represent a page.
 * Notice that the data structure for a page in main memory
 * is different from it in a file.
 */
#[derive(Debug)]
struct BufferPage {
    data: PageData, //data including the page header.
    next: i32,
    prev: i32,
    dirty: bool,
    pin_count: u32,
    key: Option<PageKey>,
    fp: Option<Rc<File>>,
}

impl BufferPage {
    fn new(next: i32) -> Self {
        BufferPage {
            data: Rc::new(RefCell::new(vec![0u8; PAGE_SIZE].into_boxed_slice())),
            next,
            prev: -1,
            dirty: false,
            pin_count: 0,
            key: None,
            fp: None,
        }
    }

    fn reset(&mut self, next_free: i32) {
        self.data.borrow_mut().iter_mut().for_each(|b| *b = 0);
        self.dirty = false;
        self.pin_count = 0;
        self.key = None;
        self.fp = None;
        self.prev = -1;
        self.next = next_free;
    }
}

/*
 * Accessing data on a page of a file requires first reading
 * the page into a buffer pool in main memory. While a page
 * is in memory and its data is available for manipulation,
 * the page is said to be "pinned". After the manipulation
 * is done, the page is "unpinned". Unpinning a page does
 * not necessarily cause the page to be remove from the buffer.
 * An unpinned page is kept in memory as long as its space in
 * the buffer pool is not needed.
 *
 * Unpinned pages are linked in the unused list, most recently
 * unpinned first. When a frame is needed and no free frame is
 * left, the last page of the unused list is the victim.
 */
#[derive(Debug)]
pub struct BufferManager {
    buffer_table: Vec<BufferPage>,
    num_pages: usize, //number of pages in the buffer pool, free frames not included.
    first: i32,       //most recently used unpinned frame.
    last: i32,        //least recently used unpinned frame.
    free: i32,        //first free frame, all free frames are linked by next.
    page_table: HashMap<PageKey, usize>,
}

impl BufferManager {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let buffer_table = (0..size)
            .map(|i| BufferPage::new(if i + 1 < size { (i + 1) as i32 } else { -1 }))
            .collect();
        debug!("buffer initial length = {}", size);
        BufferManager {
            buffer_table,
            num_pages: 0,
            first: -1,
            last: -1,
            free: 0,
            page_table: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer_table.len()
    }

    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    pub fn contains(&self, key: PageKey) -> bool {
        self.page_table.contains_key(&key)
    }

    pub fn pin_count(&self, key: PageKey) -> Option<u32> {
        self.page_table
            .get(&key)
            .map(|&index| self.buffer_table[index].pin_count)
    }

    pub fn is_dirty(&self, key: PageKey) -> Option<bool> {
        self.page_table
            .get(&key)
            .map(|&index| self.buffer_table[index].dirty)
    }

    /*
     * Pin a page of a file, read it from the file if it is not
     * in the buffer yet.
     */
    pub fn get_page(&mut self, key: PageKey, fp: &Rc<File>) -> PageFileResult<PageData> {
        if let Some(&index) = self.page_table.get(&key) {
            trace!("Getting page {:?} from buffer", key);
            self.pin(index);
            return Ok(Rc::clone(&self.buffer_table[index].data));
        }

        debug!("Reading page {:?} from file", key);
        let index = self.take_frame()?;
        let res = {
            let mut data = self.buffer_table[index].data.borrow_mut();
            Self::read_page(fp, key.page_num, &mut data)
        };
        if let Err(e) = res {
            self.release_frame(index);
            return Err(e);
        }
        self.install(index, key, fp);
        Ok(Rc::clone(&self.buffer_table[index].data))
    }

    /*
     * Pin a brand new page without reading it. The frame is zeroed
     * and dirty, so it reaches the file even if nobody writes it.
     */
    pub fn allocate_page(&mut self, key: PageKey, fp: &Rc<File>) -> PageFileResult<PageData> {
        let index = match self.page_table.get(&key) {
            Some(&index) => {
                self.pin(index);
                index
            }
            None => {
                let index = self.take_frame()?;
                self.install(index, key, fp);
                index
            }
        };
        let page = &mut self.buffer_table[index];
        page.data.borrow_mut().iter_mut().for_each(|b| *b = 0);
        page.dirty = true;
        Ok(Rc::clone(&page.data))
    }

    pub fn mark_dirty(&mut self, key: PageKey) -> PageFileResult<()> {
        let index = self.index_of(key)?;
        let page = &mut self.buffer_table[index];
        if page.pin_count == 0 {
            return Err(PageFileError::PageUnpinned(key.page_num));
        }
        page.dirty = true;
        Ok(())
    }

    /*
     * Unpin a page.
     * When an operation to a page is done, the function that calls
     * the get_page method need to unpin the page.
     * If the pin count of a page decreases to 0, the page will be
     * linked to the unused list.
     */
    pub fn unpin(&mut self, key: PageKey) -> PageFileResult<()> {
        let index = self.index_of(key)?;
        let page = &mut self.buffer_table[index];
        if page.pin_count == 0 {
            return Err(PageFileError::PageUnpinned(key.page_num));
        }
        page.pin_count -= 1;
        if page.pin_count == 0 {
            self.link(index);
        }
        Ok(())
    }

    /*
     * Release all pages that belong to a same file at the same
     * time. Dirty pages are written back. All pages must be
     * unpinned, otherwise nothing is released.
     */
    pub fn flush_pages(&mut self, file_id: u32) -> PageFileResult<()> {
        let indices: Vec<usize> = self
            .page_table
            .iter()
            .filter(|(key, _)| key.file_id == file_id)
            .map(|(_, &index)| index)
            .collect();

        if let Some(&index) = indices
            .iter()
            .find(|&&index| self.buffer_table[index].pin_count > 0)
        {
            let page_num = self.buffer_table[index].key.map_or(0, |k| k.page_num);
            return Err(PageFileError::PagePinned(page_num));
        }

        for index in indices {
            self.write_back(index)?;
            self.unlink(index);
            self.release_frame(index);
        }
        debug!("Flushed all pages of file {}", file_id);
        Ok(())
    }

    fn index_of(&self, key: PageKey) -> PageFileResult<usize> {
        self.page_table
            .get(&key)
            .copied()
            .ok_or(PageFileError::PageNotInBuf(key.page_num))
    }

    fn page_offset(page_num: u32) -> u64 {
        (PAGE_FILE_HEADER_SIZE + (page_num as usize) * PAGE_SIZE) as u64
    }

    fn read_page(fp: &File, page_num: u32, data: &mut [u8]) -> PageFileResult<()> {
        fp.read_exact_at(data, Self::page_offset(page_num))
            .map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => PageFileError::IncompleteRead(page_num),
                _ => PageFileError::Io(e),
            })
    }

    /*
     * Write a dirty page back to its file.
     */
    fn write_back(&mut self, index: usize) -> PageFileResult<()> {
        let page = &mut self.buffer_table[index];
        if !page.dirty {
            return Ok(());
        }
        if let (Some(key), Some(fp)) = (page.key, page.fp.as_ref()) {
            trace!("Writing page {:?} back to file", key);
            fp.write_all_at(&page.data.borrow(), Self::page_offset(key.page_num))?;
        }
        page.dirty = false;
        Ok(())
    }

    /*
     * Get a frame for a new page: a free one if there is any,
     * otherwise the least recently used unpinned page is replaced.
     * If all pages are pinned, the buffer is doubled.
     */
    fn take_frame(&mut self) -> PageFileResult<usize> {
        if self.free == -1 {
            if self.last == -1 {
                self.resize_buffer();
            } else {
                let victim = self.last as usize;
                debug!(
                    "No free frames, replace page {:?} at index={}",
                    self.buffer_table[victim].key, victim
                );
                self.write_back(victim)?;
                self.unlink(victim);
                self.release_frame(victim);
            }
        }
        let index = self.free as usize;
        self.free = self.buffer_table[index].next;
        let page = &mut self.buffer_table[index];
        page.next = -1;
        page.prev = -1;
        Ok(index)
    }

    fn install(&mut self, index: usize, key: PageKey, fp: &Rc<File>) {
        let page = &mut self.buffer_table[index];
        page.key = Some(key);
        page.fp = Some(Rc::clone(fp));
        page.pin_count = 1;
        page.dirty = false;
        self.page_table.insert(key, index);
        self.num_pages += 1;
    }

    //forget the page held by a frame and link the frame in the free list.
    fn release_frame(&mut self, index: usize) {
        if let Some(key) = self.buffer_table[index].key {
            self.page_table.remove(&key);
            self.num_pages -= 1;
        }
        let free = self.free;
        self.buffer_table[index].reset(free);
        self.free = index as i32;
    }

    fn resize_buffer(&mut self) {
        let cap = self.buffer_table.len();
        let new_cap = cap << 1;
        for i in cap..new_cap {
            let next = if i + 1 < new_cap { (i + 1) as i32 } else { -1 };
            self.buffer_table.push(BufferPage::new(next));
        }
        self.free = cap as i32;
        info!("Buffer pool new capacity: {}", new_cap);
    }

    fn pin(&mut self, index: usize) {
        if self.buffer_table[index].pin_count == 0 {
            self.unlink(index);
        }
        self.buffer_table[index].pin_count += 1;
    }

    /*
     * Unlink a page from the unused list.
     * A pinned page is in no list, so this is a no-op for it.
     */
    fn unlink(&mut self, index: usize) {
        let (prev, next) = {
            let page = &self.buffer_table[index];
            (page.prev, page.next)
        };
        if self.first != index as i32 && prev == -1 {
            return;
        }
        if prev == -1 {
            self.first = next;
        } else {
            self.buffer_table[prev as usize].next = next;
        }
        if next == -1 {
            self.last = prev;
        } else {
            self.buffer_table[next as usize].prev = prev;
        }
        let page = &mut self.buffer_table[index];
        page.prev = -1;
        page.next = -1;
    }

    //link a page at the head of the unused list.
    fn link(&mut self, index: usize) {
        let first = self.first;
        {
            let page = &mut self.buffer_table[index];
            page.next = first;
            page.prev = -1;
        }
        if first != -1 {
            self.buffer_table[first as usize].prev = index as i32;
        }
        self.first = index as i32;
        if self.last == -1 {
            self.last = index as i32;
        }
    }
}
