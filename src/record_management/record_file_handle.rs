/**********************************************
  > File Name		: record_file_handle.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 12 Apr 2021 11:01:57 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * A RecordFileHandle gives access to the records of an open record
 * file.
 *
 * Pages with at least one free slot are linked by their next_free
 * field, the head of the list is first_free in the file header.
 * Insertion always takes the lowest free slot of the head page, so
 * finding a slot never scans the file. A page leaves the list when
 * it becomes full and goes back to the front when one of its records
 * is deleted.
 *
 * Every operation pins only the page it works on and unpins it
 * before returning.
 */

use std::cell::{Cell, Ref, RefMut};
use std::rc::Rc;

use log::{debug, error, trace, warn};

use super::predicate::Predicate;
use super::record_page::{RecordFileHeader, RecordPage};
use super::rid::{Record, RID};
use crate::errors::{RecordError, RecordResult};
use crate::page_management::page_file::PageFileHandle;

#[derive(Debug)]
pub struct RecordFileHandle {
    pfh: Option<PageFileHandle>, //None once the file is closed.
    header: RecordFileHeader,
    disk_header: RecordFileHeader, //what page 0 holds now.
    open_scans: Rc<Cell<usize>>,
}

impl RecordFileHandle {
    pub(super) fn new(pfh: PageFileHandle, header: RecordFileHeader) -> Self {
        RecordFileHandle {
            pfh: Some(pfh),
            header,
            disk_header: header,
            open_scans: Rc::new(Cell::new(0)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.pfh.is_some()
    }

    pub fn record_size(&self) -> usize {
        self.header.record_size
    }

    pub fn slots_per_page(&self) -> usize {
        self.header.num_records_per_page
    }

    //number of data pages, the header page not included.
    pub fn num_pages(&self) -> u32 {
        self.header.num_pages
    }

    pub fn first_free_page(&self) -> Option<u32> {
        self.header.first_free
    }

    pub(super) fn get_header(&self) -> RecordFileHeader {
        self.header
    }

    pub(super) fn header_changed(&self) -> bool {
        self.header != self.disk_header
    }

    pub(super) fn get_page_file_handle(&mut self) -> RecordResult<&mut PageFileHandle> {
        self.pfh.as_mut().ok_or(RecordError::FileClosed)
    }

    //called by the manager once the page file is closed.
    pub(super) fn invalidate(&mut self) {
        self.disk_header = self.header;
        self.pfh = None;
    }

    pub(super) fn scan_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.open_scans)
    }

    pub(super) fn owns_scan_counter(&self, counter: &Rc<Cell<usize>>) -> bool {
        Rc::ptr_eq(&self.open_scans, counter)
    }

    pub(super) fn open_scans(&self) -> usize {
        self.open_scans.get()
    }

    fn pfh(&self) -> RecordResult<&PageFileHandle> {
        self.pfh.as_ref().ok_or(RecordError::FileClosed)
    }

    /*
     * A RID is valid if it points at a data page of this file and
     * at a slot within the page.
     */
    fn check_rid(&self, rid: &RID) -> RecordResult<()> {
        self.pfh()?;
        let page_num = rid.get_page_num();
        if page_num == 0 || page_num > self.header.num_pages {
            return Err(RecordError::InvalidPageNumber(page_num));
        }
        if rid.get_slot_num() as usize >= self.header.num_records_per_page {
            return Err(RecordError::InvalidSlotNumber(rid.get_slot_num()));
        }
        Ok(())
    }

    fn check_record_size(&self, len: usize) -> RecordResult<()> {
        if len != self.header.record_size {
            return Err(RecordError::RecordSizeMismatch {
                expected: self.header.record_size,
                actual: len,
            });
        }
        Ok(())
    }

    fn read_page<T, F>(&self, page_num: u32, work: F) -> RecordResult<T>
    where
        F: for<'a> FnOnce(&RecordPage<Ref<'a, [u8]>>) -> RecordResult<T>,
    {
        let pfh = self.pfh()?;
        let ph = pfh.get_page(page_num)?;
        unpin_after!(pfh, page_num, false, {
            let page = RecordPage::new(ph.get_data(), &self.header);
            work(&page)
        })
    }

    /*
     * Pin a page for writing. The work gets the file header too as
     * it may relink the page in the free list.
     */
    fn write_page<T, F>(&mut self, page_num: u32, work: F) -> RecordResult<T>
    where
        F: for<'a> FnOnce(&mut RecordPage<RefMut<'a, [u8]>>, &mut RecordFileHeader) -> RecordResult<T>,
    {
        let pfh = self.pfh.as_ref().ok_or(RecordError::FileClosed)?;
        let header = &mut self.header;
        let ph = pfh.get_page(page_num)?;
        let res = {
            let mut page = RecordPage::new(ph.get_data_mut(), &*header);
            work(&mut page, header)
        };
        //works check before they modify, a failed one leaves the page clean.
        let dirty = res.is_ok();
        unpin_after!(pfh, page_num, dirty, res)
    }

    /*
     * The only place the free list changes.
     *
     * Called after the occupancy of a pinned page changed, was_full
     * tells whether the page was full (thus off the list) before.
     * A page that gained a free slot is pushed at the front, a page
     * that lost its last free slot is popped. Only the head page can
     * become full as insertion only uses the head.
     */
    fn relink_free_list<B>(
        page: &mut RecordPage<B>,
        page_num: u32,
        was_full: bool,
        header: &mut RecordFileHeader,
    ) -> RecordResult<()>
    where
        B: std::ops::DerefMut<Target = [u8]>,
    {
        let is_full = !page.has_free_slot();
        match (was_full, is_full) {
            (true, false) => {
                free_list_check!(
                    header.first_free != Some(page_num),
                    "full page {} is the head of the free list",
                    page_num
                );
                page.set_next_free(header.first_free);
                header.first_free = Some(page_num);
                debug!("Page {} pushed on the free list", page_num);
            }
            (false, true) => {
                free_list_check!(
                    header.first_free == Some(page_num),
                    "page {} became full but the head of the free list is {:?}",
                    page_num,
                    header.first_free
                );
                header.first_free = page.next_free();
                page.set_next_free(None);
                debug!(
                    "Page {} popped from the free list, new head {:?}",
                    page_num, header.first_free
                );
            }
            _ => {}
        }
        Ok(())
    }

    /*
     * Append a data page with every slot free and make it the head
     * of the free list.
     */
    fn allocate_record_page(&mut self) -> RecordResult<u32> {
        let pfh = self.pfh.as_mut().ok_or(RecordError::FileClosed)?;
        let header = &mut self.header;
        let ph = pfh.allocate_page()?;
        let page_num = ph.get_page_num();
        unpin_after!(pfh, page_num, true, {
            if page_num != header.num_pages + 1 {
                error!(
                    "Allocated page {} while the file has {} data pages",
                    page_num, header.num_pages
                );
                Err(RecordError::InvalidFileHeader)
            } else {
                let mut page = RecordPage::new(ph.get_data_mut(), &*header);
                page.init();
                header.num_pages += 1;
                debug!("Allocated record page {}", page_num);
                Self::relink_free_list(&mut page, page_num, true, header)
            }
        })?;
        Ok(page_num)
    }

    /*
     * Insert a record and returns its rid.
     * The record goes to the lowest free slot of the first free page,
     * a page is allocated when no page has a free slot.
     */
    pub fn insert_record(&mut self, data: &[u8]) -> RecordResult<RID> {
        self.pfh()?;
        self.check_record_size(data.len())?;
        let page_num = match self.header.first_free {
            Some(page_num) => page_num,
            None => self.allocate_record_page()?,
        };

        let rid = self.write_page(page_num, |page, header| {
            let slot = match page.first_free_slot() {
                Some(slot) => slot,
                None => {
                    let msg = format!("page {} is on the free list without a free slot", page_num);
                    error!("{}", msg);
                    return Err(RecordError::CorruptedFreeList(msg));
                }
            };
            page.set_occupied(slot)?;
            page.get_slot_mut(slot)?.copy_from_slice(data);
            Self::relink_free_list(page, page_num, false, header)?;
            Ok(RID::new(page_num, slot))
        })?;
        trace!("Inserted record {:?}", rid);
        Ok(rid)
    }

    pub fn delete_record(&mut self, rid: &RID) -> RecordResult<()> {
        self.check_rid(rid)?;
        let (page_num, slot) = (rid.get_page_num(), rid.get_slot_num());
        self.write_page(page_num, |page, header| {
            if page.is_free(slot)? {
                return Err(RecordError::RecordDeleted(*rid));
            }
            let was_full = !page.has_free_slot();
            page.get_slot_mut(slot)?.iter_mut().for_each(|b| *b = 0);
            page.set_free(slot)?;
            Self::relink_free_list(page, page_num, was_full, header)
        })?;
        trace!("Deleted record {:?}", rid);
        Ok(())
    }

    //overwrite a record in place, the rid is taken from the record.
    pub fn update_record(&mut self, rec: &Record) -> RecordResult<()> {
        let rid = rec.get_rid();
        self.check_rid(&rid)?;
        self.check_record_size(rec.get_data().len())?;
        self.write_page(rid.get_page_num(), |page, _| {
            if page.is_free(rid.get_slot_num())? {
                return Err(RecordError::RecordDeleted(rid));
            }
            page.get_slot_mut(rid.get_slot_num())?
                .copy_from_slice(rec.get_data());
            Ok(())
        })?;
        trace!("Updated record {:?}", rid);
        Ok(())
    }

    pub fn get_record(&self, rid: &RID) -> RecordResult<Record> {
        self.check_rid(rid)?;
        let slot = rid.get_slot_num();
        self.read_page(rid.get_page_num(), |page| {
            if page.is_free(slot)? {
                return Err(RecordError::RecordDeleted(*rid));
            }
            Ok(Record::new(*rid, page.get_slot(slot)?.to_vec()))
        })
    }

    /*
     * Find the first occupied slot at or after from whose record
     * satisfies the predicate. Slots are visited in page order, then
     * slot order.
     */
    pub(super) fn next_match(&self, from: RID, predicate: &Predicate) -> RecordResult<Option<Record>> {
        let slots_per_page = self.header.num_records_per_page as u32;
        let mut start_slot = from.get_slot_num();
        for page_num in from.get_page_num().max(1)..=self.header.num_pages {
            let found = self.read_page(page_num, |page| {
                for slot in start_slot..slots_per_page {
                    if page.is_free(slot)? {
                        continue;
                    }
                    let data = page.get_slot(slot)?;
                    if predicate.matches(data) {
                        return Ok(Some(Record::new(RID::new(page_num, slot), data.to_vec())));
                    }
                }
                Ok(None)
            })?;
            if found.is_some() {
                return Ok(found);
            }
            start_slot = 0;
        }
        Ok(None)
    }

    /*
     * Walk the free list and every data page and check that a page
     * is on the list iff it has a free slot, and that the list has
     * no cycle.
     */
    pub fn verify_free_list(&self) -> RecordResult<()> {
        let corrupted = |msg: String| {
            error!("{}", msg);
            RecordError::CorruptedFreeList(msg)
        };
        let num_pages = self.header.num_pages;
        let mut on_list = vec![false; num_pages as usize + 1];

        let mut next = self.header.first_free;
        while let Some(page_num) = next {
            if page_num == 0 || page_num > num_pages {
                return Err(corrupted(format!("page {} on the free list is out of range", page_num)));
            }
            if on_list[page_num as usize] {
                return Err(corrupted(format!("page {} is linked twice", page_num)));
            }
            on_list[page_num as usize] = true;
            next = self.read_page(page_num, |page| Ok((page.has_free_slot(), page.next_free())))
                .and_then(|(has_free, next)| {
                    if has_free {
                        Ok(next)
                    } else {
                        Err(corrupted(format!("full page {} is on the free list", page_num)))
                    }
                })?;
        }

        for page_num in 1..=num_pages {
            if on_list[page_num as usize] {
                continue;
            }
            let (has_free, next) =
                self.read_page(page_num, |page| Ok((page.has_free_slot(), page.next_free())))?;
            if has_free {
                return Err(corrupted(format!(
                    "page {} has a free slot but is not on the free list",
                    page_num
                )));
            }
            if next.is_some() {
                return Err(corrupted(format!("full page {} still links to {:?}", page_num, next)));
            }
        }
        Ok(())
    }
}

impl Drop for RecordFileHandle {
    fn drop(&mut self) {
        if self.is_open() {
            warn!(
                "Record file handle of {:?} dropped without being closed",
                self.pfh.as_ref().map(|pfh| pfh.get_path().to_path_buf())
            );
        }
    }
}
