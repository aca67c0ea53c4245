/**********************************************
  > File Name		: file_scan.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Sat 17 Apr 2021 04:12:36 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * A FileScan walks through the records of a file in (page, slot)
 * order and returns the ones satisfying its predicate.
 *
 * The scan does not borrow the file handle, the handle is passed to
 * every next_record call. So records can be deleted or updated
 * through the handle between two calls, the scan sees the current
 * content of the file. The handle refuses to close while a scan on
 * it is open.
 */

use std::cell::Cell;
use std::rc::Rc;

use log::trace;

use super::predicate::Predicate;
use super::record_file_handle::RecordFileHandle;
use super::rid::{Record, RID};
use crate::errors::{RecordError, RecordResult};

#[derive(Debug)]
pub struct FileScan {
    predicate: Predicate,
    cursor: RID, //next slot to look at.
    open_scans: Option<Rc<Cell<usize>>>, //None when closed.
    eof: bool,
}

impl FileScan {
    pub fn open(fh: &RecordFileHandle, predicate: Predicate) -> RecordResult<Self> {
        if !fh.is_open() {
            return Err(RecordError::FileClosed);
        }
        predicate.validate(fh.record_size())?;
        let counter = fh.scan_counter();
        counter.set(counter.get() + 1);
        trace!("Opened scan with {:?}", predicate);
        Ok(FileScan {
            predicate,
            cursor: RID::new(1, 0),
            open_scans: Some(counter),
            eof: false,
        })
    }

    pub fn is_open(&self) -> bool {
        self.open_scans.is_some()
    }

    /*
     * Ok(None) means the scan reached the end of the file, and so
     * will every later call.
     */
    pub fn next_record(&mut self, fh: &RecordFileHandle) -> RecordResult<Option<Record>> {
        let counter = self.open_scans.as_ref().ok_or(RecordError::ScanClosed)?;
        if !fh.owns_scan_counter(counter) {
            return Err(RecordError::ScanHandleMismatch);
        }
        if !fh.is_open() {
            return Err(RecordError::FileClosed);
        }
        if self.eof {
            return Ok(None);
        }

        match fh.next_match(self.cursor, &self.predicate)? {
            Some(rec) => {
                let rid = rec.get_rid();
                self.cursor = RID::new(rid.get_page_num(), rid.get_slot_num() + 1);
                trace!("Scan returns {:?}", rid);
                Ok(Some(rec))
            }
            None => {
                self.eof = true;
                Ok(None)
            }
        }
    }

    pub fn close(&mut self) -> RecordResult<()> {
        let counter = self.open_scans.take().ok_or(RecordError::ScanClosed)?;
        counter.set(counter.get().saturating_sub(1));
        trace!("Closed scan at {:?}", self.cursor);
        Ok(())
    }
}

//a scan dropped while open releases its handle.
impl Drop for FileScan {
    fn drop(&mut self) {
        if let Some(counter) = self.open_scans.take() {
            counter.set(counter.get().saturating_sub(1));
        }
    }
}
