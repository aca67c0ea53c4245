/**********************************************
  > File Name		: record_file_manager.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 12 Apr 2021 09:48:43 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

use std::path::Path;

use log::{debug, info, warn};

use super::record_file_handle::RecordFileHandle;
use super::record_page::{RecordFileHeader, RECORD_FILE_HEADER_SIZE};
use crate::errors::{RecordError, RecordResult};
use crate::page_management::page_file::{PageFileHandle, PageFileManager};

const HEADER_PAGE: u32 = 0;

/*
 * RecordFileManager is an encapsulation of PageFileManager, as records
 * module use page_file to store records.
 * When need to create a new records file, a page is first allocated to
 * store the record file header.
 */
#[derive(Debug)]
pub struct RecordFileManager {
    pfm: PageFileManager,
}

impl RecordFileManager {
    pub fn new(pfm: PageFileManager) -> Self {
        RecordFileManager { pfm }
    }

    pub fn get_page_file_manager(&self) -> &PageFileManager {
        &self.pfm
    }

    /*
     * Create a record file and write its header page. The layout
     * is computed first, so an invalid record size leaves no file
     * behind.
     */
    pub fn create_file<P: AsRef<Path>>(&mut self, file_name: P, record_size: usize) -> RecordResult<()> {
        let path = file_name.as_ref();
        let header = RecordFileHeader::new(record_size)?;
        self.pfm.create_file(path)?;

        let mut pfh = self.pfm.open_file(path)?;
        let written = Self::init_header_page(&mut pfh, &header);
        let closed = self.pfm.close_file(&mut pfh);
        written?;
        closed?;
        info!("Created record file {:?}, header={:?}", path, header);
        Ok(())
    }

    fn init_header_page(pfh: &mut PageFileHandle, header: &RecordFileHeader) -> RecordResult<()> {
        let ph = pfh.allocate_page()?;
        let page_num = ph.get_page_num();
        unpin_after!(pfh, page_num, true, {
            if page_num != HEADER_PAGE {
                Err(RecordError::InvalidFileHeader)
            } else {
                header.write_to(&mut ph.get_data_mut()[..RECORD_FILE_HEADER_SIZE]);
                Ok(())
            }
        })
    }

    pub fn destroy_file<P: AsRef<Path>>(&mut self, file_name: P) -> RecordResult<()> {
        self.pfm.destroy_file(file_name.as_ref())?;
        info!("Destroyed record file {:?}", file_name.as_ref());
        Ok(())
    }

    pub fn open_file<P: AsRef<Path>>(&mut self, file_name: P) -> RecordResult<RecordFileHandle> {
        let path = file_name.as_ref();
        let mut pfh = self.pfm.open_file(path)?;
        match Self::read_header(&pfh) {
            Ok(header) => {
                info!("Opened record file {:?}, header={:?}", path, header);
                Ok(RecordFileHandle::new(pfh, header))
            }
            Err(e) => {
                if let Err(close_err) = self.pfm.close_file(&mut pfh) {
                    warn!("Closing {:?} after a bad header failed: {}", path, close_err);
                }
                Err(e)
            }
        }
    }

    //data pages of the record file are all pages after the header page.
    fn read_header(pfh: &PageFileHandle) -> RecordResult<RecordFileHeader> {
        let ph = pfh.get_page(HEADER_PAGE)?;
        let header = unpin_after!(pfh, HEADER_PAGE, false, {
            RecordFileHeader::read_from(&ph.get_data())
        })?;
        if header.num_pages + 1 != pfh.num_pages() {
            debug!(
                "Header claims {} data pages, page file has {} pages",
                header.num_pages,
                pfh.num_pages()
            );
            return Err(RecordError::InvalidFileHeader);
        }
        Ok(header)
    }

    /*
     * Write the header back if it changed and close the page file.
     * A handle with open scans can not be closed. The handle is
     * invalid afterwards.
     */
    pub fn close_file(&mut self, fh: &mut RecordFileHandle) -> RecordResult<()> {
        let scans = fh.open_scans();
        if scans > 0 {
            return Err(RecordError::ScanOpen(scans));
        }
        let header = fh.get_header();
        let changed = fh.header_changed();
        let pfh = fh.get_page_file_handle()?;
        if changed {
            let ph = pfh.get_page(HEADER_PAGE)?;
            unpin_after!(pfh, HEADER_PAGE, true, {
                header.write_to(&mut ph.get_data_mut()[..RECORD_FILE_HEADER_SIZE]);
                Ok::<(), RecordError>(())
            })?;
            debug!("Wrote back header of {:?}: {:?}", pfh.get_path(), header);
        }
        self.pfm.close_file(pfh)?;
        info!("Closed record file {:?}", pfh.get_path());
        fh.invalidate();
        Ok(())
    }
}
