/**********************************************
  > File Name		: record_page.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Wed 10 Mar 2021 09:22:10 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Every record file represents a table, every table has a same record
 * size.
 *
 * Header page (page 0) layout, all fields are little-endian i32:
 *   record_size | num_records_per_page | bitmap_size | first_free | num_pages
 *
 * Data page layout:
 *   next_free(4) | bitmap(bitmap_size) | records(num_records_per_page * record_size)
 *
 * In a page, all slots are managed by a bitmap. A set bit means the
 * slot is free. The size of the bitmap is calculated by the record
 * size.
 */

use std::ops::{Deref, DerefMut};

use crate::errors::{RecordError, RecordResult};
use crate::page_management::page_file::PAGE_DATA_SIZE;
use crate::utils;

pub const NEXT_FREE_SIZE: usize = 4;
pub const RECORD_FILE_HEADER_SIZE: usize = 20;

/*
 * The file descriptor. Read from the header page when the file is
 * opened and written back when it is closed.
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RecordFileHeader {
    pub record_size: usize,
    pub num_records_per_page: usize,
    pub bitmap_size: usize,
    pub first_free: Option<u32>, //first page with at least one free slot.
    pub num_pages: u32,          //number of data pages, the header page not included.
}

impl RecordFileHeader {
    pub fn new(record_size: usize) -> RecordResult<Self> {
        if record_size == 0 {
            return Err(RecordError::InvalidRecordSize);
        }
        let num_records_per_page = Self::calc_num_records_per_page(record_size);
        if num_records_per_page == 0 {
            return Err(RecordError::RecordSizeTooLarge {
                record_size,
                max: Self::max_record_size(),
            });
        }
        Ok(RecordFileHeader {
            record_size,
            num_records_per_page,
            bitmap_size: utils::bitmap_size(num_records_per_page),
            first_free: None,
            num_pages: 0,
        })
    }

    //a page must hold at least one record and its bit.
    pub fn max_record_size() -> usize {
        PAGE_DATA_SIZE - NEXT_FREE_SIZE - 1
    }

    /*
     * Every record costs record_size bytes plus one bit, the bitmap
     * is rounded up to whole bytes, so the first guess may be one
     * record too many.
     */
    pub fn calc_num_records_per_page(record_size: usize) -> usize {
        let space = PAGE_DATA_SIZE - NEXT_FREE_SIZE;
        let mut n = 8 * space / (8 * record_size + 1);
        while n > 0 && utils::bitmap_size(n) + n * record_size > space {
            n -= 1;
        }
        n
    }

    pub fn bitmap_offset(&self) -> usize {
        NEXT_FREE_SIZE
    }

    pub fn records_offset(&self) -> usize {
        NEXT_FREE_SIZE + self.bitmap_size
    }

    pub fn write_to(&self, buf: &mut [u8]) {
        utils::write_i32(buf, 0, self.record_size as i32);
        utils::write_i32(buf, 4, self.num_records_per_page as i32);
        utils::write_i32(buf, 8, self.bitmap_size as i32);
        utils::write_page_link(buf, 12, self.first_free);
        utils::write_i32(buf, 16, self.num_pages as i32);
    }

    /*
     * The layout is recomputed from the record size and must agree
     * with what was stored.
     */
    pub fn read_from(buf: &[u8]) -> RecordResult<Self> {
        let record_size = utils::read_i32(buf, 0);
        let num_pages = utils::read_i32(buf, 16);
        if record_size <= 0 || num_pages < 0 {
            return Err(RecordError::InvalidFileHeader);
        }
        let mut header = Self::new(record_size as usize)?;
        if header.num_records_per_page as i32 != utils::read_i32(buf, 4)
            || header.bitmap_size as i32 != utils::read_i32(buf, 8)
        {
            return Err(RecordError::InvalidFileHeader);
        }
        header.first_free = utils::read_page_link(buf, 12);
        header.num_pages = num_pages as u32;
        Ok(header)
    }
}

/*
 * Typed view over the data of a record page. B is the borrowed page
 * data, read-only views only need Deref.
 */
pub struct RecordPage<B> {
    data: B,
    header: RecordFileHeader,
}

impl<B: Deref<Target = [u8]>> RecordPage<B> {
    pub fn new(data: B, header: &RecordFileHeader) -> Self {
        RecordPage {
            data,
            header: *header,
        }
    }

    pub fn next_free(&self) -> Option<u32> {
        utils::read_page_link(&self.data, 0)
    }

    fn bitmap(&self) -> &[u8] {
        let offset = self.header.bitmap_offset();
        &self.data[offset..offset + self.header.bitmap_size]
    }

    fn check_slot(&self, slot: u32) -> RecordResult<usize> {
        let slot = slot as usize;
        if slot >= self.header.num_records_per_page {
            return Err(RecordError::InvalidSlotNumber(slot as u32));
        }
        Ok(slot)
    }

    fn slot_offset(&self, slot: usize) -> usize {
        self.header.records_offset() + slot * self.header.record_size
    }

    pub fn is_free(&self, slot: u32) -> RecordResult<bool> {
        let slot = self.check_slot(slot)?;
        Ok(utils::get_bit(self.bitmap(), slot))
    }

    pub fn first_free_slot(&self) -> Option<u32> {
        utils::first_set_bit(self.bitmap(), self.header.num_records_per_page).map(|v| v as u32)
    }

    pub fn has_free_slot(&self) -> bool {
        self.first_free_slot().is_some()
    }

    pub fn num_records(&self) -> usize {
        (0..self.header.num_records_per_page)
            .filter(|&slot| !utils::get_bit(self.bitmap(), slot))
            .count()
    }

    pub fn get_slot(&self, slot: u32) -> RecordResult<&[u8]> {
        let offset = self.slot_offset(self.check_slot(slot)?);
        Ok(&self.data[offset..offset + self.header.record_size])
    }
}

impl<B: DerefMut<Target = [u8]>> RecordPage<B> {
    /*
     * Reset a freshly allocated page: not linked, every slot free.
     * Padding bits of the last bitmap byte stay 0.
     */
    pub fn init(&mut self) {
        self.set_next_free(None);
        let offset = self.header.bitmap_offset();
        let size = self.header.bitmap_size;
        let bitmap = &mut self.data[offset..offset + size];
        bitmap.iter_mut().for_each(|b| *b = 0);
        for slot in 0..self.header.num_records_per_page {
            utils::set_bit(bitmap, slot);
        }
    }

    pub fn set_next_free(&mut self, next_free: Option<u32>) {
        utils::write_page_link(&mut self.data, 0, next_free);
    }

    fn bitmap_mut(&mut self) -> &mut [u8] {
        let offset = self.header.bitmap_offset();
        let size = self.header.bitmap_size;
        &mut self.data[offset..offset + size]
    }

    pub fn set_free(&mut self, slot: u32) -> RecordResult<()> {
        let slot = self.check_slot(slot)?;
        utils::set_bit(self.bitmap_mut(), slot);
        Ok(())
    }

    pub fn set_occupied(&mut self, slot: u32) -> RecordResult<()> {
        let slot = self.check_slot(slot)?;
        utils::clear_bit(self.bitmap_mut(), slot);
        Ok(())
    }

    pub fn get_slot_mut(&mut self, slot: u32) -> RecordResult<&mut [u8]> {
        let offset = self.slot_offset(self.check_slot(slot)?);
        let record_size = self.header.record_size;
        Ok(&mut self.data[offset..offset + record_size])
    }
}
