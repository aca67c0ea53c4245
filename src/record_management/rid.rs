/**********************************************
  > File Name		: rid.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 12 Apr 2021 11:01:57 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

use std::fmt;

/*
 * A record is identified by the page it is stored in and its slot
 * in that page. Page 0 is the header page of a record file, so no
 * RID points at it.
 */
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RID {
    page_num: u32,
    slot_num: u32, //slot_num represents the location of a record in a page.
}

impl RID {
    pub fn new(page_num: u32, slot_num: u32) -> Self {
        RID { page_num, slot_num }
    }

    pub fn get_page_num(&self) -> u32 {
        self.page_num
    }

    pub fn get_slot_num(&self) -> u32 {
        self.slot_num
    }
}

impl fmt::Debug for RID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RID({}, {})", self.page_num, self.slot_num)
    }
}

/*
 * A copy of a record read from a record file. Modify the data and
 * give it back to RecordFileHandle::update_record to write it in
 * place.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    rid: RID,
    data: Vec<u8>,
}

impl Record {
    pub fn new(rid: RID, data: Vec<u8>) -> Self {
        Record { rid, data }
    }

    pub fn get_rid(&self) -> RID {
        self.rid
    }

    pub fn get_data(&self) -> &[u8] {
        &self.data
    }

    pub fn get_data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
