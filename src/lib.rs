/**********************************************
  > File Name		: lib.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Tue 02 Mar 2021 10:28:51 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Arcturus stores fixed-length records in paged files.
 *
 * page_management: paged files and the buffer pool shared by them.
 * record_management: record files, record identifiers and scans.
 */

#[macro_use]
mod macros;

pub mod errors;
pub mod page_management;
pub mod record_management;
pub mod utils;
