/**********************************************
  > File Name		: errors.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Tue 02 Mar 2021 11:05:17 AM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Define some erros enum for global usage.
 *
 * Each component owns one error enum. Errors of a lower component
 * are wrapped by the upper one, so the record manager can hand an
 * I/O failure of the page file back to its caller untouched.
 */

use std::path::PathBuf;
use thiserror::Error;

use crate::record_management::rid::RID;

#[derive(Debug, Error)]
pub enum PageFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("page file {0:?} already exists")]
    FileExists(PathBuf),
    #[error("page file {0:?} does not exist")]
    FileNotFound(PathBuf),
    #[error("page file {0:?} is already open")]
    FileOpen(PathBuf),
    #[error("{0:?} is not a page file")]
    NotPageFile(PathBuf),
    #[error("invalid page number {0}")]
    InvalidPage(u32),
    #[error("page {0} is not in the buffer")]
    PageNotInBuf(u32), //the page to manipulate is not in buffer.
    #[error("page {0} is already unpinned")]
    PageUnpinned(u32),
    #[error("page {0} is still pinned")]
    PagePinned(u32),
    #[error("incomplete read of page {0}")]
    IncompleteRead(u32),
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    PageFile(#[from] PageFileError),
    #[error("record size must be positive")]
    InvalidRecordSize,
    #[error("record size {record_size} exceeds the page capacity {max}")]
    RecordSizeTooLarge { record_size: usize, max: usize },
    #[error("record of {actual} bytes, expected {expected}")]
    RecordSizeMismatch { expected: usize, actual: usize },
    #[error("record file header is corrupted")]
    InvalidFileHeader,
    #[error("record file handle is closed")]
    FileClosed,
    #[error("record file handle still has {0} open scan(s)")]
    ScanOpen(usize),
    #[error("file scan is closed")]
    ScanClosed,
    #[error("file scan belongs to another file handle")]
    ScanHandleMismatch,
    #[error("invalid page number {0}")]
    InvalidPageNumber(u32),
    #[error("invalid slot number {0}")]
    InvalidSlotNumber(u32),
    #[error("record {0:?} is deleted")]
    RecordDeleted(RID), //slot bit is free.
    #[error("invalid attribute: {0}")]
    InvalidAttr(String),
    #[error("attribute at offset {offset} with length {length} exceeds record size {record_size}")]
    AttrOutOfRecord { offset: usize, length: usize, record_size: usize },
    #[error("comparison value required by the operator is missing")]
    MissingCompValue,
    #[error("comparison value does not match the attribute type")]
    ValueTypeMismatch,
    #[error("free page list corrupted: {0}")]
    CorruptedFreeList(String),
}

pub type PageFileResult<T> = Result<T, PageFileError>;
pub type RecordResult<T> = Result<T, RecordError>;
