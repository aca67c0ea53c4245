/**********************************************
  > File Name		: predicate.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 29 Mar 2021 10:46:17 AM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * A scan filters records with one comparison between an attribute
 * of the record and a constant value.
 *
 * The attribute is located by its offset in the record and its
 * length. INT and FLOAT attributes are 4 bytes little-endian,
 * STRING attributes are compared like strncmp: byte by byte, at most
 * attr_length bytes, and a NUL byte ends both strings.
 */

use std::cmp::Ordering;

use crate::errors::{RecordError, RecordResult};
use crate::utils;

pub const MAX_STRING_LEN: usize = 255;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttrType {
    INT,
    FLOAT,
    STRING,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompOp {
    NoOp,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompOp {
    fn accepts(&self, ord: Option<Ordering>) -> bool {
        match (self, ord) {
            (CompOp::NoOp, _) => true,
            //only NaN is unordered, it equals nothing.
            (CompOp::Ne, None) => true,
            (_, None) => false,
            (CompOp::Eq, Some(o)) => o == Ordering::Equal,
            (CompOp::Ne, Some(o)) => o != Ordering::Equal,
            (CompOp::Lt, Some(o)) => o == Ordering::Less,
            (CompOp::Gt, Some(o)) => o == Ordering::Greater,
            (CompOp::Le, Some(o)) => o != Ordering::Greater,
            (CompOp::Ge, Some(o)) => o != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Str(Vec<u8>),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::Str(s.as_bytes().to_vec())
    }

    fn attr_type(&self) -> AttrType {
        match self {
            Value::Int(_) => AttrType::INT,
            Value::Float(_) => AttrType::FLOAT,
            Value::Str(_) => AttrType::STRING,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    attr_type: AttrType,
    attr_length: usize,
    attr_offset: usize,
    op: CompOp,
    value: Option<Value>,
}

impl Predicate {
    pub fn new(
        attr_type: AttrType,
        attr_length: usize,
        attr_offset: usize,
        op: CompOp,
        value: Option<Value>,
    ) -> Self {
        Predicate {
            attr_type,
            attr_length,
            attr_offset,
            op,
            value,
        }
    }

    //matches every record.
    pub fn all() -> Self {
        Self::new(AttrType::INT, 4, 0, CompOp::NoOp, None)
    }

    pub fn get_op(&self) -> CompOp {
        self.op
    }

    fn check_attr_validity(attr_type: AttrType, attr_length: usize) -> bool {
        match attr_type {
            AttrType::INT | AttrType::FLOAT => attr_length == 4,
            AttrType::STRING => attr_length >= 1 && attr_length <= MAX_STRING_LEN,
        }
    }

    /*
     * Check the predicate against the record size of the file it
     * scans. NoOp ignores all the other fields.
     */
    pub fn validate(&self, record_size: usize) -> RecordResult<()> {
        if self.op == CompOp::NoOp {
            return Ok(());
        }
        if !Self::check_attr_validity(self.attr_type, self.attr_length) {
            return Err(RecordError::InvalidAttr(format!(
                "{:?} attribute of length {}",
                self.attr_type, self.attr_length
            )));
        }
        let end = self.attr_offset.checked_add(self.attr_length);
        if end.map_or(true, |end| end > record_size) {
            return Err(RecordError::AttrOutOfRecord {
                offset: self.attr_offset,
                length: self.attr_length,
                record_size,
            });
        }
        match &self.value {
            None => Err(RecordError::MissingCompValue),
            Some(v) if v.attr_type() != self.attr_type => Err(RecordError::ValueTypeMismatch),
            Some(_) => Ok(()),
        }
    }

    /*
     * Evaluate the predicate on the data of a record. An attribute
     * lying outside of the record never matches.
     */
    pub fn matches(&self, record: &[u8]) -> bool {
        let value = match (&self.op, &self.value) {
            (CompOp::NoOp, _) => return true,
            (_, None) => return false,
            (_, Some(v)) => v,
        };
        let attr = match self
            .attr_offset
            .checked_add(self.attr_length)
            .and_then(|end| record.get(self.attr_offset..end))
        {
            Some(attr) if attr.len() >= 4 || self.attr_type == AttrType::STRING => attr,
            _ => return false,
        };
        let ord = match value {
            Value::Int(v) => Some(utils::read_i32(attr, 0).cmp(v)),
            Value::Float(v) => f32::from_le_bytes([attr[0], attr[1], attr[2], attr[3]]).partial_cmp(v),
            Value::Str(v) => Some(Self::strncmp(attr, v, self.attr_length)),
        };
        self.op.accepts(ord)
    }

    //bytes past the end of the value read as NUL.
    fn strncmp(attr: &[u8], value: &[u8], len: usize) -> Ordering {
        for i in 0..len {
            let a = attr.get(i).copied().unwrap_or(0);
            let b = value.get(i).copied().unwrap_or(0);
            if a != b {
                return a.cmp(&b);
            }
            if a == 0 {
                break;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(s: &str, num: i32, r: f32) -> Vec<u8> {
        let mut rec = vec![0u8; 16];
        rec[..s.len()].copy_from_slice(s.as_bytes());
        rec[8..12].copy_from_slice(&num.to_le_bytes());
        rec[12..16].copy_from_slice(&r.to_le_bytes());
        rec
    }

    #[test]
    fn int_comparisons() {
        let rec = record("a5", 5, 5.0);
        let cases = [
            (CompOp::Eq, 5, true),
            (CompOp::Eq, 6, false),
            (CompOp::Ne, 6, true),
            (CompOp::Lt, 6, true),
            (CompOp::Lt, 5, false),
            (CompOp::Le, 5, true),
            (CompOp::Gt, 4, true),
            (CompOp::Gt, 5, false),
            (CompOp::Ge, 5, true),
            (CompOp::Ge, -1, true),
        ];
        for (op, v, expected) in cases.iter() {
            let pred = Predicate::new(AttrType::INT, 4, 8, *op, Some(Value::Int(*v)));
            pred.validate(16).unwrap();
            assert_eq!(pred.matches(&rec), *expected, "{:?} {}", op, v);
        }
    }

    #[test]
    fn float_comparisons_and_nan() {
        let rec = record("x", 0, 2.5);
        let lt = Predicate::new(AttrType::FLOAT, 4, 12, CompOp::Lt, Some(Value::Float(3.0)));
        assert!(lt.matches(&rec));
        let nan = record("x", 0, f32::NAN);
        assert!(!lt.matches(&nan));
        let ne = Predicate::new(AttrType::FLOAT, 4, 12, CompOp::Ne, Some(Value::Float(3.0)));
        assert!(ne.matches(&nan));
    }

    #[test]
    fn string_compares_like_strncmp() {
        let rec = record("a80", 80, 80.0);
        let eq = |s: &str, len: usize| {
            Predicate::new(AttrType::STRING, len, 0, CompOp::Eq, Some(Value::string(s))).matches(&rec)
        };
        //only the first attr_length bytes count.
        assert!(eq("a8", 2));
        assert!(!eq("a8", 3));
        assert!(eq("a80", 8));
        assert!(!eq("a800", 8));
        let lt = Predicate::new(AttrType::STRING, 3, 0, CompOp::Lt, Some(Value::string("a9")));
        assert!(lt.matches(&rec));
    }

    #[test]
    fn validation_errors() {
        let bad_len = Predicate::new(AttrType::INT, 2, 0, CompOp::Eq, Some(Value::Int(0)));
        assert!(matches!(bad_len.validate(16), Err(RecordError::InvalidAttr(_))));

        let too_long = Predicate::new(AttrType::STRING, 256, 0, CompOp::Eq, Some(Value::string("a")));
        assert!(matches!(too_long.validate(1024), Err(RecordError::InvalidAttr(_))));

        let outside = Predicate::new(AttrType::INT, 4, 14, CompOp::Eq, Some(Value::Int(0)));
        assert!(matches!(
            outside.validate(16),
            Err(RecordError::AttrOutOfRecord { offset: 14, length: 4, record_size: 16 })
        ));

        let missing = Predicate::new(AttrType::INT, 4, 0, CompOp::Lt, None);
        assert!(matches!(missing.validate(16), Err(RecordError::MissingCompValue)));

        let mismatch = Predicate::new(AttrType::INT, 4, 0, CompOp::Lt, Some(Value::Float(1.0)));
        assert!(matches!(mismatch.validate(16), Err(RecordError::ValueTypeMismatch)));

        let huge = Predicate::new(AttrType::INT, 4, usize::MAX - 1, CompOp::Eq, Some(Value::Int(0)));
        assert!(matches!(huge.validate(16), Err(RecordError::AttrOutOfRecord { .. })));
        assert!(!huge.matches(&record("a", 0, 0.0)));

        //a predicate never validated does not read past the record.
        let short = Predicate::new(AttrType::INT, 4, 14, CompOp::Ge, Some(Value::Int(0)));
        assert!(!short.matches(&record("a", 0, 0.0)));

        //NoOp does not look at the other fields.
        let no_op = Predicate::new(AttrType::STRING, 0, 100, CompOp::NoOp, None);
        assert!(no_op.validate(16).is_ok());
        assert!(no_op.matches(&record("", 0, 0.0)));
    }
}
