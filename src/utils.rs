/**********************************************
  > File Name		: utils.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Thu 11 Mar 2021 03:54:41 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Utils functions for global usage.
 *
 * Every header stored in a page is a sequence of little-endian
 * 4 bytes integers, and every bitmap is LSB-first: bit i lives in
 * byte i/8 at position i%8.
 */

//read an i32 at offset of a byte slice.
pub fn read_i32(buf: &[u8], offset: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    i32::from_le_bytes(bytes)
}

pub fn write_i32(buf: &mut [u8], offset: usize, value: i32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

//-1 on disk means no page.
pub fn read_page_link(buf: &[u8], offset: usize) -> Option<u32> {
    match read_i32(buf, offset) {
        v if v < 0 => None,
        v => Some(v as u32),
    }
}

pub fn write_page_link(buf: &mut [u8], offset: usize, link: Option<u32>) {
    write_i32(buf, offset, link.map_or(-1, |v| v as i32));
}

pub fn bitmap_size(num_bits: usize) -> usize {
    (num_bits + 7) / 8
}

pub fn get_bit(bitmap: &[u8], index: usize) -> bool {
    bitmap[index / 8] & (1u8 << (index % 8)) != 0
}

pub fn set_bit(bitmap: &mut [u8], index: usize) {
    bitmap[index / 8] |= 1u8 << (index % 8);
}

pub fn clear_bit(bitmap: &mut [u8], index: usize) {
    bitmap[index / 8] &= !(1u8 << (index % 8));
}

/*
 * Find the lowest set bit among the first num_bits bits.
 * Whole zero bytes are skipped first, so a full page costs
 * one comparison per 8 slots.
 */
pub fn first_set_bit(bitmap: &[u8], num_bits: usize) -> Option<usize> {
    for (i, byte) in bitmap.iter().enumerate() {
        if *byte == 0 {
            continue;
        }
        let index = i * 8 + byte.trailing_zeros() as usize;
        return if index < num_bits { Some(index) } else { None };
    }
    None
}
