//! 值体（value body）编码
//!
//! - **body**    — 带 tag 的自定界值体与嵌套容器（Builder / Iter）
//! - **varint**  — uvarint 与 zig-zag 有符号整数
//! - **标量**    — 原始类型值体的编 / 解码
//!
//! 标量值体格式：
//! ```text
//! int*  / time / duration : zig-zag + uvarint
//! uint*                   : uvarint
//! float32 / float64       : 4 / 8 字节 LE
//! bool                    : 1 字节 (0 / 1)
//! bytes / string          : 原样
//! ```

pub mod body;

pub use body::{Builder, Iter};

use byteorder::{ByteOrder, LittleEndian};
use crate::common::{corrupt, Result};

/// u64 最多占 10 个 varint 字节
pub const MAX_VARINT_LEN: usize = 10;

// ── varint ────────────────────────────────────────────────────────────────────

pub fn append_uvarint(out: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        out.push((v as u8) | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

pub fn uvarint_len(mut v: u64) -> usize {
    let mut n = 1;
    while v >= 0x80 {
        v >>= 7;
        n += 1;
    }
    n
}

/// 返回 (值, 消耗字节数)
pub fn read_uvarint(buf: &[u8]) -> Result<(u64, usize)> {
    let mut v: u64 = 0;
    for (i, &b) in buf.iter().enumerate() {
        if i >= MAX_VARINT_LEN || (i == MAX_VARINT_LEN - 1 && b > 1) {
            return Err(corrupt("uvarint overflows 64 bits"));
        }
        v |= ((b & 0x7f) as u64) << (7 * i);
        if b < 0x80 {
            return Ok((v, i + 1));
        }
    }
    Err(corrupt("truncated uvarint"))
}

pub fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

pub fn unzigzag(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

// ── 标量值体 ──────────────────────────────────────────────────────────────────

pub fn encode_int(v: i64) -> Vec<u8> {
    encode_uint(zigzag(v))
}

pub fn decode_int(body: &[u8]) -> Result<i64> {
    decode_uint(body).map(unzigzag)
}

pub fn encode_uint(v: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(uvarint_len(v));
    append_uvarint(&mut out, v);
    out
}

pub fn decode_uint(body: &[u8]) -> Result<u64> {
    let (v, n) = read_uvarint(body)?;
    if n != body.len() {
        return Err(corrupt(format!("integer body has {} trailing bytes", body.len() - n)));
    }
    Ok(v)
}

pub fn encode_float64(v: f64) -> Vec<u8> {
    let mut out = [0u8; 8];
    LittleEndian::write_f64(&mut out, v);
    out.to_vec()
}

pub fn decode_float64(body: &[u8]) -> Result<f64> {
    if body.len() != 8 {
        return Err(corrupt(format!("float64 body must be 8 bytes, got {}", body.len())));
    }
    Ok(LittleEndian::read_f64(body))
}

pub fn encode_float32(v: f32) -> Vec<u8> {
    let mut out = [0u8; 4];
    LittleEndian::write_f32(&mut out, v);
    out.to_vec()
}

pub fn decode_float32(body: &[u8]) -> Result<f32> {
    if body.len() != 4 {
        return Err(corrupt(format!("float32 body must be 4 bytes, got {}", body.len())));
    }
    Ok(LittleEndian::read_f32(body))
}

pub fn encode_bool(v: bool) -> Vec<u8> {
    vec![v as u8]
}

pub fn decode_bool(body: &[u8]) -> Result<bool> {
    match body {
        [0] => Ok(false),
        [1] => Ok(true),
        _   => Err(corrupt("bool body must be a single 0/1 byte")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_keeps_small_magnitudes_small() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(unzigzag(zigzag(i64::MIN)), i64::MIN);
        assert_eq!(unzigzag(zigzag(i64::MAX)), i64::MAX);
    }

    #[test]
    fn uvarint_boundaries() {
        for v in [0u64, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            append_uvarint(&mut buf, v);
            assert_eq!(buf.len(), uvarint_len(v));
            assert_eq!(read_uvarint(&buf).unwrap(), (v, buf.len()));
        }
    }

    #[test]
    fn truncated_uvarint_is_corruption() {
        let err = read_uvarint(&[0x80, 0x80]).unwrap_err();
        assert!(matches!(err, crate::common::ColumnarError::Corruption(_)));
    }

    #[test]
    fn int_body_rejects_trailing_bytes() {
        let mut body = encode_int(-300);
        assert_eq!(decode_int(&body).unwrap(), -300);
        body.push(0);
        assert!(decode_int(&body).is_err());
    }

    #[test]
    fn float_and_bool_bodies() {
        assert_eq!(decode_float64(&encode_float64(1.5)).unwrap(), 1.5);
        assert_eq!(decode_float32(&encode_float32(-2.25)).unwrap(), -2.25);
        assert!(decode_bool(&encode_bool(true)).unwrap());
        assert!(decode_bool(&[2]).is_err());
    }
}
