//! 原始类型值流
//!
//! 值体本身按类型决定如何在流中定界：
//! - **Varint**        — 整数值体本身就是一个 uvarint，原样写入
//! - **Fixed(n)**      — 浮点 / bool，定长 n 字节
//! - **LengthPrefixed**— bytes / string，前缀 uvarint 长度

use std::io::Write;

use crate::common::{corrupt, mismatch, ColumnarError, Result};
use crate::encoding::{append_uvarint, read_uvarint, MAX_VARINT_LEN};
use crate::field_type::PrimitiveType;
use crate::segment::{SegmentSink, Segmap, Spiller};
use crate::source::{SourceHandle, StreamReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueLayout {
    Varint,
    Fixed(usize),
    LengthPrefixed,
}

impl From<PrimitiveType> for ValueLayout {
    fn from(p: PrimitiveType) -> Self {
        match p {
            PrimitiveType::Bool    => Self::Fixed(1),
            PrimitiveType::Float32 => Self::Fixed(4),
            PrimitiveType::Float64 => Self::Fixed(8),
            PrimitiveType::Bytes | PrimitiveType::String => Self::LengthPrefixed,
            _ => Self::Varint,
        }
    }
}

pub struct ScalarWriter<W: Write> {
    layout:  ValueLayout,
    spiller: Spiller<W>,
    scratch: Vec<u8>,
}

impl<W: Write> ScalarWriter<W> {
    pub fn new(layout: ValueLayout, sink: &SegmentSink<W>) -> Self {
        Self { layout, spiller: Spiller::new(sink), scratch: Vec::new() }
    }

    /// 写入一个非 null 值体；值体与布局不符时报类型错误
    pub fn write(&mut self, body: &[u8]) -> Result<()> {
        match self.layout {
            ValueLayout::Varint => {
                let (_, n) = read_uvarint(body)
                    .map_err(|_| mismatch("integer body is not a varint"))?;
                if n != body.len() {
                    return Err(mismatch("integer body has trailing bytes"));
                }
                self.spiller.write(body)
            }
            ValueLayout::Fixed(n) => {
                if body.len() != n {
                    return Err(mismatch(format!(
                        "fixed-width body must be {n} bytes, got {}", body.len())));
                }
                self.spiller.write(body)
            }
            ValueLayout::LengthPrefixed => {
                self.scratch.clear();
                append_uvarint(&mut self.scratch, body.len() as u64);
                self.spiller.write(&self.scratch)?;
                self.spiller.write(body)
            }
        }
    }

    pub fn flush(&mut self, eof: bool) -> Result<()> { self.spiller.flush(eof) }

    pub fn segmap(&self) -> Segmap { self.spiller.segmap() }

    pub fn buffered(&self) -> usize { self.spiller.buffered() }
}

pub struct ScalarReader {
    layout: ValueLayout,
    stream: StreamReader,
}

impl ScalarReader {
    pub fn new(layout: ValueLayout, segmap: &Segmap, src: &SourceHandle) -> Self {
        Self { layout, stream: src.stream(segmap) }
    }

    /// 读出下一个值体，覆盖 `out`
    pub fn read(&mut self, out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        match self.layout {
            // 原样拷贝 varint 字节，保证值体逐字节还原
            ValueLayout::Varint => {
                for i in 0..MAX_VARINT_LEN {
                    match self.stream.read_byte()? {
                        None if i == 0 => return Err(ColumnarError::EndOfData),
                        None => return Err(corrupt("stream ends inside an integer")),
                        Some(b) => {
                            out.push(b);
                            if b < 0x80 {
                                return Ok(());
                            }
                        }
                    }
                }
                return Err(corrupt("integer longer than 10 bytes"));
            }
            ValueLayout::Fixed(n) => {
                let first = self.stream.read_byte()?.ok_or(ColumnarError::EndOfData)?;
                out.push(first);
                self.stream.read_exact(n - 1, out)?;
            }
            ValueLayout::LengthPrefixed => {
                let len = self.stream.read_uvarint()?;
                let len = usize::try_from(len)
                    .map_err(|_| corrupt(format!("value length {len} too large")))?;
                self.stream.read_exact(len, out)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::WriterConfig;
    use crate::encoding;

    fn roundtrip(layout: ValueLayout, bodies: &[Vec<u8>], thresh: usize) {
        let sink = SegmentSink::new(Vec::new(), WriterConfig::default().with_segment_threshold(thresh));
        let mut w = ScalarWriter::new(layout, &sink);
        for b in bodies {
            w.write(b).unwrap();
        }
        w.flush(true).unwrap();
        let segmap = w.segmap();
        drop(w);

        let src = SourceHandle::new(Arc::new(sink.into_inner().unwrap()));
        let mut r = ScalarReader::new(layout, &segmap, &src);
        let mut out = Vec::new();
        for b in bodies {
            r.read(&mut out).unwrap();
            assert_eq!(&out, b);
        }
        assert!(r.read(&mut out).unwrap_err().is_end_of_data());
    }

    #[test]
    fn varint_bodies() {
        let bodies: Vec<_> = [0i64, -1, 1 << 40, i64::MIN].iter().map(|&v| encoding::encode_int(v)).collect();
        roundtrip(ValueLayout::Varint, &bodies, 3);
    }

    #[test]
    fn fixed_bodies() {
        let bodies: Vec<_> = [0.0, -1.5, f64::MAX].iter().map(|&v| encoding::encode_float64(v)).collect();
        roundtrip(ValueLayout::Fixed(8), &bodies, 5);
    }

    #[test]
    fn length_prefixed_bodies_including_empty() {
        let bodies = vec![b"".to_vec(), b"hello".to_vec(), vec![0u8; 300]];
        roundtrip(ValueLayout::LengthPrefixed, &bodies, 7);
    }

    #[test]
    fn malformed_bodies_are_type_mismatches() {
        let sink = SegmentSink::new(Vec::new(), WriterConfig::default());
        let mut w = ScalarWriter::new(ValueLayout::Fixed(8), &sink);
        assert!(matches!(w.write(&[1, 2]).unwrap_err(), ColumnarError::TypeMismatch(_)));
        let mut w = ScalarWriter::new(ValueLayout::Varint, &sink);
        assert!(matches!(w.write(&[0x80]).unwrap_err(), ColumnarError::TypeMismatch(_)));
    }
}
