//! array / set 列：元素子列 + 长度流 + presence
//!
//! set 与 array 共用同一布局，区别只在 metadata 变体；set 的排序去重在构造
//! 值体时完成，列本身按给定顺序存储元素。

use std::io::Write;

use crate::common::{corrupt, Result};
use crate::encoding::{Builder, Iter};
use crate::field_type::Type;
use crate::meta::{ArrayMeta, Metadata};
use crate::segment::SegmentSink;
use crate::source::SourceHandle;
use super::int64::{Int64Reader, Int64Writer};
use super::presence::{PresenceReader, PresenceWriter};
use super::{mid_value, new_reader, new_writer, shape_err, ColumnReader, ColumnWriter};

pub struct ArrayWriter<W: Write> {
    set:      bool,
    values:   Box<dyn ColumnWriter>,
    lengths:  Int64Writer<W>,
    presence: PresenceWriter<W>,
}

impl<W: Write + 'static> ArrayWriter<W> {
    pub fn new_array(elem: &Type, sink: &SegmentSink<W>) -> Result<Self> {
        Self::new(false, elem, sink)
    }

    pub fn new_set(elem: &Type, sink: &SegmentSink<W>) -> Result<Self> {
        Self::new(true, elem, sink)
    }

    fn new(set: bool, elem: &Type, sink: &SegmentSink<W>) -> Result<Self> {
        Ok(Self {
            set,
            values:   new_writer(elem, sink)?,
            lengths:  Int64Writer::new(sink),
            presence: PresenceWriter::new(sink),
        })
    }
}

impl<W: Write> ColumnWriter for ArrayWriter<W> {
    fn write(&mut self, body: Option<&[u8]>) -> Result<()> {
        let Some(body) = body else {
            return self.presence.touch_null();
        };
        self.presence.touch_value()?;
        let mut len = 0i64;
        for elem in Iter::new(body) {
            self.values.write(elem.map_err(shape_err)?)?;
            len += 1;
        }
        self.lengths.write(len)
    }

    fn flush(&mut self, eof: bool) -> Result<()> {
        self.presence.flush(eof)?;
        self.lengths.flush(eof)?;
        self.values.flush(eof)
    }

    fn metadata(&self) -> Metadata {
        let m = ArrayMeta {
            presence: self.presence.segmap(),
            lengths:  self.lengths.segmap(),
            values:   Box::new(self.values.metadata()),
        };
        if self.set { Metadata::Set(m) } else { Metadata::Array(m) }
    }

    fn count(&self) -> u64 { self.presence.count() }

    fn buffered(&self) -> usize {
        self.presence.buffered() + self.lengths.buffered() + self.values.buffered()
    }
}

pub struct ArrayReader {
    values:   Box<dyn ColumnReader>,
    lengths:  Int64Reader,
    presence: Option<PresenceReader>,
}

impl ArrayReader {
    pub fn new(meta: &ArrayMeta, src: &SourceHandle) -> Result<Self> {
        Ok(Self {
            values:   new_reader(&meta.values, src)?,
            lengths:  Int64Reader::new(&meta.lengths, src),
            presence: PresenceReader::open(&meta.presence, src),
        })
    }
}

impl ColumnReader for ArrayReader {
    fn read(&mut self, b: &mut Builder) -> Result<()> {
        let len = match self.presence.as_mut() {
            Some(p) => {
                if !p.read()? {
                    b.append(None);
                    return Ok(());
                }
                mid_value(self.lengths.read())?
            }
            None => self.lengths.read()?,
        };
        if len < 0 {
            return Err(corrupt(format!("negative array length {len}")));
        }
        b.begin_container();
        for _ in 0..len {
            mid_value(self.values.read(b))?;
        }
        b.end_container()
    }
}
