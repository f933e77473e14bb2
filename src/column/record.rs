//! record 列：每个字段一个子列 + presence
//!
//! record 的形状由类型决定，无需 tag 流；null record 不推进任何字段列。
//! 无字段的 record 没有子流，presence 流须始终落盘以标记数据末尾。

use std::io::Write;

use crate::common::{mismatch, ColumnarError, Result};
use crate::encoding::{Builder, Iter};
use crate::field_type::Field;
use crate::meta::{FieldMeta, Metadata, RecordMeta};
use crate::segment::SegmentSink;
use crate::source::SourceHandle;
use super::presence::{PresenceReader, PresenceWriter};
use super::{mid_value, new_reader, new_writer, shape_err, ColumnReader, ColumnWriter};

pub struct RecordWriter<W: Write> {
    fields:   Vec<(String, Box<dyn ColumnWriter>)>,
    presence: PresenceWriter<W>,
}

impl<W: Write + 'static> RecordWriter<W> {
    pub fn new(fields: &[Field], sink: &SegmentSink<W>) -> Result<Self> {
        let fields = fields.iter()
            .map(|f| Ok((f.name.clone(), new_writer(&f.typ, sink)?)))
            .collect::<Result<Vec<_>>>()?;
        let presence = if fields.is_empty() {
            PresenceWriter::persistent(sink)
        } else {
            PresenceWriter::new(sink)
        };
        Ok(Self { fields, presence })
    }
}

impl<W: Write> ColumnWriter for RecordWriter<W> {
    fn write(&mut self, body: Option<&[u8]>) -> Result<()> {
        let Some(body) = body else {
            return self.presence.touch_null();
        };
        self.presence.touch_value()?;
        let mut it = Iter::new(body);
        for (_, col) in self.fields.iter_mut() {
            col.write(it.next_value().map_err(shape_err)?)?;
        }
        if !it.done() {
            return Err(mismatch(format!(
                "record value has more than {} fields", self.fields.len())));
        }
        Ok(())
    }

    fn flush(&mut self, eof: bool) -> Result<()> {
        self.presence.flush(eof)?;
        for (_, col) in self.fields.iter_mut() {
            col.flush(eof)?;
        }
        Ok(())
    }

    fn metadata(&self) -> Metadata {
        Metadata::Record(RecordMeta {
            presence: self.presence.segmap(),
            fields:   self.fields.iter()
                .map(|(name, col)| FieldMeta { name: name.clone(), values: col.metadata() })
                .collect(),
        })
    }

    fn count(&self) -> u64 { self.presence.count() }

    fn buffered(&self) -> usize {
        self.presence.buffered() + self.fields.iter().map(|(_, c)| c.buffered()).sum::<usize>()
    }
}

pub struct RecordReader {
    fields:   Vec<Box<dyn ColumnReader>>,
    presence: Option<PresenceReader>,
}

impl RecordReader {
    pub fn new(meta: &RecordMeta, src: &SourceHandle) -> Result<Self> {
        let fields = meta.fields.iter()
            .map(|f| new_reader(&f.values, src))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fields, presence: PresenceReader::open(&meta.presence, src) })
    }
}

impl ColumnReader for RecordReader {
    fn read(&mut self, b: &mut Builder) -> Result<()> {
        if self.presence.is_none() && self.fields.is_empty() {
            return Err(ColumnarError::EndOfData);
        }
        // 每个子列都有自己的流，第一次读取成功即说明本位置已开始
        let mut started = false;
        if let Some(p) = self.presence.as_mut() {
            if !p.read()? {
                b.append(None);
                return Ok(());
            }
            started = true;
        }
        b.begin_container();
        for col in self.fields.iter_mut() {
            let r = col.read(b);
            if started { mid_value(r)? } else { r? }
            started = true;
        }
        b.end_container()
    }
}
