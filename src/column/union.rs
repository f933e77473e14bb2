//! union 列：每个备选类型一个子列 + tag 流 + presence
//!
//! null 只占 presence 中的一个位置，不写 tag，也不推进任何备选子列；
//! 非 null 值只推进被选中的那一个备选子列，各子列因此保持稠密。
//!
//! 读出的 union 值体是两元素容器：`[tag(int), 内层值]`。

use std::io::Write;

use crate::common::{corrupt, mismatch, Result};
use crate::encoding::{self, Builder};
use crate::field_type::Type;
use crate::meta::{Metadata, UnionMeta};
use crate::segment::SegmentSink;
use crate::source::SourceHandle;
use super::int64::{Int64Reader, Int64Writer};
use super::presence::{PresenceReader, PresenceWriter};
use super::{mid_value, new_reader, new_writer, shape_err, ColumnReader, ColumnWriter};

pub struct UnionWriter<W: Write> {
    typ:      Type,
    values:   Vec<Box<dyn ColumnWriter>>,
    tags:     Int64Writer<W>,
    presence: PresenceWriter<W>,
}

impl<W: Write + 'static> UnionWriter<W> {
    pub fn new(alts: &[Type], sink: &SegmentSink<W>) -> Result<Self> {
        if alts.is_empty() {
            return Err(mismatch("union type has no alternatives"));
        }
        let values = alts.iter()
            .map(|t| new_writer(t, sink))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            typ: Type::union(alts.to_vec()),
            values,
            tags:     Int64Writer::new(sink),
            presence: PresenceWriter::new(sink),
        })
    }
}

impl<W: Write> ColumnWriter for UnionWriter<W> {
    fn write(&mut self, body: Option<&[u8]>) -> Result<()> {
        let Some(body) = body else {
            return self.presence.touch_null();
        };
        let (tag, inner) = self.typ.untag(body).map_err(shape_err)?;
        self.presence.touch_value()?;
        self.tags.write(tag as i64)?;
        self.values[tag].write(inner)
    }

    fn flush(&mut self, eof: bool) -> Result<()> {
        self.presence.flush(eof)?;
        self.tags.flush(eof)?;
        for v in self.values.iter_mut() {
            v.flush(eof)?;
        }
        Ok(())
    }

    fn metadata(&self) -> Metadata {
        Metadata::Union(UnionMeta {
            presence: self.presence.segmap(),
            tags:     self.tags.segmap(),
            values:   self.values.iter().map(|v| v.metadata()).collect(),
        })
    }

    fn count(&self) -> u64 { self.presence.count() }

    fn buffered(&self) -> usize {
        self.presence.buffered() + self.tags.buffered()
            + self.values.iter().map(|v| v.buffered()).sum::<usize>()
    }
}

pub struct UnionReader {
    values:   Vec<Box<dyn ColumnReader>>,
    tags:     Int64Reader,
    presence: Option<PresenceReader>,
}

impl UnionReader {
    pub fn new(meta: &UnionMeta, src: &SourceHandle) -> Result<Self> {
        let values = meta.values.iter()
            .map(|m| new_reader(m, src))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            values,
            tags:     Int64Reader::new(&meta.tags, src),
            presence: PresenceReader::open(&meta.presence, src),
        })
    }
}

impl ColumnReader for UnionReader {
    fn read(&mut self, b: &mut Builder) -> Result<()> {
        let tag = match self.presence.as_mut() {
            Some(p) => {
                if !p.read()? {
                    b.append(None);
                    return Ok(());
                }
                mid_value(self.tags.read())?
            }
            None => self.tags.read()?,
        };
        if tag < 0 || tag as usize >= self.values.len() {
            return Err(corrupt(format!(
                "bad tag {tag} in union reader with {} alternatives", self.values.len())));
        }
        let tag_body = encoding::encode_int(tag);
        b.begin_container();
        b.append(Some(&tag_body[..]));
        mid_value(self.values[tag as usize].read(b))?;
        b.end_container()
    }
}
