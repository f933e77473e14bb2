//! 原始类型列：presence + 值流

use std::io::Write;

use crate::common::Result;
use crate::encoding::Builder;
use crate::field_type::PrimitiveType;
use crate::meta::{Metadata, PrimitiveMeta};
use crate::segment::SegmentSink;
use crate::source::SourceHandle;
use super::presence::{PresenceReader, PresenceWriter};
use super::scalar::{ScalarReader, ScalarWriter, ValueLayout};
use super::{mid_value, ColumnReader, ColumnWriter};

pub struct PrimitiveWriter<W: Write> {
    typ:      PrimitiveType,
    presence: PresenceWriter<W>,
    values:   ScalarWriter<W>,
}

impl<W: Write> PrimitiveWriter<W> {
    pub fn new(typ: PrimitiveType, sink: &SegmentSink<W>) -> Self {
        Self {
            typ,
            presence: PresenceWriter::new(sink),
            values:   ScalarWriter::new(typ.into(), sink),
        }
    }
}

impl<W: Write> ColumnWriter for PrimitiveWriter<W> {
    fn write(&mut self, body: Option<&[u8]>) -> Result<()> {
        match body {
            None => self.presence.touch_null(),
            Some(b) => {
                self.values.write(b)?;
                self.presence.touch_value()
            }
        }
    }

    fn flush(&mut self, eof: bool) -> Result<()> {
        self.presence.flush(eof)?;
        self.values.flush(eof)
    }

    fn metadata(&self) -> Metadata {
        Metadata::Primitive(PrimitiveMeta {
            typ:      self.typ,
            presence: self.presence.segmap(),
            values:   self.values.segmap(),
        })
    }

    fn count(&self) -> u64 { self.presence.count() }

    fn buffered(&self) -> usize { self.presence.buffered() + self.values.buffered() }
}

pub struct PrimitiveReader {
    presence: Option<PresenceReader>,
    values:   ScalarReader,
    scratch:  Vec<u8>,
}

impl PrimitiveReader {
    pub fn new(meta: &PrimitiveMeta, src: &SourceHandle) -> Self {
        let layout: ValueLayout = meta.typ.into();
        Self {
            presence: PresenceReader::open(&meta.presence, src),
            values:   ScalarReader::new(layout, &meta.values, src),
            scratch:  Vec::new(),
        }
    }
}

impl ColumnReader for PrimitiveReader {
    fn read(&mut self, b: &mut Builder) -> Result<()> {
        let read = match self.presence.as_mut() {
            Some(p) => {
                if !p.read()? {
                    b.append(None);
                    return Ok(());
                }
                mid_value(self.values.read(&mut self.scratch))
            }
            None => self.values.read(&mut self.scratch),
        };
        read?;
        b.append(Some(&self.scratch[..]));
        Ok(())
    }
}
