//! map 列：键子列 + 值子列 + 条目数流 + presence
//!
//! map 值体是键值交替排列的容器，元素个数必须为偶数。

use std::io::Write;

use crate::common::{corrupt, mismatch, Result};
use crate::encoding::{Builder, Iter};
use crate::field_type::Type;
use crate::meta::{MapMeta, Metadata};
use crate::segment::SegmentSink;
use crate::source::SourceHandle;
use super::int64::{Int64Reader, Int64Writer};
use super::presence::{PresenceReader, PresenceWriter};
use super::{mid_value, new_reader, new_writer, shape_err, ColumnReader, ColumnWriter};

pub struct MapWriter<W: Write> {
    keys:     Box<dyn ColumnWriter>,
    values:   Box<dyn ColumnWriter>,
    lengths:  Int64Writer<W>,
    presence: PresenceWriter<W>,
}

impl<W: Write + 'static> MapWriter<W> {
    pub fn new(key: &Type, val: &Type, sink: &SegmentSink<W>) -> Result<Self> {
        Ok(Self {
            keys:     new_writer(key, sink)?,
            values:   new_writer(val, sink)?,
            lengths:  Int64Writer::new(sink),
            presence: PresenceWriter::new(sink),
        })
    }
}

impl<W: Write> ColumnWriter for MapWriter<W> {
    fn write(&mut self, body: Option<&[u8]>) -> Result<()> {
        let Some(body) = body else {
            return self.presence.touch_null();
        };
        let elems = Iter::new(body).collect::<Result<Vec<_>>>().map_err(shape_err)?;
        if elems.len() % 2 != 0 {
            return Err(mismatch(format!(
                "map value has {} elements, expected key/value pairs", elems.len())));
        }
        self.presence.touch_value()?;
        for pair in elems.chunks_exact(2) {
            self.keys.write(pair[0])?;
            self.values.write(pair[1])?;
        }
        self.lengths.write((elems.len() / 2) as i64)
    }

    fn flush(&mut self, eof: bool) -> Result<()> {
        self.presence.flush(eof)?;
        self.lengths.flush(eof)?;
        self.keys.flush(eof)?;
        self.values.flush(eof)
    }

    fn metadata(&self) -> Metadata {
        Metadata::Map(MapMeta {
            presence: self.presence.segmap(),
            lengths:  self.lengths.segmap(),
            keys:     Box::new(self.keys.metadata()),
            values:   Box::new(self.values.metadata()),
        })
    }

    fn count(&self) -> u64 { self.presence.count() }

    fn buffered(&self) -> usize {
        self.presence.buffered() + self.lengths.buffered()
            + self.keys.buffered() + self.values.buffered()
    }
}

pub struct MapReader {
    keys:     Box<dyn ColumnReader>,
    values:   Box<dyn ColumnReader>,
    lengths:  Int64Reader,
    presence: Option<PresenceReader>,
}

impl MapReader {
    pub fn new(meta: &MapMeta, src: &SourceHandle) -> Result<Self> {
        Ok(Self {
            keys:     new_reader(&meta.keys, src)?,
            values:   new_reader(&meta.values, src)?,
            lengths:  Int64Reader::new(&meta.lengths, src),
            presence: PresenceReader::open(&meta.presence, src),
        })
    }
}

impl ColumnReader for MapReader {
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
            return Err(corrupt(format!("negative map length {len}")));
        }
        b.begin_container();
        for _ in 0..len {
            mid_value(self.keys.read(b))?;
            mid_value(self.values.read(b))?;
        }
        b.end_container()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::testutil::roundtrip;
    use crate::common::ColumnarError;
    use crate::config::WriterConfig;
    use crate::encoding::body;
    use crate::field_type::{Field, PrimitiveType};
    use crate::value::Value;

    #[test]
    fn map_of_records_round_trips() {
        let typ = Type::map(
            PrimitiveType::String.into(),
            Type::record(vec![
                Field::new("x", PrimitiveType::Float64.into()),
                Field::new("ok", PrimitiveType::Bool.into()),
            ]),
        );
        let vals = vec![
            Value::Map(vec![
                (Value::string("a"), Value::Record(vec![Value::Float(1.5), Value::Bool(true)])),
                (Value::string("b"), Value::Null),
            ]),
            Value::Null,
            Value::Map(vec![]),
            Value::Map(vec![(Value::Null, Value::Record(vec![Value::Null, Value::Bool(false)]))]),
        ];
        roundtrip(&typ, &vals, 6);
    }

    #[test]
    fn odd_element_count_is_rejected_before_touching_streams() {
        let sink = SegmentSink::new(Vec::new(), WriterConfig::default());
        let typ = Type::map(PrimitiveType::String.into(), PrimitiveType::String.into());
        let mut w = new_writer(&typ, &sink).unwrap();
        let odd = body::container([Some(&b"k"[..])]);
        assert!(matches!(w.write(Some(&odd[..])).unwrap_err(), ColumnarError::TypeMismatch(_)));
        assert_eq!(w.count(), 0);
    }
}
