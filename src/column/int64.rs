//! int64 标量流（zig-zag varint），用于 tag / 长度 / presence 游程

use std::io::Write;

use crate::common::Result;
use crate::encoding::{append_uvarint, zigzag, MAX_VARINT_LEN};
use crate::segment::{SegmentSink, Segmap, Spiller};
use crate::source::{SourceHandle, StreamReader};

pub struct Int64Writer<W: Write> {
    spiller: Spiller<W>,
    scratch: Vec<u8>,
    count:   u64,
}

impl<W: Write> Int64Writer<W> {
    pub fn new(sink: &SegmentSink<W>) -> Self {
        Self {
            spiller: Spiller::new(sink),
            scratch: Vec::with_capacity(MAX_VARINT_LEN),
            count:   0,
        }
    }

    pub fn write(&mut self, v: i64) -> Result<()> {
        self.scratch.clear();
        append_uvarint(&mut self.scratch, zigzag(v));
        self.spiller.write(&self.scratch)?;
        self.count += 1;
        Ok(())
    }

    pub fn flush(&mut self, eof: bool) -> Result<()> {
        self.spiller.flush(eof)
    }

    pub fn segmap(&self) -> Segmap { self.spiller.segmap() }

    pub fn count(&self) -> u64 { self.count }

    pub fn buffered(&self) -> usize { self.spiller.buffered() }
}

pub struct Int64Reader {
    stream: StreamReader,
}

impl Int64Reader {
    pub fn new(segmap: &Segmap, src: &SourceHandle) -> Self {
        Self { stream: src.stream(segmap) }
    }

    pub fn read(&mut self) -> Result<i64> {
        self.stream.read_int()
    }

    pub fn segments_loaded(&self) -> usize { self.stream.segments_loaded() }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::WriterConfig;

    #[test]
    fn many_values_span_many_segments() {
        let sink = SegmentSink::new(Vec::new(), WriterConfig::default().with_segment_threshold(16));
        let mut w = Int64Writer::new(&sink);
        let vals: Vec<i64> = (-500..500).map(|i| i * 7919).collect();
        for &v in &vals {
            w.write(v).unwrap();
        }
        w.flush(true).unwrap();
        let segmap = w.segmap();
        assert!(segmap.len() > 1);
        let (last, full) = segmap.split_last().unwrap();
        assert!(full.iter().all(|s| s.length == 16));
        assert!(last.length <= 16);
        drop(w);

        let src = SourceHandle::new(Arc::new(sink.into_inner().unwrap()));
        let mut r = Int64Reader::new(&segmap, &src);
        for &v in &vals {
            assert_eq!(r.read().unwrap(), v);
        }
        assert!(r.read().unwrap_err().is_end_of_data());
    }

    #[test]
    fn partial_scan_touches_only_leading_segments() {
        let sink = SegmentSink::new(Vec::new(), WriterConfig::default().with_segment_threshold(4));
        let mut w = Int64Writer::new(&sink);
        for v in 0..40 {
            w.write(v).unwrap();
        }
        w.flush(true).unwrap();
        let segmap = w.segmap();
        drop(w);

        let src = SourceHandle::new(Arc::new(sink.into_inner().unwrap()));
        let mut r = Int64Reader::new(&segmap, &src);
        assert_eq!(r.read().unwrap(), 0);
        assert_eq!(r.segments_loaded(), 1);
        assert_eq!(segmap.len(), 10);
    }
}
