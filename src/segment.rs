//! Segment 与 Spiller
//!
//! ```text
//! ┌─────────── SegmentSink（共享物理输出，记录写入偏移）──────────────┐
//! │ [col0 seg0][col1 seg0][col0 seg1][col2 seg0][col1 seg1] ...       │
//! └──────────────────────────────────────────────────────────────────┘
//!      ▲              ▲              ▲
//!   Spiller        Spiller        Spiller      每列一个缓冲区 + Segmap
//! ```
//!
//! 各列的 segment 在物理上可以交错，但同一列的 Segmap 始终保持写入顺序；
//! 依序拼接一列的全部 segment 即还原该列的字节流（值可以跨 segment）。
//!
//! 共享 sink 不做内部加锁：同一时刻只允许一个调用方 flush，由调用方保证。

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use crate::common::Result;
use crate::config::WriterConfig;

/// 一段连续字节区间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub offset:   u64,
    pub length:   u64,
    /// 写入时关闭校验则为 None
    pub checksum: Option<u32>,
}

impl Segment {
    pub fn end(&self) -> u64 { self.offset + self.length }
}

/// 一条流的 segment 列表（写入顺序）
pub type Segmap = Vec<Segment>;

// ── SegmentSink ───────────────────────────────────────────────────────────────

struct SinkInner<W> {
    writer: W,
    offset: u64,
}

/// 多列共享的物理输出句柄
pub struct SegmentSink<W: Write> {
    inner:  Rc<RefCell<SinkInner<W>>>,
    config: WriterConfig,
}

impl<W: Write> Clone for SegmentSink<W> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner), config: self.config }
    }
}

impl<W: Write> SegmentSink<W> {
    pub fn new(writer: W, config: WriterConfig) -> Self {
        Self::with_offset(writer, 0, config)
    }

    /// `writer` 已写过 `offset` 字节（例如文件头）时使用
    pub fn with_offset(writer: W, offset: u64, config: WriterConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SinkInner { writer, offset })),
            config,
        }
    }

    pub fn config(&self) -> &WriterConfig { &self.config }

    /// 下一个 segment 的起始偏移
    pub fn position(&self) -> u64 { self.inner.borrow().offset }

    /// 把 `data` 作为一个 segment 写出
    pub fn write_segment(&self, data: &[u8]) -> Result<Segment> {
        let mut inner = self.inner.borrow_mut();
        inner.writer.write_all(data)?;
        let seg = Segment {
            offset:   inner.offset,
            length:   data.len() as u64,
            checksum: self.config.checksums.then(|| crc32fast::hash(data)),
        };
        inner.offset += seg.length;
        Ok(seg)
    }

    pub fn flush(&self) -> Result<()> {
        self.inner.borrow_mut().writer.flush()?;
        Ok(())
    }

    /// 所有列句柄都已释放后取回底层 writer
    pub fn into_inner(self) -> Option<W> {
        Rc::try_unwrap(self.inner).ok().map(|cell| cell.into_inner().writer)
    }
}

// ── Spiller ───────────────────────────────────────────────────────────────────

/// 单列的有界缓冲：攒满 `segment_threshold` 字节即落一个 segment
pub struct Spiller<W: Write> {
    sink:   SegmentSink<W>,
    buf:    Vec<u8>,
    segmap: Segmap,
}

impl<W: Write> Spiller<W> {
    pub fn new(sink: &SegmentSink<W>) -> Self {
        Self { sink: sink.clone(), buf: Vec::new(), segmap: Vec::new() }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        let thresh = self.sink.config.segment_threshold;
        let mut start = 0;
        while self.buf.len() - start >= thresh {
            if let Err(e) = self.spill(start, start + thresh) {
                self.buf.drain(..start);
                return Err(e);
            }
            start += thresh;
        }
        // 已落盘的前缀一次性移除
        self.buf.drain(..start);
        Ok(())
    }

    fn spill(&mut self, start: usize, end: usize) -> Result<()> {
        let seg = self.sink.write_segment(&self.buf[start..end])?;
        log::trace!("spilled segment offset={} len={}", seg.offset, seg.length);
        self.segmap.push(seg);
        Ok(())
    }

    /// 写出缓冲中剩余的字节；`eof` 时这就是该流的最后一个 segment
    pub fn flush(&mut self, eof: bool) -> Result<()> {
        if !self.buf.is_empty() {
            self.spill(0, self.buf.len())?;
            self.buf.clear();
        }
        if eof {
            log::debug!(
                "stream finished: {} segments, {} bytes",
                self.segmap.len(),
                self.segmap.iter().map(|s| s.length).sum::<u64>(),
            );
        }
        Ok(())
    }

    pub fn segmap(&self) -> Segmap { self.segmap.clone() }

    pub fn buffered(&self) -> usize { self.buf.len() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(thresh: usize) -> SegmentSink<Vec<u8>> {
        SegmentSink::new(Vec::new(), WriterConfig::default().with_segment_threshold(thresh))
    }

    #[test]
    fn spills_exact_threshold_segments() {
        let sink = sink(4);
        let mut sp = Spiller::new(&sink);
        sp.write(b"abcdefghij").unwrap();
        assert_eq!(sp.segmap().len(), 2);
        assert_eq!(sp.buffered(), 2);
        sp.flush(true).unwrap();

        let segs = sp.segmap();
        assert_eq!(segs.iter().map(|s| s.length).collect::<Vec<_>>(), vec![4, 4, 2]);
        drop(sp);
        assert_eq!(sink.into_inner().unwrap(), b"abcdefghij".to_vec());
    }

    #[test]
    fn one_large_write_splits_into_many_segments() {
        let sink = sink(3);
        let mut sp = Spiller::new(&sink);
        let data: Vec<u8> = (0..=255u8).cycle().take(10_001).collect();
        sp.write(&data).unwrap();
        assert_eq!(sp.segmap().len(), 3333);
        assert_eq!(sp.buffered(), 2);
        sp.write(b"z").unwrap();
        assert_eq!(sp.buffered(), 0);
        sp.flush(true).unwrap();

        let segs = sp.segmap();
        assert!(segs.iter().all(|s| s.length == 3));
        assert!(segs.windows(2).all(|w| w[0].end() == w[1].offset));
        drop(sp);
        let mut want = data;
        want.push(b'z');
        assert_eq!(sink.into_inner().unwrap(), want);
    }

    #[test]
    fn final_flush_emits_undersized_tail() {
        let sink = sink(1024);
        let mut sp = Spiller::new(&sink);
        sp.write(b"xyz").unwrap();
        assert!(sp.segmap().is_empty());
        sp.flush(true).unwrap();
        assert_eq!(sp.segmap(), vec![Segment {
            offset: 0, length: 3, checksum: Some(crc32fast::hash(b"xyz")),
        }]);
    }

    #[test]
    fn interleaved_columns_keep_their_own_order() {
        let sink = sink(2);
        let mut a = Spiller::new(&sink);
        let mut b = Spiller::new(&sink);
        a.write(b"a1").unwrap();
        b.write(b"b1").unwrap();
        a.write(b"a2").unwrap();
        b.flush(true).unwrap();
        a.flush(true).unwrap();

        let offs: Vec<u64> = a.segmap().iter().map(|s| s.offset).collect();
        assert_eq!(offs, vec![0, 4]);
        assert_eq!(b.segmap()[0].offset, 2);
        drop((a, b));
        assert_eq!(sink.into_inner().unwrap(), b"a1b1a2".to_vec());
    }

    #[test]
    fn sink_stays_shared_while_columns_live() {
        let sink = sink(8);
        let sp = Spiller::new(&sink);
        assert!(sink.clone().into_inner().is_none());
        drop(sp);
        assert!(sink.into_inner().is_some());
    }

    #[test]
    fn checksums_can_be_disabled() {
        let sink = SegmentSink::new(
            Vec::new(),
            WriterConfig::default().with_segment_threshold(2).with_checksums(false),
        );
        let seg = sink.write_segment(b"zz").unwrap();
        assert_eq!(seg.checksum, None);
        assert_eq!(sink.position(), 2);
    }
}
