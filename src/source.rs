//! 随机读数据源与按 Segmap 顺序读取的流游标

use std::io;
use std::sync::Arc;

use crate::common::{corrupt, ColumnarError, Result};
use crate::config::ReaderConfig;
use crate::encoding::{unzigzag, MAX_VARINT_LEN};
use crate::segment::Segment;

/// 「在偏移 O 处恰好读 N 字节」，须支持并发定位读
pub trait ReadAt: Send + Sync {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()>;
}

impl ReadAt for [u8] {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let start = usize::try_from(offset).ok().filter(|&s| s <= self.len());
        match start.and_then(|s| self.get(s..s + buf.len())) {
            Some(src) => {
                buf.copy_from_slice(src);
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read of {} bytes at offset {offset} past end of source", buf.len()),
            )),
        }
    }
}

impl ReadAt for Vec<u8> {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        self.as_slice().read_exact_at(buf, offset)
    }
}

#[cfg(unix)]
impl ReadAt for std::fs::File {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        std::os::unix::fs::FileExt::read_exact_at(self, buf, offset)
    }
}

#[cfg(windows)]
impl ReadAt for std::fs::File {
    fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            match self.seek_read(buf, offset) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => {
                    let rest = buf;
                    buf = &mut rest[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<T: ReadAt + ?Sized> ReadAt for Arc<T> {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        (**self).read_exact_at(buf, offset)
    }
}

// ── SourceHandle ──────────────────────────────────────────────────────────────

/// 数据源 + 读取配置，Reader 树的各节点共享
#[derive(Clone)]
pub struct SourceHandle {
    source: Arc<dyn ReadAt>,
    config: ReaderConfig,
}

impl SourceHandle {
    pub fn new(source: Arc<dyn ReadAt>) -> Self {
        Self::with_config(source, ReaderConfig::default())
    }

    pub fn with_config(source: Arc<dyn ReadAt>, config: ReaderConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &ReaderConfig { &self.config }

    pub fn stream(&self, segmap: &[Segment]) -> StreamReader {
        StreamReader {
            source:   Arc::clone(&self.source),
            segmap:   segmap.to_vec(),
            next_seg: 0,
            buf:      Vec::new(),
            pos:      0,
            verify:   self.config.verify_checksums,
        }
    }
}

// ── StreamReader ──────────────────────────────────────────────────────────────

/// 单条流的读游标：按需逐个加载 segment，只读到被触及的部分
pub struct StreamReader {
    source:   Arc<dyn ReadAt>,
    segmap:   Vec<Segment>,
    next_seg: usize,
    buf:      Vec<u8>,
    pos:      usize,
    verify:   bool,
}

impl StreamReader {
    /// 加载下一个 segment；已无 segment 时返回 false
    fn load_next(&mut self) -> Result<bool> {
        let Some(seg) = self.segmap.get(self.next_seg).copied() else {
            return Ok(false);
        };
        let len = usize::try_from(seg.length)
            .map_err(|_| corrupt(format!("segment length {} too large", seg.length)))?;
        self.buf.clear();
        // 长度来自 Metadata，先试探分配，失败视为损坏而不是中止进程
        self.buf
            .try_reserve_exact(len)
            .map_err(|_| corrupt(format!("segment length {} cannot be allocated", seg.length)))?;
        self.buf.resize(len, 0);
        self.source.read_exact_at(&mut self.buf, seg.offset)?;
        if let (true, Some(want)) = (self.verify, seg.checksum) {
            if crc32fast::hash(&self.buf) != want {
                return Err(ColumnarError::ChecksumMismatch { offset: seg.offset });
            }
        }
        log::trace!("loaded segment {} offset={} len={}", self.next_seg, seg.offset, seg.length);
        self.next_seg += 1;
        self.pos = 0;
        Ok(true)
    }

    /// 下一个字节；流已干净结束时返回 None
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        while self.pos >= self.buf.len() {
            if !self.load_next()? {
                return Ok(None);
            }
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }

    /// 流在值边界处结束 → EndOfData；值读到一半结束 → Corruption
    pub fn read_uvarint(&mut self) -> Result<u64> {
        let mut v: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let b = match self.read_byte()? {
                Some(b) => b,
                None if i == 0 => return Err(ColumnarError::EndOfData),
                None => return Err(corrupt("stream ends inside a uvarint")),
            };
            if i == MAX_VARINT_LEN - 1 && b > 1 {
                break;
            }
            v |= ((b & 0x7f) as u64) << (7 * i);
            if b < 0x80 {
                return Ok(v);
            }
        }
        Err(corrupt("uvarint overflows 64 bits"))
    }

    pub fn read_int(&mut self) -> Result<i64> {
        self.read_uvarint().map(unzigzag)
    }

    /// 追加恰好 `n` 字节到 `out`，可跨越 segment
    pub fn read_exact(&mut self, mut n: usize, out: &mut Vec<u8>) -> Result<()> {
        while n > 0 {
            if self.pos >= self.buf.len() && !self.load_next()? {
                return Err(corrupt(format!("stream ends {n} bytes short of a value")));
            }
            let take = n.min(self.buf.len() - self.pos);
            out.extend_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
            n -= take;
        }
        Ok(())
    }

    /// 已加载过的 segment 数
    pub fn segments_loaded(&self) -> usize { self.next_seg }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::append_uvarint;

    fn seg(offset: u64, data: &[u8]) -> Segment {
        Segment { offset, length: data.len() as u64, checksum: Some(crc32fast::hash(data)) }
    }

    #[test]
    fn values_may_straddle_segments() {
        let mut data = Vec::new();
        append_uvarint(&mut data, 300); // 两字节
        data.extend_from_slice(b"hello");
        let segs = vec![seg(0, &data[..1]), seg(1, &data[1..4]), seg(4, &data[4..])];
        let src = SourceHandle::new(Arc::new(data.clone()));
        let mut r = src.stream(&segs);
        assert_eq!(r.read_uvarint().unwrap(), 300);
        let mut out = Vec::new();
        r.read_exact(5, &mut out).unwrap();
        assert_eq!(out, b"hello");
        assert!(r.read_uvarint().unwrap_err().is_end_of_data());
    }

    #[test]
    fn segments_load_lazily() {
        let data = vec![1u8, 2, 3, 4];
        let segs = vec![seg(0, &data[..2]), seg(2, &data[2..])];
        let mut r = SourceHandle::new(Arc::new(data.clone())).stream(&segs);
        assert_eq!(r.segments_loaded(), 0);
        r.read_byte().unwrap();
        assert_eq!(r.segments_loaded(), 1);
    }

    #[test]
    fn cut_off_varint_is_corruption() {
        let data = vec![0x80u8];
        let mut r = SourceHandle::new(Arc::new(data.clone())).stream(&[seg(0, &data)]);
        assert!(matches!(r.read_uvarint().unwrap_err(), ColumnarError::Corruption(_)));
    }

    #[test]
    fn checksum_mismatch_is_detected() {
        let data = vec![5u8, 6];
        let mut bad = seg(0, &data);
        bad.checksum = Some(0xdead_beef);
        let src = SourceHandle::new(Arc::new(data.clone()));
        assert!(matches!(
            src.stream(&[bad]).read_byte().unwrap_err(),
            ColumnarError::ChecksumMismatch { offset: 0 }
        ));
        let lax = SourceHandle::with_config(
            Arc::new(data), ReaderConfig::default().with_verify_checksums(false));
        assert_eq!(lax.stream(&[bad]).read_byte().unwrap(), Some(5));
    }

    #[test]
    fn absurd_segment_length_is_corruption() {
        let data = vec![1u8, 2];
        let segs = vec![Segment { offset: 0, length: u64::MAX, checksum: None }];
        let mut r = SourceHandle::new(Arc::new(data)).stream(&segs);
        assert!(matches!(r.read_byte().unwrap_err(), ColumnarError::Corruption(_)));
    }

    #[test]
    fn short_source_surfaces_io_error() {
        let data = vec![1u8];
        let segs = vec![Segment { offset: 0, length: 4, checksum: None }];
        let mut r = SourceHandle::new(Arc::new(data)).stream(&segs);
        assert!(matches!(r.read_byte().unwrap_err(), ColumnarError::Io(_)));
    }
}
