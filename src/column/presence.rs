//! Presence：逐位置记录「有值 / null」
//!
//! 游程编码，交替记录「有值」与「null」的连续长度，首个游程总是「有值」
//! （可以为 0）。游程只在状态切换时写出，因此一列若从未出现 null，
//! presence 流就不产生任何字节，segmap 为空，读端据此视整列为有值。
//!
//! 例外：没有其它流的列（无字段的 record）用 `persistent` 构造，终结 flush
//! 时总是写出最后一个游程，读端靠 presence 流的耗尽判断数据读尽。

use std::io::Write;

use crate::common::{corrupt, Result};
use crate::segment::{SegmentSink, Segmap};
use crate::source::SourceHandle;
use super::int64::{Int64Reader, Int64Writer};

pub struct PresenceWriter<W: Write> {
    runs:     Int64Writer<W>,
    /// 当前游程长度
    run:      i64,
    /// 当前游程是否为 null
    null:     bool,
    /// 是否出现过 null
    nulls:    bool,
    /// 没有 null 也在终结 flush 时写出游程
    persist:  bool,
    count:    u64,
    finished: bool,
}

impl<W: Write> PresenceWriter<W> {
    pub fn new(sink: &SegmentSink<W>) -> Self {
        Self {
            runs: Int64Writer::new(sink),
            run: 0, null: false, nulls: false, persist: false,
            count: 0, finished: false,
        }
    }

    /// 即使从未出现 null，也保证 presence 流非空
    pub fn persistent(sink: &SegmentSink<W>) -> Self {
        Self { persist: true, ..Self::new(sink) }
    }

    pub fn touch_value(&mut self) -> Result<()> {
        if self.null {
            self.runs.write(self.run)?;
            self.run  = 0;
            self.null = false;
        }
        self.run   += 1;
        self.count += 1;
        Ok(())
    }

    pub fn touch_null(&mut self) -> Result<()> {
        if !self.null {
            self.runs.write(self.run)?;
            self.run  = 0;
            self.null = true;
        }
        self.nulls  = true;
        self.run   += 1;
        self.count += 1;
        Ok(())
    }

    pub fn flush(&mut self, eof: bool) -> Result<()> {
        if eof && (self.nulls || self.persist) && !self.finished {
            self.runs.write(self.run)?;
            self.run = 0;
        }
        self.finished |= eof;
        self.runs.flush(eof)
    }

    /// 从未出现 null 时为空（`persistent` 除外）
    pub fn segmap(&self) -> Segmap { self.runs.segmap() }

    pub fn count(&self) -> u64 { self.count }

    pub fn buffered(&self) -> usize { self.runs.buffered() }
}

pub struct PresenceReader {
    runs:    Int64Reader,
    /// 当前游程剩余位置数
    left:    i64,
    present: bool,
    started: bool,
}

impl PresenceReader {
    pub fn new(segmap: &Segmap, src: &SourceHandle) -> Self {
        Self { runs: Int64Reader::new(segmap, src), left: 0, present: true, started: false }
    }

    /// segmap 非空时才构造读取器；空 segmap 表示整列有值
    pub fn open(segmap: &Segmap, src: &SourceHandle) -> Option<Self> {
        (!segmap.is_empty()).then(|| Self::new(segmap, src))
    }

    /// 下一个位置是否有值
    pub fn read(&mut self) -> Result<bool> {
        while self.left == 0 {
            let run = self.runs.read()?;
            if run < 0 {
                return Err(corrupt(format!("negative presence run {run}")));
            }
            self.present = !self.started || !self.present;
            self.started = true;
            self.left    = run;
        }
        self.left -= 1;
        Ok(self.present)
    }
}
