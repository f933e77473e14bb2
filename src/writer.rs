//! ColumnarWriter：一个逻辑类型、一棵 writer 树、一个物理输出
//!
//! 调用方逐个写入值体；各列缓冲总量超过 `memory_threshold` 时，对整棵树做一次
//! 非终结 flush。`finish` 做终结 flush 并交回底层 writer 与 Metadata。

use std::io::{self, Write};

use crate::column::{new_writer, ColumnWriter};
use crate::common::{ColumnarError, Result};
use crate::config::WriterConfig;
use crate::field_type::Type;
use crate::meta::Metadata;
use crate::segment::SegmentSink;
use crate::value::Value;

pub struct ColumnarWriter<W: Write> {
    typ:    Type,
    sink:   SegmentSink<W>,
    root:   Box<dyn ColumnWriter>,
    spills: u64,
}

impl<W: Write + 'static> ColumnarWriter<W> {
    pub fn new(typ: Type, writer: W, config: WriterConfig) -> Result<Self> {
        let sink = SegmentSink::new(writer, config);
        let root = new_writer(&typ, &sink)?;
        Ok(Self { typ, sink, root, spills: 0 })
    }

    /// 写入一个值体，`None` 为 null
    pub fn write(&mut self, body: Option<&[u8]>) -> Result<()> {
        self.root.write(body)?;
        self.maybe_spill()
    }

    /// 按本 writer 的类型编码后写入
    pub fn write_value(&mut self, val: &Value) -> Result<()> {
        let body = val.to_body(&self.typ)?;
        self.write(body.as_deref())
    }

    fn maybe_spill(&mut self) -> Result<()> {
        let buffered = self.root.buffered();
        if buffered > self.sink.config().memory_threshold {
            log::debug!(
                "buffered {} bytes over memory threshold {}, spilling at position {}",
                buffered, self.sink.config().memory_threshold, self.root.count());
            self.root.flush(false)?;
            self.spills += 1;
        }
        Ok(())
    }

    pub fn typ(&self) -> &Type { &self.typ }

    /// 已写入的值个数
    pub fn count(&self) -> u64 { self.root.count() }

    /// 尚在内存中的字节数
    pub fn buffered(&self) -> usize { self.root.buffered() }

    /// 因内存上限触发的非终结 flush 次数
    pub fn spills(&self) -> u64 { self.spills }

    /// 终结 flush，返回底层 writer 与描述全部数据的 Metadata
    pub fn finish(self) -> Result<(W, Metadata)> {
        let Self { sink, mut root, .. } = self;
        root.flush(true)?;
        let meta = root.metadata();
        let count = root.count();
        drop(root);
        sink.flush()?;
        log::debug!(
            "finished {} values, {} segments, {} data bytes",
            count, meta.segments().len(), meta.data_size());
        let writer = sink.into_inner().ok_or_else(|| ColumnarError::Io(io::Error::new(
            io::ErrorKind::Other, "segment sink still shared after finish")))?;
        Ok((writer, meta))
    }
}
