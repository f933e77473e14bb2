//! 列写入器 / 读取器与类型分派工厂
//!
//! ```text
//!   Type ──new_writer──▶ ColumnWriter ──write/flush──▶ Spiller ──▶ SegmentSink
//!                             │
//!                          metadata()
//!                             ▼
//!   Metadata ──new_reader──▶ ColumnReader ──read──▶ Builder
//! ```
//!
//! 工厂是唯一的递归入口：复合列为每个子类型 / 子节点回调工厂。

pub mod int64;
pub mod presence;
pub mod scalar;
pub mod primitive;
pub mod record;
pub mod array;
pub mod map;
pub mod union;

use std::io::Write;

use crate::common::{mismatch, ColumnarError, Result};
use crate::encoding::Builder;
use crate::field_type::Type;
use crate::meta::Metadata;
use crate::segment::SegmentSink;
use crate::source::SourceHandle;

pub use array::{ArrayReader, ArrayWriter};
pub use int64::{Int64Reader, Int64Writer};
pub use map::{MapReader, MapWriter};
pub use presence::{PresenceReader, PresenceWriter};
pub use primitive::{PrimitiveReader, PrimitiveWriter};
pub use record::{RecordReader, RecordWriter};
pub use union::{UnionReader, UnionWriter};

/// 一列的写入端。每次 `write` 对应一个逻辑位置
pub trait ColumnWriter {
    /// `None` 表示 null
    fn write(&mut self, body: Option<&[u8]>) -> Result<()>;
    /// 写出缓冲字节；`eof` 为真时这是最后一次 flush
    fn flush(&mut self, eof: bool) -> Result<()>;
    /// 须在最终 flush 之后调用，否则缓冲中的字节不在 segmap 里
    fn metadata(&self) -> Metadata;
    /// 已写入的逻辑位置数
    fn count(&self) -> u64;
    /// 子树内尚未落盘的字节数
    fn buffered(&self) -> usize;
}

/// 一列的读取端。第 N 次 `read` 还原第 N 次 `write` 的值
pub trait ColumnReader: Send {
    fn read(&mut self, b: &mut Builder) -> Result<()>;
}

// ── 工厂 ──────────────────────────────────────────────────────────────────────

pub fn new_writer<W: Write + 'static>(
    typ:  &Type,
    sink: &SegmentSink<W>,
) -> Result<Box<dyn ColumnWriter>> {
    Ok(match typ {
        Type::Primitive(p)  => Box::new(PrimitiveWriter::new(*p, sink)),
        Type::Record(flds)  => Box::new(RecordWriter::new(flds, sink)?),
        Type::Array(elem)   => Box::new(ArrayWriter::new_array(elem, sink)?),
        Type::Set(elem)     => Box::new(ArrayWriter::new_set(elem, sink)?),
        Type::Map(k, v)     => Box::new(MapWriter::new(k, v, sink)?),
        Type::Union(alts)   => Box::new(UnionWriter::new(alts, sink)?),
    })
}

/// 仅凭 Metadata 重建 Reader（不校验逻辑类型）
pub fn new_reader(meta: &Metadata, src: &SourceHandle) -> Result<Box<dyn ColumnReader>> {
    Ok(match meta {
        Metadata::Primitive(m) => Box::new(PrimitiveReader::new(m, src)),
        Metadata::Record(m)    => Box::new(RecordReader::new(m, src)?),
        Metadata::Array(m)     => Box::new(ArrayReader::new(m, src)?),
        Metadata::Set(m)       => Box::new(ArrayReader::new(m, src)?),
        Metadata::Map(m)       => Box::new(MapReader::new(m, src)?),
        Metadata::Union(m)     => Box::new(UnionReader::new(m, src)?),
    })
}

/// 先用 `typ` 校验 Metadata，再重建 Reader
pub fn new_typed_reader(
    typ:  &Type,
    meta: &Metadata,
    src:  &SourceHandle,
) -> Result<Box<dyn ColumnReader>> {
    meta.check(typ)?;
    new_reader(meta, src)
}

// ── 辅助 ──────────────────────────────────────────────────────────────────────

/// 写入端遍历值体时的解析错误按类型不符上报
pub(crate) fn shape_err(e: ColumnarError) -> ColumnarError {
    match e {
        ColumnarError::Corruption(msg) => mismatch(msg),
        e => e,
    }
}

/// 一个位置已开始读取后，后续流耗尽说明数据不完整
pub(crate) fn mid_value<T>(r: Result<T>) -> Result<T> {
    match r {
        Err(ColumnarError::EndOfData) => Err(crate::common::corrupt("column stream ends mid-value")),
        r => r,
    }
}
