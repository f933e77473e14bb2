//! ColumnarReader：由 (Type, Metadata, 数据源) 重建 reader 树，顺序读出值

use std::sync::Arc;

use crate::column::{new_typed_reader, ColumnReader};
use crate::common::{ColumnarError, Result};
use crate::config::ReaderConfig;
use crate::encoding::Builder;
use crate::field_type::Type;
use crate::meta::Metadata;
use crate::source::{ReadAt, SourceHandle};
use crate::value::Value;

pub struct ColumnarReader {
    typ:     Type,
    root:    Box<dyn ColumnReader>,
    builder: Builder,
    read:    u64,
}

impl ColumnarReader {
    /// Metadata 与 `typ` 不符时报 `MetadataMismatch`
    pub fn new(typ: &Type, meta: &Metadata, source: Arc<dyn ReadAt>) -> Result<Self> {
        Self::with_config(typ, meta, source, ReaderConfig::default())
    }

    pub fn with_config(
        typ:    &Type,
        meta:   &Metadata,
        source: Arc<dyn ReadAt>,
        config: ReaderConfig,
    ) -> Result<Self> {
        let src  = SourceHandle::with_config(source, config);
        let root = new_typed_reader(typ, meta, &src)?;
        Ok(Self { typ: typ.clone(), root, builder: Builder::new(), read: 0 })
    }

    pub fn typ(&self) -> &Type { &self.typ }

    /// 把下一个值以 tagged 形式追加到 `b`；数据读尽时返回 `EndOfData`
    pub fn read(&mut self, b: &mut Builder) -> Result<()> {
        self.root.read(b)?;
        self.read += 1;
        Ok(())
    }

    /// 下一个值体（`None` 为 null）；数据读尽时返回 `EndOfData`
    pub fn read_body(&mut self) -> Result<Option<&[u8]>> {
        self.builder.reset();
        self.root.read(&mut self.builder)?;
        self.read += 1;
        self.builder.single()
    }

    /// 下一个值；数据读尽时返回 `Ok(None)`
    pub fn next_value(&mut self) -> Result<Option<Value>> {
        self.builder.reset();
        match self.root.read(&mut self.builder) {
            Ok(()) => self.read += 1,
            Err(ColumnarError::EndOfData) => return Ok(None),
            Err(e) => return Err(e),
        }
        Value::from_body(&self.typ, self.builder.single()?).map(Some)
    }

    /// 已读出的值个数
    pub fn position(&self) -> u64 { self.read }
}
