//! 全局基础类型与错误定义

use thiserror::Error;

// ── 错误 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ColumnarError {
    /// 值的形状与列类型不符（写入期或构造期）
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// Metadata 节点与调用方给出的逻辑类型不一致
    #[error("metadata mismatch: {0}")]
    MetadataMismatch(String),
    /// 解码出的 tag / 长度 / 编码越界
    #[error("corrupt column data: {0}")]
    Corruption(String),
    #[error("checksum mismatch in segment at offset {offset}")]
    ChecksumMismatch { offset: u64 },
    /// 流已读尽：调用方多读了一次，与数据损坏区分开
    #[error("end of column data")]
    EndOfData,
    #[error("segment I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ColumnarError {
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Self::EndOfData)
    }
}

pub type Result<T> = std::result::Result<T, ColumnarError>;

pub(crate) fn corrupt(msg: impl Into<String>) -> ColumnarError {
    ColumnarError::Corruption(msg.into())
}

pub(crate) fn mismatch(msg: impl Into<String>) -> ColumnarError {
    ColumnarError::TypeMismatch(msg.into())
}
