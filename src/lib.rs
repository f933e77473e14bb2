//! # columnar-vector
//!
//! 自描述、带类型的列式编码：把一串按类型编码的值体拆成若干列流写出，
//! 再凭 Metadata 树与原始字节按需重建、逐个还原。
//!
//! ## 整体架构
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       ColumnarWriter                          │
//! │   Type ──工厂──▶ ColumnWriter 树                               │
//! │     ├─ Primitive : Presence + 值流 (varint / 定长 / 长度前缀)   │
//! │     ├─ Record    : Presence + 每字段一个子列                    │
//! │     ├─ Array/Set : Presence + 长度流 + 元素子列                 │
//! │     ├─ Map       : Presence + 长度流 + 键子列 + 值子列           │
//! │     └─ Union     : Presence + tag 流 + 每备选一个子列            │
//! │                 │                                             │
//! │          Spiller × N（每条流一个有界缓冲）                      │
//! │                 ▼                                             │
//! │          SegmentSink（共享物理输出）──▶ Metadata 树             │
//! └──────────────────────────────────────────────────────────────┘
//!
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       ColumnarReader                          │
//! │   (Type, Metadata) ──校验 + 工厂──▶ ColumnReader 树            │
//! │   每条流一个 StreamReader，按需加载 segment（ReadAt 随机读）     │
//! │   read(Builder) ──▶ tagged 值体                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```

// ── 基础 ──────────────────────────────────────────────────────────────────────
pub mod common;
pub mod config;
pub mod field_type;
pub mod value;
pub mod encoding;

// ── 物理层 ────────────────────────────────────────────────────────────────────
pub mod segment;
pub mod source;
pub mod meta;

// ── 列 ────────────────────────────────────────────────────────────────────────
pub mod column;
pub mod writer;
pub mod reader;

pub use common::{ColumnarError, Result};
pub use config::{ReaderConfig, WriterConfig};
pub use encoding::Builder;
pub use field_type::{Field, Kind, PrimitiveType, Type};
pub use meta::Metadata;
pub use reader::ColumnarReader;
pub use segment::{Segment, Segmap};
pub use source::ReadAt;
pub use value::Value;
pub use writer::ColumnarWriter;
