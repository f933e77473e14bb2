//! Metadata 树：磁盘布局的权威描述
//!
//! 每个 Writer 产出一个节点，每个 Reader 由一个节点重建。节点只记录 segment
//! 区间与子节点，不记录逻辑类型本身；`check` 用于和调用方的类型做交叉校验。
//!
//! 二进制格式：
//! ```text
//! ┌────────────────────────────────────┐
//! │  MAGIC   (8 bytes) "COLVMETA"      │
//! │  VERSION (4 bytes) = 1             │
//! │  root node（递归）                  │
//! │  CRC32   (4 bytes) 覆盖以上全部     │
//! └────────────────────────────────────┘
//! node   := kind(u8) …各变体字段…
//! segmap := count(u32) { offset(u64) length(u64) has_crc(u8) crc(u32) }*
//! name   := len(u32) utf8
//! ```

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::common::{corrupt, ColumnarError, Result};
use crate::field_type::{Kind, PrimitiveType, Type};
use crate::segment::{Segment, Segmap};

const MAGIC: &[u8; 8] = b"COLVMETA";
const VERSION: u32     = 1;
/// 嵌套深度上限，防止损坏数据导致递归过深
const MAX_DEPTH: usize = 256;

// ── 节点定义 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveMeta {
    pub typ:      PrimitiveType,
    pub presence: Segmap,
    pub values:   Segmap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name:   String,
    pub values: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub presence: Segmap,
    pub fields:   Vec<FieldMeta>,
}

/// array 与 set 共用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayMeta {
    pub presence: Segmap,
    pub lengths:  Segmap,
    pub values:   Box<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapMeta {
    pub presence: Segmap,
    pub lengths:  Segmap,
    pub keys:     Box<Metadata>,
    pub values:   Box<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionMeta {
    pub presence: Segmap,
    pub tags:     Segmap,
    /// 按备选类型声明顺序
    pub values:   Vec<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Metadata {
    Primitive(PrimitiveMeta),
    Record(RecordMeta),
    Array(ArrayMeta),
    Set(ArrayMeta),
    Map(MapMeta),
    Union(UnionMeta),
}

impl Metadata {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Primitive(_) => Kind::Primitive,
            Self::Record(_)    => Kind::Record,
            Self::Array(_)     => Kind::Array,
            Self::Set(_)       => Kind::Set,
            Self::Map(_)       => Kind::Map,
            Self::Union(_)     => Kind::Union,
        }
    }

    pub fn presence(&self) -> &[Segment] {
        match self {
            Self::Primitive(m)           => &m.presence,
            Self::Record(m)              => &m.presence,
            Self::Array(m) | Self::Set(m) => &m.presence,
            Self::Map(m)                 => &m.presence,
            Self::Union(m)               => &m.presence,
        }
    }

    /// 与逻辑类型交叉校验：种类、union 备选数、record 字段、原始类型
    pub fn check(&self, typ: &Type) -> Result<()> {
        self.check_at(typ, "$")
    }

    fn check_at(&self, typ: &Type, path: &str) -> Result<()> {
        let fail = |msg: String| Err(ColumnarError::MetadataMismatch(format!("{path}: {msg}")));
        if self.kind() != typ.kind() {
            return fail(format!("metadata is {} but type {typ} is {}", self.kind(), typ.kind()));
        }
        match (self, typ) {
            (Self::Primitive(m), Type::Primitive(p)) => {
                if m.typ != *p {
                    return fail(format!("primitive column is {} but type is {p}", m.typ));
                }
                Ok(())
            }
            (Self::Record(m), Type::Record(fields)) => {
                if m.fields.len() != fields.len() {
                    return fail(format!(
                        "record has {} field columns but type has {}", m.fields.len(), fields.len()));
                }
                for (fm, fld) in m.fields.iter().zip(fields) {
                    if fm.name != fld.name {
                        return fail(format!("field {:?} stored where {:?} expected", fm.name, fld.name));
                    }
                    fm.values.check_at(&fld.typ, &format!("{path}.{}", fld.name))?;
                }
                Ok(())
            }
            (Self::Array(m), Type::Array(elem)) | (Self::Set(m), Type::Set(elem)) => {
                m.values.check_at(elem, &format!("{path}[]"))
            }
            (Self::Map(m), Type::Map(kt, vt)) => {
                m.keys.check_at(kt, &format!("{path}{{key}}"))?;
                m.values.check_at(vt, &format!("{path}{{value}}"))
            }
            (Self::Union(m), Type::Union(alts)) => {
                if m.values.len() != alts.len() {
                    return fail(format!(
                        "union has {} alternative columns but type has {}", m.values.len(), alts.len()));
                }
                for (i, (vm, alt)) in m.values.iter().zip(alts).enumerate() {
                    vm.check_at(alt, &format!("{path}<{i}>"))?;
                }
                Ok(())
            }
            _ => fail(format!("metadata {} does not match type {typ}", self.kind())),
        }
    }

    /// 树中全部 segment（先序、各流按声明顺序）
    pub fn segments(&self) -> Vec<Segment> {
        let mut out = Vec::new();
        self.collect_segments(&mut out);
        out
    }

    fn collect_segments(&self, out: &mut Vec<Segment>) {
        match self {
            Self::Primitive(m) => {
                out.extend(&m.presence);
                out.extend(&m.values);
            }
            Self::Record(m) => {
                out.extend(&m.presence);
                m.fields.iter().for_each(|f| f.values.collect_segments(out));
            }
            Self::Array(m) | Self::Set(m) => {
                out.extend(&m.presence);
                out.extend(&m.lengths);
                m.values.collect_segments(out);
            }
            Self::Map(m) => {
                out.extend(&m.presence);
                out.extend(&m.lengths);
                m.keys.collect_segments(out);
                m.values.collect_segments(out);
            }
            Self::Union(m) => {
                out.extend(&m.presence);
                out.extend(&m.tags);
                m.values.iter().for_each(|v| v.collect_segments(out));
            }
        }
    }

    /// 全部 segment 的字节总数
    pub fn data_size(&self) -> u64 {
        self.segments().iter().map(|s| s.length).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    // ── 二进制编解码 ──────────────────────────────────────────────────────────

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        encode_node(self, &mut out);
        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let n = data.len();
        if n < MAGIC.len() + 8 || &data[..MAGIC.len()] != MAGIC {
            return Err(corrupt("invalid metadata magic"));
        }
        let (body, crc) = data.split_at(n - 4);
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(crc);
        if crc32fast::hash(body) != u32::from_le_bytes(crc_bytes) {
            return Err(corrupt("metadata checksum mismatch"));
        }
        let mut cur = Cursor::new(&body[MAGIC.len()..]);
        let version = cur.read_u32::<LittleEndian>().map_err(truncated)?;
        if version != VERSION {
            return Err(corrupt(format!("unsupported metadata version {version}")));
        }
        let root = decode_node(&mut cur, 0)?;
        if cur.position() as usize != body.len() - MAGIC.len() {
            return Err(corrupt("trailing bytes after metadata tree"));
        }
        Ok(root)
    }
}

impl From<serde_json::Error> for ColumnarError {
    fn from(e: serde_json::Error) -> Self {
        corrupt(format!("metadata json: {e}"))
    }
}

fn kind_id(k: Kind) -> u8 {
    match k {
        Kind::Primitive => 0,
        Kind::Record    => 1,
        Kind::Array     => 2,
        Kind::Set       => 3,
        Kind::Map       => 4,
        Kind::Union     => 5,
    }
}

// Vec<u8> 的写入不会失败
fn encode_segmap(segs: &[Segment], out: &mut Vec<u8>) {
    let _ = out.write_u32::<LittleEndian>(segs.len() as u32);
    for s in segs {
        let _ = out.write_u64::<LittleEndian>(s.offset);
        let _ = out.write_u64::<LittleEndian>(s.length);
        let _ = out.write_u8(s.checksum.is_some() as u8);
        let _ = out.write_u32::<LittleEndian>(s.checksum.unwrap_or(0));
    }
}

fn encode_name(name: &str, out: &mut Vec<u8>) {
    let _ = out.write_u32::<LittleEndian>(name.len() as u32);
    out.extend_from_slice(name.as_bytes());
}

fn encode_node(m: &Metadata, out: &mut Vec<u8>) {
    out.push(kind_id(m.kind()));
    match m {
        Metadata::Primitive(p) => {
            out.push(p.typ.id());
            encode_segmap(&p.presence, out);
            encode_segmap(&p.values, out);
        }
        Metadata::Record(r) => {
            encode_segmap(&r.presence, out);
            let _ = out.write_u32::<LittleEndian>(r.fields.len() as u32);
            for f in &r.fields {
                encode_name(&f.name, out);
                encode_node(&f.values, out);
            }
        }
        Metadata::Array(a) | Metadata::Set(a) => {
            encode_segmap(&a.presence, out);
            encode_segmap(&a.lengths, out);
            encode_node(&a.values, out);
        }
        Metadata::Map(mm) => {
            encode_segmap(&mm.presence, out);
            encode_segmap(&mm.lengths, out);
            encode_node(&mm.keys, out);
            encode_node(&mm.values, out);
        }
        Metadata::Union(u) => {
            encode_segmap(&u.presence, out);
            encode_segmap(&u.tags, out);
            let _ = out.write_u32::<LittleEndian>(u.values.len() as u32);
            for v in &u.values {
                encode_node(v, out);
            }
        }
    }
}

fn truncated(_: std::io::Error) -> ColumnarError {
    corrupt("truncated metadata")
}

/// 读一个计数，并确认剩余字节至少容得下 `count * min_item` 字节
fn decode_count(cur: &mut Cursor<&[u8]>, min_item: usize) -> Result<usize> {
    let n = cur.read_u32::<LittleEndian>().map_err(truncated)? as usize;
    let left = cur.get_ref().len() - cur.position() as usize;
    if n.saturating_mul(min_item) > left {
        return Err(corrupt(format!("metadata count {n} exceeds remaining bytes")));
    }
    Ok(n)
}

fn decode_segmap(cur: &mut Cursor<&[u8]>) -> Result<Segmap> {
    let n = decode_count(cur, 21)?;
    let mut segs = Vec::with_capacity(n);
    for _ in 0..n {
        let offset  = cur.read_u64::<LittleEndian>().map_err(truncated)?;
        let length  = cur.read_u64::<LittleEndian>().map_err(truncated)?;
        let has_crc = cur.read_u8().map_err(truncated)?;
        let crc     = cur.read_u32::<LittleEndian>().map_err(truncated)?;
        segs.push(Segment { offset, length, checksum: (has_crc != 0).then_some(crc) });
    }
    Ok(segs)
}

fn decode_name(cur: &mut Cursor<&[u8]>) -> Result<String> {
    let n = decode_count(cur, 1)?;
    let mut buf = vec![0u8; n];
    cur.read_exact(&mut buf).map_err(truncated)?;
    String::from_utf8(buf).map_err(|_| corrupt("field name is not UTF-8"))
}

fn decode_node(cur: &mut Cursor<&[u8]>, depth: usize) -> Result<Metadata> {
    if depth > MAX_DEPTH {
        return Err(corrupt("metadata nested too deeply"));
    }
    let kind = cur.read_u8().map_err(truncated)?;
    Ok(match kind {
        0 => {
            let id  = cur.read_u8().map_err(truncated)?;
            let typ = PrimitiveType::from_id(id)
                .ok_or_else(|| corrupt(format!("unknown primitive type id {id}")))?;
            Metadata::Primitive(PrimitiveMeta {
                typ,
                presence: decode_segmap(cur)?,
                values:   decode_segmap(cur)?,
            })
        }
        1 => {
            let presence = decode_segmap(cur)?;
            let n = decode_count(cur, 5)?;
            let mut fields = Vec::with_capacity(n);
            for _ in 0..n {
                let name = decode_name(cur)?;
                fields.push(FieldMeta { name, values: decode_node(cur, depth + 1)? });
            }
            Metadata::Record(RecordMeta { presence, fields })
        }
        2 | 3 => {
            let a = ArrayMeta {
                presence: decode_segmap(cur)?,
                lengths:  decode_segmap(cur)?,
                values:   Box::new(decode_node(cur, depth + 1)?),
            };
            if kind == 2 { Metadata::Array(a) } else { Metadata::Set(a) }
        }
        4 => Metadata::Map(MapMeta {
            presence: decode_segmap(cur)?,
            lengths:  decode_segmap(cur)?,
            keys:     Box::new(decode_node(cur, depth + 1)?),
            values:   Box::new(decode_node(cur, depth + 1)?),
        }),
        5 => {
            let presence = decode_segmap(cur)?;
            let tags     = decode_segmap(cur)?;
            let n = decode_count(cur, 1)?;
            let mut values = Vec::with_capacity(n);
            for _ in 0..n {
                values.push(decode_node(cur, depth + 1)?);
            }
            Metadata::Union(UnionMeta { presence, tags, values })
        }
        k => return Err(corrupt(format!("unknown metadata kind {k}"))),
    })
}
