//! 逻辑类型
//!
//! 类型集合是封闭的：原始标量 + record / array / set / map / union。
//! union 的 tag 即其备选类型的声明序号。

use serde::{Deserialize, Serialize};
use crate::common::{mismatch, Result};
use crate::encoding::{self, Iter};

/// 原始标量类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    Bool,
    Int8, Int16, Int32, Int64,
    Uint8, Uint16, Uint32, Uint64,
    Float32, Float64,
    Bytes,
    String,
    /// 纳秒时间戳，按 int64 存储
    Time,
    /// 纳秒时长，按 int64 存储
    Duration,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 15] = [
        Self::Bool,
        Self::Int8, Self::Int16, Self::Int32, Self::Int64,
        Self::Uint8, Self::Uint16, Self::Uint32, Self::Uint64,
        Self::Float32, Self::Float64,
        Self::Bytes, Self::String,
        Self::Time, Self::Duration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Bool     => "bool",
            Self::Int8     => "int8",
            Self::Int16    => "int16",
            Self::Int32    => "int32",
            Self::Int64    => "int64",
            Self::Uint8    => "uint8",
            Self::Uint16   => "uint16",
            Self::Uint32   => "uint32",
            Self::Uint64   => "uint64",
            Self::Float32  => "float32",
            Self::Float64  => "float64",
            Self::Bytes    => "bytes",
            Self::String   => "string",
            Self::Time     => "time",
            Self::Duration => "duration",
        }
    }

    /// 持久化用的稳定编号
    pub fn id(self) -> u8 {
        Self::ALL.iter().position(|&p| p == self).unwrap_or(0) as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn is_signed(self) -> bool {
        matches!(self,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::Time | Self::Duration)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64)
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 类型种类，与 Metadata 的变体一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Primitive,
    Record,
    Array,
    Set,
    Map,
    Union,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Primitive => "primitive",
            Self::Record    => "record",
            Self::Array     => "array",
            Self::Set       => "set",
            Self::Map       => "map",
            Self::Union     => "union",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub typ:  Type,
}

impl Field {
    pub fn new(name: &str, typ: Type) -> Self {
        Self { name: name.into(), typ }
    }
}

/// 逻辑类型（不可变，结构相等）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Primitive(PrimitiveType),
    Record(Vec<Field>),
    Array(Box<Type>),
    Set(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Union(Vec<Type>),
}

impl Type {
    pub fn record(fields: Vec<Field>) -> Self { Self::Record(fields) }
    pub fn array(elem: Type) -> Self { Self::Array(Box::new(elem)) }
    pub fn set(elem: Type) -> Self { Self::Set(Box::new(elem)) }
    pub fn map(key: Type, val: Type) -> Self { Self::Map(Box::new(key), Box::new(val)) }
    pub fn union(alts: Vec<Type>) -> Self { Self::Union(alts) }

    pub fn kind(&self) -> Kind {
        match self {
            Self::Primitive(_) => Kind::Primitive,
            Self::Record(_)    => Kind::Record,
            Self::Array(_)     => Kind::Array,
            Self::Set(_)       => Kind::Set,
            Self::Map(..)      => Kind::Map,
            Self::Union(_)     => Kind::Union,
        }
    }

    /// 将 union 值体拆为 (tag, 内层值体)
    ///
    /// union 值体是两元素容器：tag（int 编码）与内层值。
    pub fn untag<'a>(&self, body: &'a [u8]) -> Result<(usize, Option<&'a [u8]>)> {
        let Self::Union(alts) = self else {
            return Err(mismatch(format!("untag on non-union type {self}")));
        };
        let mut it  = Iter::new(body);
        let tag_body = it.next_value()?
            .ok_or_else(|| mismatch("union value has a null tag"))?;
        let tag = encoding::decode_int(tag_body)?;
        if tag < 0 || tag as usize >= alts.len() {
            return Err(mismatch(format!(
                "union tag {tag} out of range for {} alternatives", alts.len())));
        }
        let inner = it.next_value()?;
        if !it.done() {
            return Err(mismatch("union value has more than two elements"));
        }
        Ok((tag as usize, inner))
    }
}

impl From<PrimitiveType> for Type {
    fn from(p: PrimitiveType) -> Self { Self::Primitive(p) }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{p}"),
            Self::Record(fields) => {
                f.write_str("{")?;
                for (i, fld) in fields.iter().enumerate() {
                    if i > 0 { f.write_str(",")?; }
                    write!(f, "{}:{}", fld.name, fld.typ)?;
                }
                f.write_str("}")
            }
            Self::Array(t)  => write!(f, "[{t}]"),
            Self::Set(t)    => write!(f, "|[{t}]|"),
            Self::Map(k, v) => write!(f, "|{{{k}:{v}}}|"),
            Self::Union(alts) => {
                f.write_str("(")?;
                for (i, t) in alts.iter().enumerate() {
                    if i > 0 { f.write_str(",")?; }
                    write!(f, "{t}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::body;

    fn int_string() -> Type {
        Type::union(vec![PrimitiveType::Int64.into(), PrimitiveType::String.into()])
    }

    #[test]
    fn untag_splits_union_body() {
        let tag = encoding::encode_int(1);
        let val = body::container([Some(&tag[..]), Some(&b"hi"[..])]);
        assert_eq!(int_string().untag(&val).unwrap(), (1, Some(&b"hi"[..])));
    }

    #[test]
    fn untag_rejects_bad_tag() {
        let tag = encoding::encode_int(2);
        let val = body::container([Some(&tag[..]), Some(&b"hi"[..])]);
        assert!(matches!(
            int_string().untag(&val).unwrap_err(),
            crate::common::ColumnarError::TypeMismatch(_)
        ));
    }

    #[test]
    fn display_renders_nested_types() {
        let t = Type::record(vec![
            Field::new("a", PrimitiveType::Int64.into()),
            Field::new("b", Type::array(PrimitiveType::String.into())),
            Field::new("c", Type::map(PrimitiveType::String.into(), int_string())),
        ]);
        assert_eq!(t.to_string(), "{a:int64,b:[string],c:|{string:(int64,string)}|}");
    }

    #[test]
    fn primitive_ids_are_stable() {
        for p in PrimitiveType::ALL {
            assert_eq!(PrimitiveType::from_id(p.id()), Some(p));
        }
        assert_eq!(PrimitiveType::from_id(200), None);
    }
}
