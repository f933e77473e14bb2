//! 值（运行时表示）与值体之间的转换

use crate::common::{mismatch, Result};
use crate::encoding::{self, body, Iter};
use crate::field_type::{PrimitiveType, Type};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// int* / time / duration
    Int(i64),
    Uint(u64),
    /// float32 / float64
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    Record(Vec<Value>),
    Array(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    /// (tag, 内层值)
    Union(usize, Box<Value>),
}

impl Value {
    pub fn string(s: &str) -> Self { Self::String(s.into()) }

    pub fn union(tag: usize, inner: Value) -> Self { Self::Union(tag, Box::new(inner)) }

    pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

    /// 按 `typ` 编码为值体；`Null` 编码为 `None`
    pub fn to_body(&self, typ: &Type) -> Result<Option<Vec<u8>>> {
        if self.is_null() {
            return Ok(None);
        }
        let out = match typ {
            Type::Primitive(p) => encode_primitive(*p, self)?,
            Type::Record(fields) => {
                let Self::Record(vals) = self else { return Err(shape(typ, self)) };
                if vals.len() != fields.len() {
                    return Err(mismatch(format!(
                        "record {typ} has {} fields, value has {}", fields.len(), vals.len())));
                }
                let mut out = Vec::new();
                for (fld, v) in fields.iter().zip(vals) {
                    body::append(&mut out, v.to_body(&fld.typ)?.as_deref());
                }
                out
            }
            Type::Array(elem) => {
                let Self::Array(vals) = self else { return Err(shape(typ, self)) };
                let mut out = Vec::new();
                for v in vals {
                    body::append(&mut out, v.to_body(elem)?.as_deref());
                }
                out
            }
            Type::Set(elem) => {
                let Self::Set(vals) = self else { return Err(shape(typ, self)) };
                // set 元素按 tagged 字节排序并去重
                let mut elems = Vec::with_capacity(vals.len());
                for v in vals {
                    let mut tagged = Vec::new();
                    body::append(&mut tagged, v.to_body(elem)?.as_deref());
                    elems.push(tagged);
                }
                elems.sort();
                elems.dedup();
                elems.concat()
            }
            Type::Map(kt, vt) => {
                let Self::Map(entries) = self else { return Err(shape(typ, self)) };
                let mut out = Vec::new();
                for (k, v) in entries {
                    body::append(&mut out, k.to_body(kt)?.as_deref());
                    body::append(&mut out, v.to_body(vt)?.as_deref());
                }
                out
            }
            Type::Union(alts) => {
                let Self::Union(tag, inner) = self else { return Err(shape(typ, self)) };
                let alt = alts.get(*tag).ok_or_else(|| mismatch(format!(
                    "union tag {tag} out of range for {typ}")))?;
                let tag_body = encoding::encode_int(*tag as i64);
                let mut out = Vec::new();
                body::append(&mut out, Some(&tag_body[..]));
                body::append(&mut out, inner.to_body(alt)?.as_deref());
                out
            }
        };
        Ok(Some(out))
    }

    /// 按 `typ` 从值体解码
    pub fn from_body(typ: &Type, val: Option<&[u8]>) -> Result<Self> {
        let Some(b) = val else { return Ok(Self::Null) };
        Ok(match typ {
            Type::Primitive(p) => decode_primitive(*p, b)?,
            Type::Record(fields) => {
                let mut it   = Iter::new(b);
                let mut vals = Vec::with_capacity(fields.len());
                for fld in fields {
                    vals.push(Self::from_body(&fld.typ, it.next_value()?)?);
                }
                if !it.done() {
                    return Err(mismatch(format!("record value has extra fields for {typ}")));
                }
                Self::Record(vals)
            }
            Type::Array(elem) => Self::Array(decode_elems(elem, b)?),
            Type::Set(elem)   => Self::Set(decode_elems(elem, b)?),
            Type::Map(kt, vt) => {
                let mut it      = Iter::new(b);
                let mut entries = Vec::new();
                while !it.done() {
                    let k = Self::from_body(kt, it.next_value()?)?;
                    let v = Self::from_body(vt, it.next_value()?)?;
                    entries.push((k, v));
                }
                Self::Map(entries)
            }
            Type::Union(alts) => {
                let (tag, inner) = typ.untag(b)?;
                Self::union(tag, Self::from_body(&alts[tag], inner)?)
            }
        })
    }
}

fn shape(typ: &Type, v: &Value) -> crate::common::ColumnarError {
    mismatch(format!("value {v} does not fit type {typ}"))
}

fn decode_elems(elem: &Type, b: &[u8]) -> Result<Vec<Value>> {
    Iter::new(b)
        .map(|v| v.and_then(|v| Value::from_body(elem, v)))
        .collect()
}

fn int_range(p: PrimitiveType) -> (i64, i64) {
    match p {
        PrimitiveType::Int8  => (i8::MIN as i64, i8::MAX as i64),
        PrimitiveType::Int16 => (i16::MIN as i64, i16::MAX as i64),
        PrimitiveType::Int32 => (i32::MIN as i64, i32::MAX as i64),
        _                    => (i64::MIN, i64::MAX),
    }
}

fn uint_max(p: PrimitiveType) -> u64 {
    match p {
        PrimitiveType::Uint8  => u8::MAX as u64,
        PrimitiveType::Uint16 => u16::MAX as u64,
        PrimitiveType::Uint32 => u32::MAX as u64,
        _                     => u64::MAX,
    }
}

fn encode_primitive(p: PrimitiveType, v: &Value) -> Result<Vec<u8>> {
    Ok(match (p, v) {
        (PrimitiveType::Bool, Value::Bool(x))      => encoding::encode_bool(*x),
        (PrimitiveType::Float32, Value::Float(x))  => encoding::encode_float32(*x as f32),
        (PrimitiveType::Float64, Value::Float(x))  => encoding::encode_float64(*x),
        (PrimitiveType::Bytes, Value::Bytes(b))    => b.clone(),
        (PrimitiveType::String, Value::String(s))  => s.as_bytes().to_vec(),
        (p, Value::Int(x)) if p.is_signed() => {
            let (lo, hi) = int_range(p);
            if *x < lo || *x > hi {
                return Err(mismatch(format!("{x} out of range for {p}")));
            }
            encoding::encode_int(*x)
        }
        (p, Value::Uint(x)) if p.is_unsigned() => {
            if *x > uint_max(p) {
                return Err(mismatch(format!("{x} out of range for {p}")));
            }
            encoding::encode_uint(*x)
        }
        (p, v) => return Err(mismatch(format!("value {v} does not fit type {p}"))),
    })
}

fn decode_primitive(p: PrimitiveType, b: &[u8]) -> Result<Value> {
    Ok(match p {
        PrimitiveType::Bool    => Value::Bool(encoding::decode_bool(b)?),
        PrimitiveType::Float32 => Value::Float(encoding::decode_float32(b)? as f64),
        PrimitiveType::Float64 => Value::Float(encoding::decode_float64(b)?),
        PrimitiveType::Bytes   => Value::Bytes(b.to_vec()),
        PrimitiveType::String  => Value::String(String::from_utf8(b.to_vec())
            .map_err(|e| mismatch(format!("string body is not UTF-8: {e}")))?),
        p if p.is_signed()     => Value::Int(encoding::decode_int(b)?),
        _                      => Value::Uint(encoding::decode_uint(b)?),
    })
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn list(f: &mut std::fmt::Formatter<'_>, vals: &[Value]) -> std::fmt::Result {
            for (i, v) in vals.iter().enumerate() {
                if i > 0 { f.write_str(",")?; }
                write!(f, "{v}")?;
            }
            Ok(())
        }
        match self {
            Self::Null      => write!(f, "null"),
            Self::Bool(v)   => write!(f, "{v}"),
            Self::Int(v)    => write!(f, "{v}"),
            Self::Uint(v)   => write!(f, "{v}"),
            Self::Float(v)  => write!(f, "{v}"),
            Self::Bytes(b)  => {
                f.write_str("0x")?;
                b.iter().try_for_each(|x| write!(f, "{x:02x}"))
            }
            Self::String(s) => write!(f, "{s:?}"),
            Self::Record(vals) => { f.write_str("{")?; list(f, vals)?; f.write_str("}") }
            Self::Array(vals)  => { f.write_str("[")?; list(f, vals)?; f.write_str("]") }
            Self::Set(vals)    => { f.write_str("|[")?; list(f, vals)?; f.write_str("]|") }
            Self::Map(entries) => {
                f.write_str("|{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 { f.write_str(",")?; }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("}|")
            }
            Self::Union(tag, v) => write!(f, "<{tag}>{v}"),
        }
    }
}
