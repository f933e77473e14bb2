//! 带 tag 的值体与容器
//!
//! ```text
//! tagged value := uvarint(tag) bytes
//!   tag == 0   → null（无字节）
//!   tag == n+1 → 后随 n 字节的值体
//! container    := tagged value*
//! ```

use crate::common::{corrupt, Result};
use super::{append_uvarint, read_uvarint, uvarint_len};

/// 以 tagged 形式追加一个值（`None` 为 null）
pub fn append(out: &mut Vec<u8>, val: Option<&[u8]>) {
    match val {
        None    => out.push(0),
        Some(b) => {
            append_uvarint(out, b.len() as u64 + 1);
            out.extend_from_slice(b);
        }
    }
}

/// 解出第一个 tagged 值及其总长度
pub fn read_tagged(buf: &[u8]) -> Result<(Option<&[u8]>, usize)> {
    let (tag, n) = read_uvarint(buf)?;
    if tag == 0 {
        return Ok((None, n));
    }
    let len = (tag - 1) as usize;
    let end = n.checked_add(len)
        .filter(|&e| e <= buf.len())
        .ok_or_else(|| corrupt(format!("tagged value of {len} bytes runs past its container")))?;
    Ok((Some(&buf[n..end]), end))
}

// ── Iter ──────────────────────────────────────────────────────────────────────

/// 遍历容器值体内的各个元素
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    buf: &'a [u8],
}

impl<'a> Iter<'a> {
    pub fn new(container: &'a [u8]) -> Self {
        Self { buf: container }
    }

    pub fn done(&self) -> bool { self.buf.is_empty() }

    /// 取下一个元素；容器已耗尽时报错
    pub fn next_value(&mut self) -> Result<Option<&'a [u8]>> {
        match self.next() {
            Some(v) => v,
            None    => Err(corrupt("container has fewer elements than its type requires")),
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<Option<&'a [u8]>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            return None;
        }
        match read_tagged(self.buf) {
            Ok((val, n)) => {
                self.buf = &self.buf[n..];
                Some(Ok(val))
            }
            Err(e) => {
                self.buf = &[];
                Some(Err(e))
            }
        }
    }
}

/// 统计容器中的元素个数
pub fn count(container: &[u8]) -> Result<usize> {
    let mut n = 0;
    for v in Iter::new(container) {
        v?;
        n += 1;
    }
    Ok(n)
}

/// 将若干值拼成一个容器值体
pub fn container<'a, I>(elems: I) -> Vec<u8>
where
    I: IntoIterator<Item = Option<&'a [u8]>>,
{
    let mut out = Vec::new();
    for e in elems {
        append(&mut out, e);
    }
    out
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// 只追加、可嵌套的值体构造器，Reader 唯一的输出端
#[derive(Debug, Default, Clone)]
pub struct Builder {
    bytes:      Vec<u8>,
    /// 未闭合容器的起始偏移
    containers: Vec<usize>,
}

impl Builder {
    pub fn new() -> Self { Self::default() }

    pub fn reset(&mut self) {
        self.bytes.clear();
        self.containers.clear();
    }

    pub fn append(&mut self, val: Option<&[u8]>) {
        append(&mut self.bytes, val);
    }

    pub fn begin_container(&mut self) {
        self.containers.push(self.bytes.len());
    }

    /// 闭合最近的容器：在其起始处补写 tag
    pub fn end_container(&mut self) -> Result<()> {
        let start = self.containers.pop()
            .ok_or_else(|| corrupt("end_container without matching begin_container"))?;
        let len = (self.bytes.len() - start) as u64;
        let mut tag = Vec::with_capacity(uvarint_len(len + 1));
        append_uvarint(&mut tag, len + 1);
        self.bytes.splice(start..start, tag);
        Ok(())
    }

    /// 已构造的 tagged 值序列
    pub fn bytes(&self) -> &[u8] { &self.bytes }

    /// 取出唯一的顶层值；builder 中不止一个值或容器未闭合时报错
    pub fn single(&self) -> Result<Option<&[u8]>> {
        if !self.containers.is_empty() {
            return Err(corrupt("builder has an open container"));
        }
        let (val, n) = read_tagged(&self.bytes)?;
        if n != self.bytes.len() {
            return Err(corrupt("builder holds more than one value"));
        }
        Ok(val)
    }
}
