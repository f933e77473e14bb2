//! 写入 / 读取配置

/// 单个 segment 的默认字节上限
pub const DEFAULT_SEGMENT_THRESHOLD: usize = 5 * 1024 * 1024;
/// 整棵 writer 树在内存中缓冲的默认上限
pub const DEFAULT_MEMORY_THRESHOLD: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// 每列缓冲达到该字节数即落一个 segment
    pub segment_threshold: usize,
    /// 所有列缓冲总量超过该值时，强制做一次非终结 flush
    pub memory_threshold:  usize,
    /// 为每个 segment 记录 CRC32
    pub checksums:         bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            segment_threshold: DEFAULT_SEGMENT_THRESHOLD,
            memory_threshold:  DEFAULT_MEMORY_THRESHOLD,
            checksums:         true,
        }
    }
}

impl WriterConfig {
    pub fn with_segment_threshold(mut self, bytes: usize) -> Self {
        self.segment_threshold = bytes.max(1); self
    }
    pub fn with_memory_threshold(mut self, bytes: usize) -> Self {
        self.memory_threshold = bytes; self
    }
    pub fn with_checksums(mut self, on: bool) -> Self {
        self.checksums = on; self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// 加载 segment 时校验 CRC32（segment 未记录 CRC 时跳过）
    pub verify_checksums: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self { verify_checksums: true }
    }
}

impl ReaderConfig {
    pub fn with_verify_checksums(mut self, on: bool) -> Self {
        self.verify_checksums = on; self
    }
}
