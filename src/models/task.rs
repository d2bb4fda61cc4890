use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Extensions the packer accepts (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["exe", "dll"];

/// Operation requested for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Compress,
    Decompress,
}

impl OperationMode {
    /// Label used in user-facing log lines ("加壳压缩" / "脱壳解压").
    pub fn display_name(self) -> &'static str {
        match self {
            OperationMode::Compress => "加壳压缩",
            OperationMode::Decompress => "脱壳解压",
        }
    }

    /// Short verb used in the file-picker prompt ("加壳" / "脱壳").
    pub fn verb(self) -> &'static str {
        match self {
            OperationMode::Compress => "加壳",
            OperationMode::Decompress => "脱壳",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationMode::Compress => "compress",
            OperationMode::Decompress => "decompress",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single file queued for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub path: Utf8PathBuf,
    pub mode: OperationMode,
}

impl FileTask {
    pub fn new(path: impl Into<Utf8PathBuf>, mode: OperationMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }
}

/// Final counters of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Compression strength, 1 (fastest) through 10 (`--best`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(level: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&level).then_some(Self(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn is_best(self) -> bool {
        self.0 == Self::MAX
    }

    /// The UPX command line flag for this level.
    pub fn as_flag(self) -> String {
        if self.is_best() {
            "--best".to_string()
        } else {
            format!("-{}", self.0)
        }
    }

    pub fn description(self) -> &'static str {
        match self.0 {
            1 => "最快速度，压缩率最低",
            2 => "较快速度，较低压缩率",
            3 => "快速压缩",
            4 => "平衡模式",
            5 => "标准压缩",
            6 => "良好压缩",
            7 => "较高压缩率",
            8 => "高压缩率",
            9 => "推荐级别，平衡速度和压缩率",
            _ => "极致压缩，速度最慢",
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(9)
    }
}

impl TryFrom<u8> for CompressionLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| {
            format!(
                "compression level must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )
        })
    }
}

impl From<CompressionLevel> for u8 {
    fn from(level: CompressionLevel) -> Self {
        level.0
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_best() {
            f.write_str("级别 best")
        } else {
            write!(f, "级别 {}", self.0)
        }
    }
}

/// Options forwarded to the packer for every file of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackOptions {
    pub compression_level: CompressionLevel,
    pub backup: bool,
    pub lzma: bool,
    pub ultra_brute: bool,
    pub force: bool,
}

/// One packer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackRequest {
    pub mode: OperationMode,
    pub input: Utf8PathBuf,
    pub output: Utf8PathBuf,
    pub options: PackOptions,
}

impl PackRequest {
    /// True when the packer writes back into the input file.
    pub fn is_overwrite(&self) -> bool {
        self.input == self.output
    }
}

/// Check whether a path names a file the packer can handle.
pub fn has_supported_extension(path: &Utf8Path) -> bool {
    path.extension()
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Default save target for a compressed copy: `<stem>_packed<.ext>` next to the input.
pub fn default_packed_output(input: &Utf8Path) -> Utf8PathBuf {
    let stem = input.file_stem().unwrap_or("output");
    let file_name = match input.extension() {
        Some(ext) => format!("{}_packed.{}", stem, ext),
        None => format!("{}_packed", stem),
    };
    input.with_file_name(file_name)
}
