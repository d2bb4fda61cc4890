use crate::models::{OperationMode, PackRequest};
use camino::{Utf8Path, Utf8PathBuf};
use encoding_rs::GBK;
use std::borrow::Cow;
use std::process::Output;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Default limit for a single UPX invocation.
pub const DEFAULT_PACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Lines of UPX output that are banner or table decoration.
pub const IGNORED_PREFIXES: &[&str] = &[
    "---",
    "File size",
    "Ratio",
    "Format",
    "Name",
    "Ultimate Packer",
    "Copyright",
    "UPX ",
];

/// Known UPX failures and the report shown for each, checked in order.
const FAILURE_REPORTS: &[(&[&str], &str)] = &[
    (
        &["AlreadyPackedException", "already packed"],
        "[错误] 文件已经被 UPX 加壳过了\n\n解决方案:\n  - 如果要重新压缩，请先使用「脱壳解压」功能\n  - 或者选择其他未加壳的文件",
    ),
    (
        &["NotPackedException", "not packed"],
        "[错误] 文件未被 UPX 加壳，无法脱壳\n\n解决方案:\n  - 请确认文件是否使用 UPX 加壳\n  - 或者选择「加壳压缩」功能",
    ),
    (
        &["CantPackException"],
        "[错误] 无法压缩此文件\n\n可能原因:\n  - 文件格式不支持\n  - 文件已损坏\n  - 文件受保护（尝试启用「强制压缩」选项）",
    ),
    (
        &["OverlayException"],
        "[错误] 文件包含附加数据（Overlay）\n\n解决方案:\n  - 某些文件在末尾附加了额外数据\n  - 尝试启用「强制压缩」选项\n  - 或使用其他工具移除附加数据",
    ),
    (
        &["IOException", "can't open"],
        "[错误] 文件访问失败\n\n可能原因:\n  - 文件被其他程序占用\n  - 文件权限不足\n  - 文件路径包含特殊字符",
    ),
    (
        &["NotCompressibleException"],
        "[错误] 文件无法压缩\n\n可能原因:\n  - 文件已经高度压缩\n  - 压缩后反而会变大\n  - UPX 自动跳过了此文件",
    ),
];

/// Errors that can occur while running UPX.
///
/// The `Display` text is what the user sees in the activity log.
#[derive(Error, Debug)]
pub enum PackError {
    #[error("未找到 UPX 工具！请确保安装完整")]
    ToolNotFound,

    #[error("UPX 工具无法执行！")]
    ToolNotRunnable(#[source] std::io::Error),

    #[error("无法获取UPX版本")]
    NoVersion,

    #[error("输入文件不存在: {0}")]
    InputMissing(Utf8PathBuf),

    #[error("无法读取文件属性: {0}")]
    Metadata(#[source] std::io::Error),

    #[error("文件为只读，请先修改文件属性")]
    ReadOnly,

    #[error("备份文件失败: {0}")]
    Backup(#[source] std::io::Error),

    #[error("执行 UPX 命令失败: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("UPX 执行超时 ({0:?})")]
    Timeout(Duration),

    /// UPX exited unsuccessfully; the report is already user-facing.
    #[error("{0}")]
    Rejected(String),
}

/// Find the UPX executable.
///
/// Checked in order: the configured path, `_up_/upx/` and `upx/` beside the running
/// executable, `../upx/` relative to the working directory, then every `PATH` entry.
pub fn locate_upx(configured: Option<&str>) -> Option<Utf8PathBuf> {
    let binary = format!("upx{}", std::env::consts::EXE_SUFFIX);

    if let Some(path) = configured.filter(|p| !p.trim().is_empty()) {
        let path = Utf8PathBuf::from(path);
        if path.is_file() {
            return Some(path);
        }
        tracing::warn!("Configured UPX path does not exist: {}", path);
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| Utf8PathBuf::try_from(exe).ok())
        .and_then(|exe| exe.parent().map(Utf8Path::to_path_buf));

    let mut candidates = Vec::new();
    if let Some(dir) = &exe_dir {
        candidates.push(dir.join("_up_").join("upx").join(&binary));
        candidates.push(dir.join("upx").join(&binary));
    }
    candidates.push(Utf8PathBuf::from("..").join("upx").join(&binary));

    if let Some(found) = candidates.into_iter().find(|c| c.is_file()) {
        return Some(found);
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(&binary))
        .find(|candidate| candidate.is_file())
        .and_then(|found| Utf8PathBuf::try_from(found).ok())
}

/// Build the UPX argument list for a request.
pub fn build_args(request: &PackRequest) -> Vec<String> {
    let overwrite = request.is_overwrite();
    let options = &request.options;
    let mut args = Vec::new();

    match request.mode {
        OperationMode::Compress => {
            if options.ultra_brute {
                args.push("--ultra-brute".to_string());
                args.push("--no-lzma".to_string());
            } else {
                args.push(options.compression_level.as_flag());
                if options.lzma {
                    args.push("--lzma".to_string());
                }
            }
            if options.force {
                args.push("--force".to_string());
            }
            args.push(request.input.to_string());
        }
        OperationMode::Decompress => {
            args.push("-d".to_string());
            args.push(request.input.to_string());
            if options.force {
                args.push("--force".to_string());
            }
        }
    }

    if !overwrite {
        args.push("-o".to_string());
        args.push(request.output.to_string());
    }
    args.push("--force-overwrite".to_string());

    args
}

/// Non-blank lines of tool output without banner/table decoration, trimmed.
pub fn filter_output_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !IGNORED_PREFIXES.iter().any(|prefix| line.starts_with(prefix)))
        .collect()
}

/// Text of a UPX output stream. UTF-8 is taken as is; anything else is read as GBK,
/// the code page of a Chinese Windows console.
pub fn decode_console(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _, had_errors) = GBK.decode(bytes);
            if had_errors {
                tracing::debug!("UPX output is neither UTF-8 nor GBK; replaced invalid bytes");
            }
            Cow::Owned(text.into_owned())
        }
    }
}

/// Failure report for an unsuccessful UPX run.
pub fn describe_failure(stdout: &str, stderr: &str) -> String {
    let combined = format!("{}{}", stdout, stderr);

    if let Some((_, report)) = FAILURE_REPORTS
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| combined.contains(p)))
    {
        return (*report).to_string();
    }

    let lines = filter_output_lines(&combined);
    if lines.is_empty() {
        "[错误] UPX 处理失败\n\n请检查文件是否正常，或尝试其他选项".to_string()
    } else {
        format!("[错误] UPX 处理失败\n\n错误信息:\n{}", lines.join("\n"))
    }
}

/// Human-readable size with two decimals above 1 KB.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Output size as a truncated percentage of the original (100 for empty input).
pub fn compression_ratio(original: u64, output: u64) -> u64 {
    if original == 0 {
        100
    } else {
        (output as f64 / original as f64 * 100.0) as u64
    }
}

/// Success report shown after a UPX run.
pub fn success_report(
    output: &Utf8Path,
    original_size: u64,
    output_size: u64,
    stdout: &str,
    stderr: &str,
) -> String {
    let combined = format!("{}{}", stdout, stderr);
    let lines = filter_output_lines(&combined);
    let tool_output = if lines.is_empty() {
        String::new()
    } else {
        format!("\n\nUPX 输出:\n{}", lines.join("\n"))
    };

    format!(
        "操作成功!\n输出: {}\n原始大小: {}\n处理后大小: {}\n压缩率: {}%{}",
        output,
        format_bytes(original_size),
        format_bytes(output_size),
        compression_ratio(original_size, output_size),
        tool_output
    )
}

/// Runs UPX as a subprocess.
///
/// Each call validates the tool and the input, optionally writes a `.bak` copy, runs UPX
/// with a timeout, and turns the result into a user-facing report.
#[derive(Debug, Clone)]
pub struct PackerService {
    upx_path: Utf8PathBuf,
    timeout: Duration,
}

impl PackerService {
    pub fn new(upx_path: impl Into<Utf8PathBuf>, timeout: Duration) -> Self {
        Self {
            upx_path: upx_path.into(),
            timeout,
        }
    }

    /// Locate UPX with [`locate_upx`].
    pub fn discover(configured: Option<&str>, timeout: Duration) -> Result<Self, PackError> {
        let upx_path = locate_upx(configured).ok_or(PackError::ToolNotFound)?;
        tracing::info!("Using UPX at {}", upx_path);
        Ok(Self::new(upx_path, timeout))
    }

    pub fn upx_path(&self) -> &Utf8Path {
        &self.upx_path
    }

    /// First line of `upx --version`.
    pub async fn version(&self) -> Result<String, PackError> {
        let output = self
            .run(&["--version".to_string()])
            .await
            .map_err(|e| match e {
                PackError::Spawn(io) => PackError::ToolNotRunnable(io),
                other => other,
            })?;

        decode_console(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .ok_or(PackError::NoVersion)
    }

    /// Compress or decompress one file, returning the success report.
    pub async fn pack(&self, request: &PackRequest) -> Result<String, PackError> {
        self.version().await?;

        let metadata = match tokio::fs::metadata(&request.input).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PackError::InputMissing(request.input.clone()));
            }
            Err(e) => return Err(PackError::Metadata(e)),
        };

        if request.is_overwrite() && metadata.permissions().readonly() {
            return Err(PackError::ReadOnly);
        }

        if request.options.backup {
            let backup = Utf8PathBuf::from(format!("{}.bak", request.input));
            tokio::fs::copy(&request.input, &backup)
                .await
                .map_err(PackError::Backup)?;
            tracing::debug!("Backed up {} to {}", request.input, backup);
        }

        let original_size = metadata.len();
        let args = build_args(request);
        tracing::info!("Executing: {} {}", self.upx_path, args.join(" "));

        let start = Instant::now();
        let output = self.run(&args).await?;
        let stdout = decode_console(&output.stdout);
        let stderr = decode_console(&output.stderr);

        tracing::info!(
            "UPX completed in {:.2}s with exit code {}",
            start.elapsed().as_secs_f32(),
            output.status.code().unwrap_or(-1)
        );

        if !output.status.success() {
            return Err(PackError::Rejected(describe_failure(&stdout, &stderr)));
        }

        let output_size = tokio::fs::metadata(&request.output)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(success_report(
            &request.output,
            original_size,
            output_size,
            &stdout,
            &stderr,
        ))
    }

    async fn run(&self, args: &[String]) -> Result<Output, PackError> {
        let mut cmd = Command::new(self.upx_path.as_std_path());
        cmd.args(args).kill_on_drop(true);

        #[cfg(target_os = "windows")]
        cmd.creation_flags(CREATE_NO_WINDOW);

        timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                tracing::warn!("UPX process timed out after {:?}", self.timeout);
                PackError::Timeout(self.timeout)
            })?
            .map_err(PackError::Spawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompressionLevel, PackOptions};

    fn request(mode: OperationMode, output: &str, options: PackOptions) -> PackRequest {
        PackRequest {
            mode,
            input: Utf8PathBuf::from("C:/apps/tool.exe"),
            output: Utf8PathBuf::from(output),
            options,
        }
    }

    #[test]
    fn test_compress_args_with_output() {
        let args = build_args(&request(
            OperationMode::Compress,
            "C:/apps/tool_packed.exe",
            PackOptions::default(),
        ));
        assert_eq!(
            args,
            vec![
                "-9",
                "C:/apps/tool.exe",
                "-o",
                "C:/apps/tool_packed.exe",
                "--force-overwrite"
            ]
        );
    }

    #[test]
    fn test_compress_args_best_lzma_force_overwrite() {
        let options = PackOptions {
            compression_level: CompressionLevel::new(10).unwrap(),
            lzma: true,
            force: true,
            ..PackOptions::default()
        };
        let args = build_args(&request(OperationMode::Compress, "C:/apps/tool.exe", options));
        assert_eq!(
            args,
            vec!["--best", "--lzma", "--force", "C:/apps/tool.exe", "--force-overwrite"]
        );
    }

    #[test]
    fn test_ultra_brute_overrides_level_and_lzma() {
        let options = PackOptions {
            compression_level: CompressionLevel::new(3).unwrap(),
            lzma: true,
            ultra_brute: true,
            ..PackOptions::default()
        };
        let args = build_args(&request(OperationMode::Compress, "C:/apps/tool.exe", options));
        assert_eq!(args[..2], ["--ultra-brute", "--no-lzma"]);
        assert!(!args.iter().any(|a| a == "--lzma" || a == "-3"));
    }

    #[test]
    fn test_decompress_args() {
        let options = PackOptions {
            force: true,
            ..PackOptions::default()
        };
        let args = build_args(&request(OperationMode::Decompress, "C:/apps/tool.exe", options));
        assert_eq!(
            args,
            vec!["-d", "C:/apps/tool.exe", "--force", "--force-overwrite"]
        );
    }

    #[test]
    fn test_filter_output_lines() {
        let raw = "                       Ultimate Packer for eXecutables\n\
                   Copyright (C) 1996 - 2024\n\
                   UPX 4.2.4       Markus Oberhumer\n\n\
                   \x20       File size         Ratio      Format      Name\n\
                   --------------------   ------   -----------   -----------\n\
                   \x20   102400 ->     51200   50.00%    win64/pe     tool.exe\n\
                   Packed 1 file.\n";
        let lines = filter_output_lines(raw);
        assert_eq!(
            lines,
            vec!["102400 ->     51200   50.00%    win64/pe     tool.exe", "Packed 1 file."]
        );
    }

    #[test]
    fn test_describe_known_failure() {
        let report = describe_failure(
            "",
            "upx: tool.exe: AlreadyPackedException: already packed by UPX",
        );
        assert!(report.starts_with("[错误] 文件已经被 UPX 加壳过了"));
        assert!(report.contains("解决方案:"));

        let report = describe_failure("", "upx: tool.exe: CantPackException: can't pack");
        assert!(report.contains("可能原因:"));
    }

    #[test]
    fn test_describe_unknown_failure() {
        assert_eq!(
            describe_failure("", ""),
            "[错误] UPX 处理失败\n\n请检查文件是否正常，或尝试其他选项"
        );
        assert_eq!(
            describe_failure("", "upx: tool.exe: weird thing\n"),
            "[错误] UPX 处理失败\n\n错误信息:\nupx: tool.exe: weird thing"
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_compression_ratio() {
        assert_eq!(compression_ratio(0, 10), 100);
        assert_eq!(compression_ratio(1000, 523), 52);
        assert_eq!(compression_ratio(1000, 1000), 100);
    }

    #[test]
    fn test_success_report_layout() {
        let report = success_report(
            Utf8Path::new("out.exe"),
            2048,
            1024,
            "Packed 1 file.\n",
            "",
        );
        assert_eq!(
            report,
            "操作成功!\n输出: out.exe\n原始大小: 2.00 KB\n处理后大小: 1.00 KB\n压缩率: 50%\n\nUPX 输出:\nPacked 1 file."
        );
    }

    #[test]
    fn test_configured_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let upx = dir.path().join("custom-upx");
        std::fs::write(&upx, b"").unwrap();

        let found = locate_upx(upx.to_str()).unwrap();
        assert_eq!(found.as_std_path(), upx);
    }

    #[tokio::test]
    async fn test_missing_tool_is_not_runnable() {
        let service = PackerService::new("/nonexistent/upx", DEFAULT_PACK_TIMEOUT);
        let err = service.version().await.unwrap_err();
        assert!(matches!(err, PackError::ToolNotRunnable(_)));
        assert_eq!(err.to_string(), "UPX 工具无法执行！");
    }

    // "文件损坏" in GBK
    const GBK_FILE_DAMAGED: &[u8] = &[0xCE, 0xC4, 0xBC, 0xFE, 0xCB, 0xF0, 0xBB, 0xB5];

    #[test]
    fn test_decode_console_reads_gbk() {
        let mut stderr = b"upx: ".to_vec();
        stderr.extend_from_slice(GBK_FILE_DAMAGED);

        assert_eq!(decode_console(&stderr), "upx: 文件损坏");
        assert_eq!(decode_console("压缩率 50%".as_bytes()), "压缩率 50%");
    }

    #[test]
    fn test_gbk_error_text_reaches_failure_report() {
        let mut stderr = b"upx: tool.exe: ".to_vec();
        stderr.extend_from_slice(GBK_FILE_DAMAGED);

        let report = describe_failure("", &decode_console(&stderr));
        assert_eq!(report, "[错误] UPX 处理失败\n\n错误信息:\nupx: tool.exe: 文件损坏");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pack_decodes_gbk_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        let upx = root.join("upx");
        std::fs::write(
            &upx,
            "#!/bin/sh\n\
             if [ \"$1\" = \"--version\" ]; then echo 'upx 4.2.4'; exit 0; fi\n\
             printf 'upx: \\316\\304\\274\\376\\313\\360\\273\\265\\n' >&2\n\
             exit 2\n",
        )
        .unwrap();
        std::fs::set_permissions(&upx, std::fs::Permissions::from_mode(0o755)).unwrap();

        let input = root.join("tool.exe");
        std::fs::write(&input, b"MZ").unwrap();

        let service = PackerService::new(upx, Duration::from_secs(10));
        let err = service
            .pack(&PackRequest {
                mode: OperationMode::Compress,
                input: input.clone(),
                output: input,
                options: PackOptions::default(),
            })
            .await
            .unwrap_err();

        let report = match err {
            PackError::Rejected(report) => report,
            other => panic!("expected a rejected run, got {:?}", other),
        };
        assert!(report.contains("文件损坏"), "{}", report);
    }
}
