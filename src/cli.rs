//! Command line definitions.

use crate::models::{AppConfig, CompressionLevel};
use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch front end for the UPX executable packer", long_about = None)]
pub struct Cli {
    /// Directory holding upx_gui_config.yaml (default: next to the executable)
    #[arg(long, global = true)]
    pub config_dir: Option<Utf8PathBuf>,

    /// Directory for diagnostic log files
    #[arg(long, global = true, default_value = "logs")]
    pub log_dir: Utf8PathBuf,

    /// Verbose diagnostics on the console
    #[arg(long, global = true)]
    pub debug: bool,

    /// Only print warnings and errors from the activity log
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compress executables; folders are scanned for .exe/.dll files
    Compress {
        /// Files or folders (a file picker opens when omitted)
        paths: Vec<Utf8PathBuf>,
        #[command(flatten)]
        overrides: PackOverrides,
    },

    /// Decompress executables packed with UPX
    Decompress {
        /// Files or folders (a file picker opens when omitted)
        paths: Vec<Utf8PathBuf>,
        #[command(flatten)]
        overrides: PackOverrides,
    },

    /// List the processable files in a folder
    Scan {
        folder: Utf8PathBuf,
        /// Include subfolders
        #[arg(long, short)]
        recursive: bool,
    },

    /// Check GitHub for a newer release
    CheckUpdate {
        /// Download and launch the named asset when an update is available
        #[arg(long)]
        download: Option<String>,
    },

    /// Print the UPX version in use
    ToolVersion,

    /// Show or edit the saved settings
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective settings as YAML
    Show,
    /// Print the settings file location
    Path,
    /// Change one setting, e.g. `config set compression_level 10`
    Set { key: String, value: String },
    /// Restore all defaults
    Reset,
}

/// One-off overrides of the saved settings for a single run.
#[derive(Args, Debug, Default, Clone)]
pub struct PackOverrides {
    /// Compression level 1-10 (10 = --best)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub level: Option<u8>,

    /// Use LZMA compression
    #[arg(long)]
    pub lzma: bool,

    /// Try all compression methods (slow)
    #[arg(long)]
    pub ultra_brute: bool,

    /// Pass --force to UPX
    #[arg(long)]
    pub force: bool,

    /// Copy each input to <file>.bak first
    #[arg(long)]
    pub backup: bool,

    /// Ask for an output file instead of overwriting the input
    #[arg(long)]
    pub keep_original: bool,

    /// Scan dropped folders recursively
    #[arg(long, short)]
    pub recursive: bool,

    /// Files processed concurrently per window
    #[arg(long)]
    pub jobs: Option<usize>,
}

impl PackOverrides {
    /// Apply the overrides on top of the saved settings. Flags only ever switch
    /// options on.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(level) = self.level.and_then(CompressionLevel::new) {
            config.compression_level = level;
        }
        config.lzma |= self.lzma;
        config.ultra_brute |= self.ultra_brute;
        config.force_compress |= self.force;
        config.backup |= self.backup;
        config.include_subfolders |= self.recursive;
        if self.keep_original {
            config.overwrite = false;
        }
        if self.jobs.is_some() {
            config.batch_size = self.jobs;
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => bail!("Expected a boolean, got '{}'", other),
    }
}

fn parse_optional<T: std::str::FromStr>(value: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    Ok(Some(value.parse()?))
}

/// Set one field of `config` from its textual form.
pub fn apply_setting(config: &mut AppConfig, key: &str, value: &str) -> Result<()> {
    let context = || format!("Invalid value for {}: {}", key, value);

    match key {
        "compression_level" => {
            let level: u8 = value.parse().with_context(context)?;
            config.compression_level = CompressionLevel::try_from(level)
                .map_err(anyhow::Error::msg)
                .with_context(context)?;
        }
        "overwrite" => config.overwrite = parse_bool(value).with_context(context)?,
        "backup" => config.backup = parse_bool(value).with_context(context)?,
        "lzma" => config.lzma = parse_bool(value).with_context(context)?,
        "ultra_brute" => config.ultra_brute = parse_bool(value).with_context(context)?,
        "include_subfolders" => {
            config.include_subfolders = parse_bool(value).with_context(context)?
        }
        "force_compress" => config.force_compress = parse_bool(value).with_context(context)?,
        "auto_check_update" => {
            config.auto_check_update = parse_bool(value).with_context(context)?
        }
        "batch_size" => config.batch_size = parse_optional(value).with_context(context)?,
        "upx_path" => config.upx_path = parse_optional(value).with_context(context)?,
        "pack_timeout_secs" => {
            config.pack_timeout_secs = value.parse::<u64>().with_context(context)?
        }
        other => bail!("Unknown setting: {}", other),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compress_with_overrides() {
        let cli = Cli::try_parse_from([
            "upx-tools",
            "--quiet",
            "compress",
            "a.exe",
            "tools",
            "--level",
            "10",
            "--lzma",
            "-r",
        ])
        .unwrap();

        assert!(cli.quiet);
        match cli.command {
            Commands::Compress { paths, overrides } => {
                assert_eq!(paths, vec![Utf8PathBuf::from("a.exe"), Utf8PathBuf::from("tools")]);
                assert_eq!(overrides.level, Some(10));
                assert!(overrides.lzma);
                assert!(overrides.recursive);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_level_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["upx-tools", "compress", "a.exe", "--level", "11"]).is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = AppConfig::default();
        PackOverrides {
            level: Some(3),
            keep_original: true,
            jobs: Some(2),
            ..PackOverrides::default()
        }
        .apply(&mut config);

        assert_eq!(config.compression_level.get(), 3);
        assert!(!config.overwrite);
        assert_eq!(config.batch_size, Some(2));
        assert!(!config.lzma);
    }

    #[test]
    fn test_apply_setting() {
        let mut config = AppConfig::default();

        apply_setting(&mut config, "compression_level", "10").unwrap();
        apply_setting(&mut config, "overwrite", "off").unwrap();
        apply_setting(&mut config, "batch_size", "6").unwrap();
        apply_setting(&mut config, "upx_path", "C:/upx/upx.exe").unwrap();

        assert!(config.compression_level.is_best());
        assert!(!config.overwrite);
        assert_eq!(config.batch_size, Some(6));
        assert_eq!(config.upx_path.as_deref(), Some("C:/upx/upx.exe"));

        apply_setting(&mut config, "batch_size", "none").unwrap();
        assert_eq!(config.batch_size, None);
    }

    #[test]
    fn test_apply_setting_errors() {
        let mut config = AppConfig::default();
        assert!(apply_setting(&mut config, "compression_level", "0").is_err());
        assert!(apply_setting(&mut config, "lzma", "maybe").is_err());
        assert!(apply_setting(&mut config, "colour", "blue").is_err());
    }
}
