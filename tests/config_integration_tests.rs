//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Settings survive a save/load cycle through the YAML file
//! - Command line edits (`config set`) persist
//! - Files written by older versions still load
//! - Invalid files are reported instead of silently replaced

use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;
use upx_tools::cli::apply_setting;
use upx_tools::config::CONFIG_FILE_NAME;
use upx_tools::models::CompressionLevel;
use upx_tools::{AppConfig, ConfigManager};

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_config_file_location() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    let manager = ConfigManager::new(&config_dir).unwrap();

    assert_eq!(manager.config_dir(), &config_dir);
    assert_eq!(manager.config_path(), config_dir.join(CONFIG_FILE_NAME));
}

#[test]
fn test_full_round_trip() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    let manager = ConfigManager::new(&config_dir).unwrap();

    let config = AppConfig {
        compression_level: CompressionLevel::new(3).unwrap(),
        overwrite: false,
        backup: true,
        lzma: true,
        ultra_brute: true,
        include_subfolders: true,
        force_compress: true,
        auto_check_update: false,
        batch_size: Some(12),
        upx_path: Some("D:/tools/upx.exe".to_string()),
        pack_timeout_secs: 60,
    };
    manager.save(&config).unwrap();

    // A fresh manager over the same directory sees the same settings
    let reloaded = ConfigManager::new(&config_dir).unwrap().load().unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn test_saved_file_is_readable_yaml() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    let manager = ConfigManager::new(&config_dir).unwrap();

    manager.save(&AppConfig::default()).unwrap();

    let content = fs::read_to_string(manager.config_path()).unwrap();
    assert!(content.contains("compression_level: 9"));
    assert!(content.contains("overwrite: true"));
    assert!(content.contains("auto_check_update: true"));
}

#[test]
fn test_config_set_persists() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    let manager = ConfigManager::new(&config_dir).unwrap();

    let mut config = manager.load().unwrap();
    apply_setting(&mut config, "compression_level", "10").unwrap();
    apply_setting(&mut config, "include_subfolders", "yes").unwrap();
    apply_setting(&mut config, "pack_timeout_secs", "120").unwrap();
    manager.save(&config).unwrap();

    let loaded = manager.load().unwrap();
    assert!(loaded.compression_level.is_best());
    assert!(loaded.include_subfolders);
    assert_eq!(loaded.pack_timeout_secs, 120);
}

#[test]
fn test_unknown_keys_are_ignored() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    let manager = ConfigManager::new(&config_dir).unwrap();

    fs::write(
        manager.config_path(),
        "compressionLevel: 4\ncompression_level: 6\ntheme: dark\nbackup: true\n",
    )
    .unwrap();

    let loaded = manager.load().unwrap();
    assert_eq!(loaded.compression_level.get(), 6);
    assert!(loaded.backup);
    assert!(loaded.overwrite);
}

#[test]
fn test_malformed_file_is_an_error() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    let manager = ConfigManager::new(&config_dir).unwrap();

    fs::write(manager.config_path(), "overwrite: [not, a, bool\n").unwrap();

    assert!(manager.load().is_err());
}

#[test]
fn test_reset_restores_defaults() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    let manager = ConfigManager::new(&config_dir).unwrap();

    manager
        .save(&AppConfig {
            lzma: true,
            batch_size: Some(2),
            ..AppConfig::default()
        })
        .unwrap();
    manager.save(&AppConfig::default()).unwrap();

    assert_eq!(manager.load().unwrap(), AppConfig::default());
}
