use gravokit_settings::{Config, SettingsError};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_toml_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::new();
    config.machine.host = "192.168.1.50".to_string();
    config.machine.marking_timeout_ms = Some(60_000);
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(
        loaded.connection_settings().marking_timeout,
        Some(Duration::from_secs(60))
    );
}

#[test]
fn test_json_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "machine": { "host": "marker", "port": 55556, "timeout_ms": 0 } }"#,
    )
    .unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.machine.port, 55556);
    let settings = config.connection_settings();
    assert_eq!(settings.addr(), "marker:55556");
    assert_eq!(settings.timeout, None);
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "machine: {}").unwrap();

    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::UnsupportedFormat(ref ext)) if ext == "yaml"
    ));
    assert!(Config::new().save_to_file(&path).is_err());
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[machine]\nport = 0\n").unwrap();
    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::InvalidSetting { .. })
    ));

    std::fs::write(&path, "[machine\n").unwrap();
    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::TomlError(_))
    ));
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = Config::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, SettingsError::IoError(_)));
}
