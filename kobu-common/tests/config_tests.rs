//! Tests for bootstrap configuration and data folder resolution
//!
//! Tests that touch KOBU_DATA_FOLDER or KOBU_CONFIG are marked #[serial]
//! so they don't race each other.

use kobu_common::config::{
    database_path, default_data_folder, load_toml_config, resolve_data_folder, ConfigSource,
    TomlConfig, CONFIG_FILE_ENV, DATA_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

#[test]
fn test_defaults_when_fields_missing() {
    let config = TomlConfig::from_toml_str("").unwrap();
    assert_eq!(config.port, 5780);
    assert_eq!(config.bind_address, "127.0.0.1");
    assert_eq!(config.company_name, "Watu Kobu");
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.file.is_none());
    assert!(config.data_folder.is_none());
}

#[test]
fn test_full_config_parses() {
    let config = TomlConfig::from_toml_str(
        r#"
        data_folder = "/srv/kobu"
        bind_address = "0.0.0.0"
        port = 8080
        company_name = "Watu Credit Recovery"

        [logging]
        level = "debug"
        file = "/var/log/kobu.log"
        "#,
    )
    .unwrap();

    assert_eq!(config.data_folder, Some(PathBuf::from("/srv/kobu")));
    assert_eq!(config.bind_address, "0.0.0.0");
    assert_eq!(config.port, 8080);
    assert_eq!(config.company_name, "Watu Credit Recovery");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/kobu.log")));
}

#[test]
fn test_invalid_values_rejected() {
    assert!(TomlConfig::from_toml_str("port = 0").is_err());
    assert!(TomlConfig::from_toml_str("[logging]\nlevel = \"loud\"").is_err());
    assert!(TomlConfig::from_toml_str("port = \"eighty\"").is_err());
}

#[test]
#[serial]
fn test_explicit_missing_file_is_error() {
    env::remove_var(CONFIG_FILE_ENV);
    let result = load_toml_config(Some(Path::new("/nonexistent/kobu-test/kobu.toml")));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_config_file_from_env() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = 6001").unwrap();

    env::set_var(CONFIG_FILE_ENV, file.path());
    let (config, source) = load_toml_config(None).unwrap();
    env::remove_var(CONFIG_FILE_ENV);

    assert_eq!(config.port, 6001);
    assert_eq!(source, ConfigSource::File(file.path().to_path_buf()));
}

#[test]
#[serial]
fn test_cli_argument_wins() {
    env::set_var(DATA_FOLDER_ENV, "/tmp/kobu-from-env");
    let toml = TomlConfig {
        data_folder: Some(PathBuf::from("/tmp/kobu-from-toml")),
        ..Default::default()
    };

    let folder = resolve_data_folder(Some(Path::new("/tmp/kobu-from-cli")), &toml);
    env::remove_var(DATA_FOLDER_ENV);

    assert_eq!(folder, PathBuf::from("/tmp/kobu-from-cli"));
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(DATA_FOLDER_ENV, "/tmp/kobu-from-env");
    let toml = TomlConfig {
        data_folder: Some(PathBuf::from("/tmp/kobu-from-toml")),
        ..Default::default()
    };

    let folder = resolve_data_folder(None, &toml);
    env::remove_var(DATA_FOLDER_ENV);

    assert_eq!(folder, PathBuf::from("/tmp/kobu-from-env"));
}

#[test]
#[serial]
fn test_toml_then_default() {
    env::remove_var(DATA_FOLDER_ENV);

    let toml = TomlConfig {
        data_folder: Some(PathBuf::from("/tmp/kobu-from-toml")),
        ..Default::default()
    };
    assert_eq!(resolve_data_folder(None, &toml), PathBuf::from("/tmp/kobu-from-toml"));
    assert_eq!(
        resolve_data_folder(None, &TomlConfig::default()),
        default_data_folder()
    );
}

#[test]
fn test_database_path() {
    let root = PathBuf::from("/tmp/kobu-test-root");
    assert_eq!(database_path(&root), root.join("kobu.db"));
}
