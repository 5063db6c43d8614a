//! Configuration loading tests.

use glance_executor::config::Config;
use glance_executor::statement::StatementSplitter;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from_file(&dir.path().join("absent.toml")).unwrap();

    assert_eq!(config.executor.connector.id, "postgres");
    assert_eq!(config.executor.database, "default");
    assert_eq!(config.session.channel_capacity, 32);
}

#[test]
fn test_load_full_file() {
    let file = write_config(
        r#"
[executor]
database = "warehouse"
default_limit = 250

[executor.connector]
id = "mysql"
dialect = "mysql"

[executor.variables]
year = "2024"

[session]
event_capacity = 64
"#,
    );

    let config = Config::load_from_file(file.path()).unwrap();

    assert_eq!(config.executor.database, "warehouse");
    assert_eq!(config.executor.default_limit, 250);
    assert_eq!(config.executor.connector.dialect, "mysql");
    assert_eq!(config.executor.variables["year"], "2024");
    assert_eq!(config.session.event_capacity, 64);
    assert_eq!(config.session.channel_capacity, 32);

    let splitter = StatementSplitter::from_config(&config.executor).unwrap();
    assert_eq!(splitter.dialect_name(), "mysql");
}

#[test]
fn test_invalid_toml_names_the_file() {
    let file = write_config("[executor\ndatabase = ");

    let err = Config::load_from_file(file.path()).unwrap_err();

    assert_eq!(err.category(), "Configuration Error");
    assert!(err.to_string().contains(&file.path().display().to_string()));
}

#[test]
fn test_zero_capacity_is_rejected() {
    let file = write_config("[session]\nchannel_capacity = 0\n");

    let err = Config::load_from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("greater than zero"));
}

#[test]
fn test_unknown_dialect_is_rejected() {
    let file = write_config("[executor.connector]\nid = \"x\"\ndialect = \"klingon\"\n");

    let config = Config::load_from_file(file.path()).unwrap();
    let err = StatementSplitter::from_config(&config.executor).unwrap_err();

    assert_eq!(err.category(), "Configuration Error");
}
