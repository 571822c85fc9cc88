//! File format tests (JSON, TOML, YAML).
//!
//! Every test writes into its own temporary directory, so tests can run in
//! parallel without sharing paths.

#![allow(clippy::pedantic)]
#![cfg(feature = "file-all")]

use std::fs;
use std::path::PathBuf;

use confwatch::file::{self, FileError, FileFormat};
use confwatch::{ConfigTree, Error, Layers, Value};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn load(dir: &TempDir, name: &str, content: &str) -> ConfigTree {
    let path = write(dir, name, content);
    file::parse_file(&path, true).unwrap().unwrap()
}

// ============================================================================
// Equivalent Documents
// ============================================================================

#[test]
fn test_same_document_in_every_format() {
    let dir = TempDir::new().unwrap();

    let json = load(
        &dir,
        "app.json",
        r#"{"server": {"host": "0.0.0.0", "port": 8080, "tags": ["a", "b"]}, "debug": false}"#,
    );
    let toml = load(
        &dir,
        "app.toml",
        r#"
debug = false

[server]
host = "0.0.0.0"
port = 8080
tags = ["a", "b"]
"#,
    );
    let yaml = load(
        &dir,
        "app.yaml",
        r#"
server:
  host: "0.0.0.0"
  port: 8080
  tags: [a, b]
debug: false
"#,
    );

    assert_eq!(json, toml);
    assert_eq!(json, yaml);
    assert_eq!(json.digest().unwrap(), yaml.digest().unwrap());
}

#[test]
fn test_yml_extension() {
    let dir = TempDir::new().unwrap();
    let tree = load(&dir, "app.yml", "name: svc\n");
    assert_eq!(tree.get("name").and_then(Value::as_str), Some("svc"));
}

#[test]
fn test_yaml_null_is_not_absent() {
    let dir = TempDir::new().unwrap();
    let tree = load(&dir, "nulls.yaml", "present: ~\n");

    assert_eq!(tree.get("present"), Some(&Value::Null));
    assert_eq!(tree.get("missing"), None);
}

#[test]
fn test_toml_integer_and_float_stay_distinct() {
    let tree = file::parse_str("a = 1\nb = 1.0\n", FileFormat::Toml).unwrap();

    assert_eq!(tree.get("a"), Some(&Value::Integer(1)));
    assert_eq!(tree.get("b"), Some(&Value::Float(1.0)));
}

#[test]
fn test_toml_array_of_tables() {
    let tree = file::parse_str(
        r#"
[[upstream]]
host = "a"

[[upstream]]
host = "b"
"#,
        FileFormat::Toml,
    )
    .unwrap();

    assert_eq!(tree.get("upstream.1.host").and_then(Value::as_str), Some("b"));
    assert!(tree.flattened_paths().contains(&"upstream.0".to_string()));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_missing_required_file() {
    let dir = TempDir::new().unwrap();
    let err = file::parse_file(&dir.path().join("absent.toml"), true).unwrap_err();
    assert!(matches!(err, Error::File(FileError::NotFound { .. })));
}

#[test]
fn test_missing_optional_file() {
    let dir = TempDir::new().unwrap();
    let loaded = file::parse_file(&dir.path().join("absent.toml"), false).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_unknown_extension() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "app.ini", "[a]\nb=1\n");
    let err = file::parse_file(&path, true).unwrap_err();
    assert!(matches!(
        err,
        Error::File(FileError::UnknownFormat { ref extension }) if extension == "ini"
    ));
}

#[test]
fn test_malformed_files_report_parse_errors() {
    let dir = TempDir::new().unwrap();
    let cases = [
        ("bad.json", "{\"a\": 1,}"),
        ("bad.toml", "a = = 1\n"),
        ("bad.yaml", "a: [1, 2\n"),
    ];

    for (name, content) in cases {
        let path = write(&dir, name, content);
        let err = file::parse_file(&path, true).unwrap_err();
        assert!(
            matches!(
                err,
                Error::File(FileError::Parse { .. } | FileError::ParseNoSpan { .. })
            ),
            "{name}: unexpected error {err:?}"
        );
    }
}

#[test]
fn test_list_root_is_rejected() {
    let err = file::parse_str("[1, 2]", FileFormat::Json).unwrap_err();
    assert!(matches!(err, Error::InvalidRoot { found: "list" }));
}

#[test]
fn test_diagnostic_codes() {
    use miette::Diagnostic;

    let err = file::parse_str("{", FileFormat::Json).unwrap_err();
    let code = err.code().map(|c| c.to_string());
    assert_eq!(code.as_deref(), Some("confwatch::file::parse_error"));
}

// ============================================================================
// Layering Files
// ============================================================================

#[test]
fn test_layered_files() {
    let dir = TempDir::new().unwrap();
    let base = load(
        &dir,
        "base.toml",
        "[db]\nhost = \"localhost\"\nport = 5432\n",
    );
    let local = load(&dir, "local.json", r#"{"db": {"port": 6543}}"#);
    let flags = load(&dir, "flags.yaml", "beta: true\n");

    let merged = Layers::new()
        .layer(base)
        .layer(local)
        .prefixed("features", flags)
        .merge();

    assert_eq!(merged.get("db.host").and_then(Value::as_str), Some("localhost"));
    assert_eq!(merged.get("db.port").and_then(Value::to_i64), Some(6543));
    assert_eq!(merged.get("features.beta").and_then(Value::as_bool), Some(true));
}
