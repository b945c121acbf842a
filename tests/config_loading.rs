// tests/config_loading.rs

use std::fs;
use std::path::PathBuf;

use taskgraph::config::{load_and_validate, load_or_default, RawEngineConfig};
use taskgraph::errors::{ErrorKind, TaskGraphError};
use tempfile::TempDir;

fn write_config(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Taskgraph.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_or_default(dir.path().join("absent.toml")).unwrap();

    assert_eq!(cfg.storage.path, PathBuf::from(".taskgraph/tasks.db"));
    assert_eq!(cfg.archive.dir, PathBuf::from(".taskgraph/archive"));
    assert_eq!(cfg.archive.archived_by, "taskgraph");
    assert_eq!(cfg.limits.summary_max_len, 200);
    assert_eq!((cfg.limits.priority_min, cfg.limits.priority_max), (0, 10));
    assert_eq!(cfg.prune.preview_depth, 8);
    assert_eq!(cfg.limits.tree_max_nodes, 10_000);
}

#[test]
fn test_full_file_is_parsed() {
    let (_dir, path) = write_config(
        r#"
[storage]
path = "/var/lib/tasks.db"

[archive]
dir = "/var/lib/task-archive"
archived_by = "nightly-prune"

[limits]
description_max_len = 500
summary_max_len = 80
priority_min = -5
priority_max = 5
default_priority = 1
tree_max_nodes = 250

[prune]
preview_depth = 3
"#,
    );

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.storage.path, PathBuf::from("/var/lib/tasks.db"));
    assert_eq!(cfg.archive.archived_by, "nightly-prune");
    assert_eq!(cfg.limits.description_max_len, 500);
    assert_eq!(cfg.limits.priority_min, -5);
    assert_eq!(cfg.limits.default_priority, 1);
    assert_eq!(cfg.limits.tree_max_nodes, 250);
    assert_eq!(cfg.prune.preview_depth, 3);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let (_dir, path) = write_config("[archive]\narchived_by = \"ops\"\n");
    let cfg = load_or_default(&path).unwrap();
    assert_eq!(cfg.archive.archived_by, "ops");
    assert_eq!(cfg.archive.dir, PathBuf::from(".taskgraph/archive"));
    assert_eq!(cfg.limits.summary_max_len, 200);
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        "[limits]\npriority_min = 5\npriority_max = 1\ndefault_priority = 5\n",
        "[limits]\ndefault_priority = 42\n",
        "[limits]\nsummary_max_len = 0\n",
        "[prune]\npreview_depth = 0\n",
        "[limits]\ntree_max_nodes = 0\n",
        "[archive]\narchived_by = \"   \"\n",
        "[storage]\npath = \"\"\n",
    ];

    for contents in cases {
        let (_dir, path) = write_config(contents);
        let err = load_and_validate(&path).unwrap_err();
        assert!(
            matches!(err, TaskGraphError::ConfigError(_)),
            "Expected ConfigError for {contents:?}, got: {err:?}"
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

#[test]
fn test_malformed_toml_is_a_parse_error() {
    let (_dir, path) = write_config("[limits\nsummary_max_len = ");
    let err = load_or_default(&path).unwrap_err();
    assert!(
        matches!(err, TaskGraphError::TomlError(_)),
        "Expected TomlError, got: {err:?}"
    );
}

#[test]
fn test_raw_default_converts_cleanly() {
    let cfg = taskgraph::config::EngineConfig::try_from(RawEngineConfig::default()).unwrap();
    assert_eq!(cfg.limits.default_priority, 0);
}
