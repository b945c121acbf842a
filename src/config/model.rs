// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [storage]
/// path = ".taskgraph/tasks.db"
///
/// [archive]
/// dir = ".taskgraph/archive"
/// archived_by = "taskgraph"
///
/// [limits]
/// summary_max_len = 200
/// priority_min = 0
/// priority_max = 10
/// tree_max_nodes = 10000
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEngineConfig {
    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub archive: ArchiveSection,

    #[serde(default)]
    pub limits: LimitsSection,

    #[serde(default)]
    pub prune: PruneSection,
}

/// Validated engine configuration.
///
/// Only obtainable through `TryFrom<RawEngineConfig>` (or `Default`), so
/// holders can rely on the invariants checked in `config::validate`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub storage: StorageSection,
    pub archive: ArchiveSection,
    pub limits: LimitsSection,
    pub prune: PruneSection,
}

impl EngineConfig {
    pub(crate) fn new_unchecked(raw: RawEngineConfig) -> Self {
        Self {
            storage: raw.storage,
            archive: raw.archive,
            limits: raw.limits,
            prune: raw.prune,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new_unchecked(RawEngineConfig::default())
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// SQLite database file, or `":memory:"` for an ephemeral store.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(".taskgraph/tasks.db")
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// `[archive]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveSection {
    /// Directory archives are written into.
    #[serde(default = "default_archive_dir")]
    pub dir: PathBuf,

    /// Identity recorded as the archiving agent in every envelope.
    #[serde(default = "default_archived_by")]
    pub archived_by: String,
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from(".taskgraph/archive")
}

fn default_archived_by() -> String {
    "taskgraph".to_string()
}

impl Default for ArchiveSection {
    fn default() -> Self {
        Self {
            dir: default_archive_dir(),
            archived_by: default_archived_by(),
        }
    }
}

/// `[limits]` section: bounds applied to enqueue requests.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsSection {
    #[serde(default = "default_description_max_len")]
    pub description_max_len: usize,

    #[serde(default = "default_summary_max_len")]
    pub summary_max_len: usize,

    #[serde(default = "default_priority_min")]
    pub priority_min: i32,

    #[serde(default = "default_priority_max")]
    pub priority_max: i32,

    /// Priority given to tasks enqueued without one.
    #[serde(default)]
    pub default_priority: i32,

    /// Most nodes a rendered tree may show. Shared dependents are repeated
    /// under every parent, so output can grow much faster than the graph.
    #[serde(default = "default_tree_max_nodes")]
    pub tree_max_nodes: usize,
}

fn default_description_max_len() -> usize {
    4000
}

fn default_summary_max_len() -> usize {
    200
}

fn default_priority_min() -> i32 {
    0
}

fn default_priority_max() -> i32 {
    10
}

fn default_tree_max_nodes() -> usize {
    10_000
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            description_max_len: default_description_max_len(),
            summary_max_len: default_summary_max_len(),
            priority_min: default_priority_min(),
            priority_max: default_priority_max(),
            default_priority: 0,
            tree_max_nodes: default_tree_max_nodes(),
        }
    }
}

/// `[prune]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PruneSection {
    /// How many levels the dry-run tree preview shows.
    #[serde(default = "default_preview_depth")]
    pub preview_depth: u32,
}

fn default_preview_depth() -> u32 {
    8
}

impl Default for PruneSection {
    fn default() -> Self {
        Self {
            preview_depth: default_preview_depth(),
        }
    }
}
