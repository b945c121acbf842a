// src/config/validate.rs

use crate::config::model::{EngineConfig, RawEngineConfig};
use crate::errors::{Result, TaskGraphError};

impl TryFrom<RawEngineConfig> for EngineConfig {
    type Error = crate::errors::TaskGraphError;

    fn try_from(raw: RawEngineConfig) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(EngineConfig::new_unchecked(raw))
    }
}

pub fn validate_config(cfg: &RawEngineConfig) -> Result<()> {
    validate_storage(cfg)?;
    validate_archive(cfg)?;
    validate_limits(cfg)?;
    validate_prune(cfg)?;
    Ok(())
}

fn validate_storage(cfg: &RawEngineConfig) -> Result<()> {
    if cfg.storage.path.as_os_str().is_empty() {
        return Err(TaskGraphError::ConfigError(
            "[storage].path must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_archive(cfg: &RawEngineConfig) -> Result<()> {
    if cfg.archive.dir.as_os_str().is_empty() {
        return Err(TaskGraphError::ConfigError(
            "[archive].dir must not be empty".to_string(),
        ));
    }
    if cfg.archive.archived_by.trim().is_empty() {
        return Err(TaskGraphError::ConfigError(
            "[archive].archived_by must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_limits(cfg: &RawEngineConfig) -> Result<()> {
    let limits = &cfg.limits;

    if limits.description_max_len == 0 {
        return Err(TaskGraphError::ConfigError(
            "[limits].description_max_len must be >= 1 (got 0)".to_string(),
        ));
    }
    if limits.summary_max_len == 0 {
        return Err(TaskGraphError::ConfigError(
            "[limits].summary_max_len must be >= 1 (got 0)".to_string(),
        ));
    }
    if limits.tree_max_nodes == 0 {
        return Err(TaskGraphError::ConfigError(
            "[limits].tree_max_nodes must be >= 1 (got 0)".to_string(),
        ));
    }
    if limits.priority_min > limits.priority_max {
        return Err(TaskGraphError::ConfigError(format!(
            "[limits].priority_min ({}) must not exceed priority_max ({})",
            limits.priority_min, limits.priority_max
        )));
    }
    if !(limits.priority_min..=limits.priority_max).contains(&limits.default_priority) {
        return Err(TaskGraphError::ConfigError(format!(
            "[limits].default_priority ({}) must lie within {}..={}",
            limits.default_priority, limits.priority_min, limits.priority_max
        )));
    }
    Ok(())
}

fn validate_prune(cfg: &RawEngineConfig) -> Result<()> {
    if cfg.prune.preview_depth == 0 {
        return Err(TaskGraphError::ConfigError(
            "[prune].preview_depth must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
