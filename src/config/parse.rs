use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string)
}

/// Parse and validate a config document that is already in memory.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    // Expand environment variables in the YAML string before parsing
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;

    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = env_var_pattern()
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=<value>\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables (e.g., export AWS_REGION=us-east-1)\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn expand_paths(config: &mut Config) {
    config.checkpoint.path = expand_tilde(&config.checkpoint.path);
    if let Some(path) = config.output.path.as_mut() {
        *path = expand_tilde(path);
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.sources.is_empty() {
        errors.push("config must define at least one entry under 'sources'".to_string());
    }

    let mut source_ids: Vec<&String> = config.sources.keys().collect();
    source_ids.sort();
    for source_id in source_ids {
        errors.extend(validate_source(source_id, &config.sources[source_id]));
    }

    if config.checkpoint.path.as_os_str().is_empty() {
        errors.push("checkpoint.path cannot be empty".to_string());
    }

    if config.poll.max_backoff < config.poll.retry_backoff {
        errors.push("poll.max_backoff must not be smaller than poll.retry_backoff".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

/// Problems with a single source definition, empty when it is usable.
///
/// A stream-level source needs exactly one way of picking its stream: a
/// fixed `log_stream` or `follow_latest`. A group-level source reads the
/// whole group and accepts neither.
pub fn validate_source(source_id: &str, source: &SourceConfig) -> Vec<String> {
    let prefix = format!("source '{}'", source_id);
    let mut errors = Vec::new();

    if source.region.trim().is_empty() {
        errors.push(format!("{}: region cannot be empty", prefix));
    }

    if source.log_group.trim().is_empty() {
        errors.push(format!("{}: log_group cannot be empty", prefix));
    }

    if source.max_pages == 0 {
        errors.push(format!("{}: max_pages must be at least 1", prefix));
    }

    if let Some(limit) = source.page_limit {
        if limit <= 0 {
            errors.push(format!("{}: page_limit must be positive", prefix));
        }
    }

    if let Some(topic) = &source.topic {
        if topic.trim().is_empty() {
            errors.push(format!("{}: topic cannot be empty when set", prefix));
        }
    }

    let has_stream = source
        .log_stream
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());

    match source.partition {
        PartitionScheme::Stream => {
            if source.follow_latest && has_stream {
                errors.push(format!(
                    "{}: log_stream and follow_latest are mutually exclusive",
                    prefix
                ));
            } else if !source.follow_latest && !has_stream {
                errors.push(format!(
                    "{}: log_stream is required unless follow_latest is enabled",
                    prefix
                ));
            }
        }
        PartitionScheme::Group => {
            if has_stream || source.follow_latest {
                errors.push(format!(
                    "{}: group partitioning reads the whole log group and does not accept log_stream or follow_latest",
                    prefix
                ));
            }
        }
    }

    errors
}
