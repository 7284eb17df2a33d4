pub mod generate;
pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub use parse::{load_config, parse_config, validate_source, ConfigError};
pub use types::{Config, PartitionScheme, PollConfig, SourceConfig};

pub(crate) fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Pattern matches $env{VAR_NAME} where VAR_NAME starts with letter or underscore
    PATTERN.get_or_init(|| {
        Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex is valid")
    })
}

/// Expands environment variables in a string.
/// Supports $env{VAR_NAME} syntax.
/// If an environment variable is not set, it's left unchanged.
pub fn expand_env_vars(text: &str) -> String {
    env_var_pattern()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let original = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            caps.get(1)
                .and_then(|name| std::env::var(name.as_str()).ok())
                .unwrap_or_else(|| original.to_string())
        })
        .to_string()
}

/// Expands tilde (~) in paths to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }

    path.to_path_buf()
}

/// Resolves the config file path based on explicit argument or default locations.
/// Returns the first existing path from:
/// 1. Explicit path (if provided, with tilde expansion)
/// 2. ~/.config/cwsource/config.yml
/// 3. /etc/cwsource/config.yml
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/cwsource/config.yml");
        if user_config.exists() {
            return Some(user_config);
        }
    }

    let system_config = PathBuf::from("/etc/cwsource/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}
