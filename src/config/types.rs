use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sources: HashMap<String, SourceConfig>,
    #[serde(default)]
    pub poll: PollConfig,
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub region: String,
    pub log_group: String,
    #[serde(default)]
    pub partition: PartitionScheme,
    #[serde(default)]
    pub log_stream: Option<String>,
    #[serde(default)]
    pub follow_latest: bool,
    /// How far back a group-level source starts when no checkpoint exists
    #[serde(default = "default_lookback", with = "duration_format")]
    pub lookback: Duration,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default)]
    pub page_limit: Option<i32>,
}

fn default_lookback() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_max_pages() -> usize {
    1
}

impl SourceConfig {
    /// Minimal stream-level source reading one fixed stream.
    pub fn for_stream(region: &str, log_group: &str, log_stream: &str) -> Self {
        Self {
            region: region.to_string(),
            log_group: log_group.to_string(),
            partition: PartitionScheme::Stream,
            log_stream: Some(log_stream.to_string()),
            follow_latest: false,
            lookback: default_lookback(),
            topic: None,
            max_pages: default_max_pages(),
            page_limit: None,
        }
    }

    /// Minimal stream-level source following the most recent stream.
    pub fn following_latest(region: &str, log_group: &str) -> Self {
        Self {
            log_stream: None,
            follow_latest: true,
            ..Self::for_stream(region, log_group, "")
        }
    }

    /// Minimal group-level source.
    pub fn for_group(region: &str, log_group: &str) -> Self {
        Self {
            partition: PartitionScheme::Group,
            log_stream: None,
            ..Self::for_stream(region, log_group, "")
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionScheme {
    /// One checkpoint per concrete log stream
    #[default]
    Stream,
    /// One checkpoint for the whole log group
    Group,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval", with = "duration_format")]
    pub interval: Duration,
    #[serde(default = "default_retry_backoff", with = "duration_format")]
    pub retry_backoff: Duration,
    #[serde(default = "default_max_backoff", with = "duration_format")]
    pub max_backoff: Duration,
}

fn default_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_retry_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(60)
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            retry_backoff: default_retry_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON-lines file to append records to; stdout when absent
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// Custom serde module for duration parsing
pub(crate) mod duration_format {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }

        let (value_str, unit) = if let Some(v) = s.strip_suffix("ms") {
            (v, "ms")
        } else if let Some(v) = s.strip_suffix('s') {
            (v, "s")
        } else if let Some(v) = s.strip_suffix('m') {
            (v, "m")
        } else if let Some(v) = s.strip_suffix('h') {
            (v, "h")
        } else if let Some(v) = s.strip_suffix('d') {
            (v, "d")
        } else {
            return Err(format!("invalid duration format: {}", s));
        };

        let value: u64 = value_str
            .trim()
            .parse()
            .map_err(|_| format!("invalid numeric value: {}", value_str))?;

        let seconds_per_unit = match unit {
            "ms" => return Ok(Duration::from_millis(value)),
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            "d" => 86400,
            _ => return Err(format!("unknown unit: {}", unit)),
        };

        value
            .checked_mul(seconds_per_unit)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration out of range: {}", s))
    }

    pub fn format_duration(d: Duration) -> String {
        let secs = d.as_secs();
        if d.subsec_millis() != 0 || secs == 0 {
            format!("{}ms", d.as_millis())
        } else if secs % 86400 == 0 {
            format!("{}d", secs / 86400)
        } else if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}
