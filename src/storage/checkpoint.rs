use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Offset payload stored per partition: `{"timestamp": <epoch millis>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Checkpoint {
    pub timestamp: i64,
}

impl Checkpoint {
    pub fn new(timestamp: i64) -> Self {
        Self { timestamp }
    }

    pub fn to_value(self) -> Value {
        serde_json::json!({ "timestamp": self.timestamp })
    }

    /// Reads a stored offset.
    ///
    /// `Ok(None)` means nothing usable was stored (absent or JSON null).
    /// Anything else that does not carry an integer `timestamp` is rejected
    /// with a short description of what was found.
    pub fn from_value(value: &Value) -> Result<Option<Self>, String> {
        match value {
            Value::Null => Ok(None),
            Value::Object(map) => match map.get(TIMESTAMP_FIELD) {
                Some(Value::Number(n)) => n
                    .as_i64()
                    .map(|timestamp| Some(Self { timestamp }))
                    .ok_or_else(|| format!("non-integer number {}", n)),
                Some(other) => Err(describe(other).to_string()),
                None => Err(format!("object without '{}' field", TIMESTAMP_FIELD)),
            },
            other => Err(describe(other).to_string()),
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Stores only ever move a checkpoint forward. Returns true when `new`
/// should replace whatever is currently stored.
pub fn advances(existing: Option<&Value>, new: Checkpoint) -> bool {
    match existing.map(Checkpoint::from_value) {
        Some(Ok(Some(current))) => new >= current,
        // Absent or unreadable entries are overwritten
        _ => true,
    }
}
