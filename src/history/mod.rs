use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::Context as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Field name → value map as delivered in `changedValues` / `oldValues`.
pub type ValueMap = BTreeMap<String, Value>;

/// Database mutation recorded by the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Insert,
    Update,
    Delete,
    /// Anything else the audit trigger reports (e.g. `TRUNCATE`), kept verbatim.
    Unknown(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Unknown(raw) => raw,
        }
    }

    /// Wire form: the three known actions in any case, anything else as `Unknown`.
    pub fn from_wire(raw: &str) -> Self {
        raw.parse()
            .unwrap_or_else(|_| Self::Unknown(raw.trim().to_string()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action '{0}' (expected INSERT, UPDATE or DELETE)")]
pub struct ParseActionError(pub String);

impl FromStr for Action {
    type Err = ParseActionError;

    /// Case-insensitive. Only the three known actions parse: templates can
    /// only target other actions through the `*` wildcard.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ParseActionError(s.to_string())),
        }
    }
}

/// One audit-log entry describing a single database mutation relevant to a move.
///
/// Mirrors the backend's `MoveAuditHistory` payload; keys are camelCase on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub action: Action,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub table_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub changed_values: ValueMap,
    #[serde(default, deserialize_with = "null_as_default")]
    pub old_values: ValueMap,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: Vec<ValueMap>,
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub action_tstamp_tx: Option<String>,
    #[serde(default)]
    pub session_user_first_name: Option<String>,
    #[serde(default)]
    pub session_user_last_name: Option<String>,
    #[serde(default)]
    pub session_user_email: Option<String>,
}

/// The three values a template is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventKey<'a> {
    pub action: &'a Action,
    pub event_name: Option<&'a str>,
    pub table_name: &'a str,
}

impl fmt::Display for EventKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.action,
            self.event_name.unwrap_or("<none>"),
            self.table_name
        )
    }
}

impl HistoryRecord {
    /// A bare record with no values, mostly useful for building records in code.
    pub fn new(action: Action, event_name: Option<&str>, table_name: &str) -> Self {
        Self {
            id: None,
            action,
            event_name: event_name.map(str::to_string),
            table_name: table_name.to_string(),
            changed_values: ValueMap::new(),
            old_values: ValueMap::new(),
            context: Vec::new(),
            object_id: None,
            action_tstamp_tx: None,
            session_user_first_name: None,
            session_user_last_name: None,
            session_user_email: None,
        }
    }

    pub fn key(&self) -> EventKey<'_> {
        EventKey {
            action: &self.action,
            event_name: self.event_name.as_deref(),
            table_name: &self.table_name,
        }
    }

    /// `"First Last"` of the session user, skipping missing parts.
    pub fn user_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.session_user_first_name, &self.session_user_last_name]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// Text of a changed value, or `None` when absent or null.
    pub fn changed_text(&self, field: &str) -> Option<String> {
        self.changed_values.get(field).and_then(non_empty_text)
    }

    /// Text of an old value, or `None` when absent or null.
    pub fn old_text(&self, field: &str) -> Option<String> {
        self.old_values.get(field).and_then(non_empty_text)
    }

    /// Text of a field in the `index`-th context entry.
    pub fn context_text(&self, index: usize, field: &str) -> Option<String> {
        self.context
            .get(index)
            .and_then(|entry| entry.get(field))
            .and_then(non_empty_text)
    }
}

/// Render a JSON value as display text. Strings lose their quotes, `null`
/// becomes empty, arrays are joined with `, `.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        Value::Object(_) => value.to_string(),
    }
}

fn non_empty_text(value: &Value) -> Option<String> {
    let text = value_text(value);
    if text.is_empty() { None } else { Some(text) }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

const EXPECTED_SHAPE: &str =
    "expected a JSON array of history records or a move history object with `historyRecords`";

/// Parse history records from a bare JSON array, a move history envelope
/// (`{"historyRecords": [...]}`), or a single record object.
///
/// Each record is checked on its own so an error names the offending entry.
///
/// # Errors
///
/// Returns an error if `json` is not valid JSON, has none of those shapes, or
/// contains a record that does not deserialize.
pub fn parse_records(json: &str) -> anyhow::Result<Vec<HistoryRecord>> {
    let input: Value = serde_json::from_str(json).context("history input is not valid JSON")?;
    let items = match input {
        Value::Array(items) => items,
        Value::Object(mut fields) => match fields.remove("historyRecords") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => Vec::new(),
            Some(other) => anyhow::bail!("`historyRecords` must be an array, got {other}"),
            None if fields.contains_key("action") => vec![Value::Object(fields)],
            None => {
                let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
                anyhow::bail!("{EXPECTED_SHAPE} (found keys: {})", keys.join(", "))
            }
        },
        _ => anyhow::bail!(EXPECTED_SHAPE),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item)
                .with_context(|| format!("invalid history record #{}", i + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests;
