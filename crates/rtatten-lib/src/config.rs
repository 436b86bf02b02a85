use crate::coerce::{self, Number};
use crate::error::{SessionError, SessionResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Keys that hold run or scan number lists.
pub const SEQUENCE_KEYS: [&str; 2] = ["Runs", "ScanNums"];

/// A single setting value as carried on the wire and in settings files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<ConfigValue>),
    /// Nulls and nested tables, carried through untouched.
    Other(serde_json::Value),
}

impl ConfigValue {
    pub fn empty() -> Self {
        ConfigValue::Text(String::new())
    }

    pub fn text(value: impl Into<String>) -> Self {
        ConfigValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Integer view used for fields like the subject day.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(value) => Some(*value),
            ConfigValue::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            ConfigValue::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, ConfigValue::Integer(_) | ConfigValue::Float(_))
    }

    /// True for the empty text sentinel.
    pub fn is_blank(&self) -> bool {
        matches!(self, ConfigValue::Text(text) if text.trim().is_empty())
    }

    /// Value produced by a text input bound to a field currently holding `current`.
    ///
    /// List-valued fields receive the raw text as a one-element list, which
    /// `SessionConfig::normalize_sequence` later splits on commas.
    pub fn from_input(raw: &str, current: &ConfigValue) -> Self {
        match current {
            ConfigValue::List(_) => ConfigValue::List(vec![ConfigValue::text(raw)]),
            _ => ConfigValue::text(raw),
        }
    }

    fn coerce_text(self) -> Self {
        match self {
            ConfigValue::Text(text) => {
                if let Some(flag) = coerce::parse_bool(&text) {
                    ConfigValue::Bool(flag)
                } else if let Some(number) = coerce::parse_integer(&text) {
                    ConfigValue::Integer(number)
                } else {
                    ConfigValue::Text(text)
                }
            }
            other => other,
        }
    }
}

impl Default for ConfigValue {
    fn default() -> Self {
        ConfigValue::empty()
    }
}

impl From<Number> for ConfigValue {
    fn from(number: Number) -> Self {
        match number {
            Number::Integer(value) => ConfigValue::Integer(value),
            Number::Float(value) => ConfigValue::Float(value),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<toml::Value> for ConfigValue {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(text) => ConfigValue::Text(text),
            toml::Value::Integer(value) => ConfigValue::Integer(value),
            toml::Value::Float(value) => ConfigValue::Float(value),
            toml::Value::Boolean(value) => ConfigValue::Bool(value),
            toml::Value::Datetime(stamp) => ConfigValue::Text(stamp.to_string()),
            toml::Value::Array(items) => {
                ConfigValue::List(items.into_iter().map(ConfigValue::from).collect())
            }
            table @ toml::Value::Table(_) => ConfigValue::Other(toml_to_json(table)),
        }
    }
}

fn toml_to_json(value: toml::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        toml::Value::String(text) => Value::String(text),
        toml::Value::Integer(value) => value.into(),
        toml::Value::Float(value) => serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(value) => Value::Bool(value),
        toml::Value::Datetime(stamp) => Value::String(stamp.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::text(value)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(value) => write!(f, "{value}"),
            ConfigValue::Integer(value) => write!(f, "{value}"),
            ConfigValue::Float(value) => write!(f, "{value}"),
            ConfigValue::Text(value) => f.write_str(value),
            ConfigValue::List(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            ConfigValue::Other(value) => write!(f, "{value}"),
        }
    }
}

pub type Section = BTreeMap<String, ConfigValue>;

/// Two-level session settings: section name → key → value.
///
/// Lookups by bare key scan sections in sorted order and stop at the first
/// section containing the key. Key names duplicated across sections resolve
/// to the alphabetically-first section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionConfig {
    sections: BTreeMap<String, Section>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sections(sections: BTreeMap<String, Section>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections
            .iter()
            .map(|(name, section)| (name.as_str(), section))
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn section_value(&self, section: &str, key: &str) -> Option<&ConfigValue> {
        self.sections.get(section).and_then(|entries| entries.get(key))
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    fn section_of(&self, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(_, entries)| entries.contains_key(key))
            .map(|(name, _)| name.as_str())
    }

    pub fn lookup(&self, key: &str) -> Option<&ConfigValue> {
        self.sections.values().find_map(|entries| entries.get(key))
    }

    /// Value of `key` in the first section holding it, or the empty text sentinel.
    pub fn get(&self, key: &str) -> ConfigValue {
        self.lookup(key).cloned().unwrap_or_else(ConfigValue::empty)
    }

    /// New configuration with `key` replaced in the first section holding it.
    pub fn with_value(&self, key: &str, value: ConfigValue) -> SessionResult<SessionConfig> {
        let section = self
            .section_of(key)
            .ok_or_else(|| SessionError::UnknownKey(key.to_string()))?
            .to_string();
        Ok(self.with_section_value(&section, key, value))
    }

    /// New configuration with `section.key` set, creating either as needed.
    pub fn with_section_value(
        &self,
        section: &str,
        key: &str,
        value: ConfigValue,
    ) -> SessionConfig {
        let mut next = self.clone();
        next.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value);
        next
    }

    /// Wholesale substitution, used for server snapshots and loaded files.
    pub fn replace(&mut self, other: SessionConfig) {
        *self = other;
    }

    /// Coerce every text value that reads as a boolean or a plain integer.
    pub fn normalize(&self) -> SessionConfig {
        let sections = self
            .sections
            .iter()
            .map(|(name, entries)| {
                let entries = entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone().coerce_text()))
                    .collect();
                (name.clone(), entries)
            })
            .collect();
        SessionConfig { sections }
    }

    /// Numeric list stored under `key`, splitting the one-string form `["1,2,3"]`.
    pub fn normalize_sequence(&self, key: &str) -> SessionResult<Vec<ConfigValue>> {
        let value = self.get(key);
        let items = value
            .as_list()
            .ok_or_else(|| SessionError::validation(format!("{key} must be an array")))?;
        let text_items: Vec<&str> = items.iter().filter_map(ConfigValue::as_text).collect();
        if text_items.is_empty() {
            return Ok(items.to_vec());
        }
        if text_items.len() > 1 {
            return Err(SessionError::validation(format!(
                "{key} is an ambiguous multi-string array"
            )));
        }
        if items.len() > 1 {
            return Err(SessionError::validation(format!(
                "{key} mixes numbers and text"
            )));
        }
        coerce::parse_number_list(text_items[0])
            .map(|numbers| numbers.into_iter().map(ConfigValue::from).collect())
            .map_err(|token| {
                SessionError::validation(format!("{key} contains a non-numeric entry '{token}'"))
            })
    }
}

/// Parse settings file text (toml) into a session configuration.
///
/// Every top-level key must be a section table. Native toml dates are kept
/// as their text form so the session date resolves like a quoted one.
pub fn load_config_text(text: &str) -> SessionResult<SessionConfig> {
    let table: toml::Table =
        toml::from_str(text).map_err(|err| SessionError::ConfigParse(err.to_string()))?;
    let mut sections = BTreeMap::new();
    for (name, value) in table {
        let toml::Value::Table(entries) = value else {
            return Err(SessionError::ConfigParse(format!(
                "top-level key '{name}' is not a section"
            )));
        };
        let section = entries
            .into_iter()
            .map(|(key, value)| (key, ConfigValue::from(value)))
            .collect();
        sections.insert(name, section);
    }
    Ok(SessionConfig::from_sections(sections))
}

/// Read and parse a settings file from disk.
pub fn load_config_file(path: &Path) -> Result<SessionConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = load_config_text(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}
