use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;

/// One action entry as written in configuration: a mapping from the action
/// kind to its fields, expected to hold exactly one key.
pub type RawAction = IndexMap<String, Value>;

/// One element of the `topics` list: topic filters mapped to their handler.
pub type TopicEntry = IndexMap<String, TopicConfig>;

/// The routing part of the configuration file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RouterConfig {
    /// Topic filters and their handlers, in declaration order.
    #[serde(default)]
    pub topics: Vec<TopicEntry>,

    /// Named actions reachable through `template` actions.
    #[serde(default)]
    pub templates: IndexMap<String, RawAction>,

    /// What to do with a message when a handler can't extract its value.
    #[serde(default)]
    pub on_extraction_error: ExtractionFailurePolicy,
}

/// Scope of an extraction failure.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionFailurePolicy {
    /// Skip the failing handler; other handlers still see the message.
    #[default]
    SkipHandler,

    /// Stop processing the message altogether.
    AbortMessage,
}

/// Configuration of a single handler.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TopicConfig {
    /// Parse the payload as JSON. Defaults to true when `jq_query` is set.
    pub load_json: Option<bool>,

    /// jq program whose first result is the value to match.
    pub jq_query: Option<String>,

    /// Template whose rendering is the value to match.
    pub jinja_query: Option<String>,

    /// Patterns and the actions they trigger.
    #[serde(default)]
    pub patterns: PatternTable,
}

/// Ordered pattern table.
///
/// Keys keep their scalar type (`1`, `"1"` and `true` are different
/// patterns), which a plain string-keyed map would lose.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatternTable(pub Vec<(Value, Vec<RawAction>)>);

impl PatternTable {
    /// Iterates over patterns in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &(Value, Vec<RawAction>)> {
        self.0.iter()
    }

    /// Number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no pattern is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

struct PatternTableVisitor;

impl<'de> Visitor<'de> for PatternTableVisitor {
    type Value = PatternTable;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping from patterns to lists of actions")
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(PatternTable::default())
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut patterns = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((pattern, actions)) = map.next_entry::<Value, Vec<RawAction>>()? {
            patterns.push((pattern, actions));
        }
        Ok(PatternTable(patterns))
    }
}

impl<'de> Deserialize<'de> for PatternTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(PatternTableVisitor)
    }
}

/// Renders a pattern the way it appears in configuration locations.
pub(crate) fn describe_pattern(pattern: &Value) -> String {
    match pattern {
        Value::String(s) => format!("{s:?}"),
        other => other.to_string(),
    }
}
