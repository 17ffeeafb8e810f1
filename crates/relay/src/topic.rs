//! Topic value type and prefix-subscription helpers.
//!
//! A topic is an opaque label. The only relation between a topic and a
//! message (or another topic) is byte-prefix match: `engine` matches
//! `engine/temperature` and equally `engineX`. No hierarchy is parsed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a string cannot be used as a [`Topic`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("topic must not be empty")]
    Empty,

    #[error("topic {0:?} contains whitespace")]
    Whitespace(String),
}

/// A non-empty, whitespace-free topic used both as a message label and as a
/// subscription filter.
///
/// Topics are UTF-8. The discovery service rejects requests carrying other
/// bytes instead of storing a rewritten topic.
///
/// Ordering is plain byte-lexicographic, which is the order the registry
/// reports topics in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Validate and wrap a topic string.
    pub fn new(value: impl Into<String>) -> Result<Self, TopicError> {
        let value = value.into();
        if value.is_empty() {
            return Err(TopicError::Empty);
        }
        if value.chars().any(char::is_whitespace) {
            return Err(TopicError::Whitespace(value));
        }
        Ok(Self(value))
    }

    /// Parse a comma-separated topic list.
    ///
    /// Whitespace inside an item is dropped and empty items are skipped, so
    /// `" engine/temperature , ,oil/level"` yields two topics.
    pub fn parse_list(list: &str) -> Vec<Topic> {
        list.split(',')
            .map(|item| item.chars().filter(|c| !c.is_whitespace()).collect::<String>())
            .filter(|item| !item.is_empty())
            .map(Topic)
            .collect()
    }

    /// Wrap a compile-time constant known to be a valid topic.
    pub(crate) fn from_static(value: &'static str) -> Self {
        debug_assert!(Self::new(value).is_ok(), "invalid built-in topic {value:?}");
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Whether `bytes` starts with this topic.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(self.0.as_bytes())
    }
}

/// Whether a subscriber holding `filters` would accept `bytes`.
///
/// An empty filter list is the empty prefix and accepts everything.
pub fn accepts(filters: &[Topic], bytes: &[u8]) -> bool {
    filters.is_empty() || filters.iter().any(|topic| topic.matches(bytes))
}

/// Prefixes to install on a SUB socket for the given filters.
pub fn subscription_prefixes(filters: &[Topic]) -> Vec<&str> {
    if filters.is_empty() {
        vec![""]
    } else {
        filters.iter().map(Topic::as_str).collect()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Topic {
    type Error = TopicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
