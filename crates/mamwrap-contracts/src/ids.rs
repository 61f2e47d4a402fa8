//! Identifier types.
//!
//! The platform assigns a persistent surrogate key ("psk") to every resource:
//! applications, versions, rules, policies, credentials, users. Depending on
//! the endpoint a psk arrives as a JSON number or a JSON string. `Psk`
//! accepts both, compares by its textual form, and is sent back in the form
//! it arrived in.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

/// A platform-assigned persistent surrogate key.
///
/// Example: Psk("40213")
#[derive(Debug, Clone)]
pub struct Psk {
    text: String,
    /// Set when the psk arrived as a JSON number.
    number: Option<Number>,
}

impl Psk {
    /// Construct a psk that serializes as a JSON string.
    pub fn new(value: impl Into<String>) -> Self {
        Self { text: value.into(), number: None }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// True when this psk serializes as a JSON number.
    pub fn is_numeric(&self) -> bool {
        self.number.is_some()
    }
}

impl PartialEq for Psk {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Psk {}

impl Hash for Psk {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl fmt::Display for Psk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Psk {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for Psk {
    fn from(value: u64) -> Self {
        Self { text: value.to_string(), number: Some(Number::from(value)) }
    }
}

impl Serialize for Psk {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.number {
            Some(number) => number.serialize(serializer),
            None => serializer.serialize_str(&self.text),
        }
    }
}

impl<'de> Deserialize<'de> for Psk {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Psk::new(text),
            Raw::Number(number) => Psk { text: number.to_string(), number: Some(number) },
        })
    }
}

/// Client-side correlation id for one wrap or signing job.
///
/// Never sent to the platform; it only ties together the log lines and poll
/// records produced while a driver runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub uuid::Uuid);

impl JobId {
    /// Create a new, unique job id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
