//! Stored signing credentials.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::Psk;

/// A signing credential stored for the organization.
///
/// Only the psk is needed to sign; everything else the platform reports
/// (platform, description, expiry) is kept as-is for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub psk: Psk,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
