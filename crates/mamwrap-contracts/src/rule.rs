//! Dynamic-policy rule types and the reconciliation action.
//!
//! `ExistingPolicySnapshot` is what the platform reports for an application
//! version today. `SynthesizedRule` is what the caller's selection asks for.
//! `ReconciliationAction` is the single server-side change that moves the
//! former to the latter.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::ids::Psk;

/// One action directive inside a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    /// Fully-qualified action id, e.g. `com.apperian.authenticate`.
    pub id: String,
    /// Action parameters as an opaque string; usually empty.
    pub params: String,
}

/// The actions a rule fires depending on how its condition evaluates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleActions {
    pub onsuccess: Vec<RuleAction>,
    pub onfail: Vec<RuleAction>,
}

/// A rule built from the catalog for one active policy.
///
/// `psk` is present only when a rule with the same name already exists for
/// the version, so the platform updates that rule instead of creating a new
/// one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedRule {
    pub name: String,
    #[serde(rename = "operationpattern")]
    pub operation_pattern: String,
    pub description: String,
    pub actions: RuleActions,
    /// Always empty; rule parameters are not configurable from this client.
    #[serde(default)]
    pub ruleparams: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psk: Option<Psk>,
}

/// A rule as stored on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingRule {
    pub psk: Psk,
    pub name: String,
    /// Everything else the platform returns for the rule, kept untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A dynamic policy as stored on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingPolicy {
    #[serde(default)]
    pub psk: Option<Psk>,
    #[serde(default)]
    pub rules: Vec<ExistingRule>,
}

/// The dynamic policies currently attached to one application version.
///
/// Only the first policy is meaningful; the platform attaches at most one
/// dynamic policy per version. An empty snapshot means no policy has ever
/// been saved for the version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExistingPolicySnapshot {
    #[serde(default)]
    pub policies: Vec<ExistingPolicy>,
}

impl ExistingPolicySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The psk of the version's dynamic policy, if one was ever saved.
    pub fn policy_psk(&self) -> Option<&Psk> {
        self.policies.first().and_then(|policy| policy.psk.as_ref())
    }

    /// The rules of the version's dynamic policy, in platform order.
    pub fn rules(&self) -> &[ExistingRule] {
        self.policies
            .first()
            .map(|policy| policy.rules.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_rules(&self) -> bool {
        !self.rules().is_empty()
    }

    /// The first stored rule whose name equals `name`.
    pub fn rule_named(&self, name: &str) -> Option<&ExistingRule> {
        self.rules().iter().find(|rule| rule.name == name)
    }
}

/// The body shared by create and update actions.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyPayload {
    pub name: String,
    pub version_psk: Psk,
    pub description: String,
    pub operation_pattern: String,
    pub rules: Vec<SynthesizedRule>,
}

/// The single change the wrap request asks the platform to make to the
/// version's dynamic policy.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationAction {
    /// Nothing requested now and nothing stored before.
    None,

    /// Rules were stored before and none are requested now.
    Delete {
        version_psk: Psk,
        policy_psk: Option<Psk>,
    },

    /// Rules are requested and nothing was stored before. Carries no policy
    /// psk, which is how the platform tells a create from an update.
    Create(PolicyPayload),

    /// Rules are requested and some were stored before; the stored policy
    /// psk is carried through unchanged.
    Update {
        policy_psk: Option<Psk>,
        payload: PolicyPayload,
    },
}

impl ReconciliationAction {
    /// The `action` discriminator the platform expects.
    pub fn wire_action(&self) -> &'static str {
        match self {
            ReconciliationAction::None => "nothing",
            ReconciliationAction::Delete { .. } => "delete",
            ReconciliationAction::Create(_) | ReconciliationAction::Update { .. } => "save",
        }
    }

    /// Short label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationAction::None => "none",
            ReconciliationAction::Delete { .. } => "delete",
            ReconciliationAction::Create(_) => "create",
            ReconciliationAction::Update { .. } => "update",
        }
    }

    pub fn payload(&self) -> Option<&PolicyPayload> {
        match self {
            ReconciliationAction::Create(payload) | ReconciliationAction::Update { payload, .. } => {
                Some(payload)
            }
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct WireDelete<'a> {
    versionpsk: &'a Psk,
    policy_psk: Option<&'a Psk>,
}

#[derive(Serialize)]
struct WireBody<'a> {
    name: &'a str,
    versionpsk: &'a Psk,
    description: &'a str,
    operationpattern: &'a str,
    rules: &'a [SynthesizedRule],
}

impl<'a> From<&'a PolicyPayload> for WireBody<'a> {
    fn from(payload: &'a PolicyPayload) -> Self {
        Self {
            name: &payload.name,
            versionpsk: &payload.version_psk,
            description: &payload.description,
            operationpattern: &payload.operation_pattern,
            rules: &payload.rules,
        }
    }
}

#[derive(Serialize)]
struct WireUpdate<'a> {
    policy_psk: Option<&'a Psk>,
    #[serde(flatten)]
    body: WireBody<'a>,
}

/// Serializes as `{"action": ..., "policy_data": ...}`, the shape the wrap
/// endpoint reads from `dynamicPolicyInfo.policy_data`.
impl Serialize for ReconciliationAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ReconciliationAction", 2)?;
        state.serialize_field("action", self.wire_action())?;
        match self {
            ReconciliationAction::None => {
                state.serialize_field("policy_data", &Option::<()>::None)?;
            }
            ReconciliationAction::Delete { version_psk, policy_psk } => {
                state.serialize_field(
                    "policy_data",
                    &WireDelete { versionpsk: version_psk, policy_psk: policy_psk.as_ref() },
                )?;
            }
            ReconciliationAction::Create(payload) => {
                state.serialize_field("policy_data", &WireBody::from(payload))?;
            }
            ReconciliationAction::Update { policy_psk, payload } => {
                state.serialize_field(
                    "policy_data",
                    &WireUpdate { policy_psk: policy_psk.as_ref(), body: WireBody::from(payload) },
                )?;
            }
        }
        state.end()
    }
}
