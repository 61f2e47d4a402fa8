//! Desired-versus-stored policy reconciliation.
//!
//! Everything here is a pure function of its arguments. The snapshot is only
//! read, never changed, so the same inputs always produce the same action.

use tracing::debug;

use mamwrap_contracts::{
    ids::Psk,
    rule::{ExistingPolicySnapshot, PolicyPayload, ReconciliationAction, SynthesizedRule},
};

/// The policy-level condition: every rule name double-quoted, joined by
/// `" && "` in the order given. No rules gives an empty string.
pub fn operation_pattern(rules: &[SynthesizedRule]) -> String {
    rules
        .iter()
        .map(|rule| format!("\"{}\"", rule.name))
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Name given to the one dynamic policy an application version carries.
pub fn policy_name(app_psk: &Psk) -> String {
    format!("MyDynamicPolicy_appPsk{}", app_psk)
}

pub fn policy_description(app_psk: &Psk) -> String {
    format!("Placeholder description for app psk {}", app_psk)
}

/// Decide the single change that turns `existing` into `rules`.
///
/// | rules    | stored rules | action |
/// |----------|--------------|--------|
/// | empty    | none         | NONE   |
/// | empty    | some         | DELETE |
/// | nonempty | none         | CREATE |
/// | nonempty | some         | UPDATE |
pub fn reconcile(
    rules: Vec<SynthesizedRule>,
    existing: &ExistingPolicySnapshot,
    app_psk: &Psk,
    version_psk: &Psk,
) -> ReconciliationAction {
    let had_existing = existing.has_rules();
    let policy_psk = existing.policy_psk().cloned();

    let action = if rules.is_empty() {
        if had_existing {
            ReconciliationAction::Delete {
                version_psk: version_psk.clone(),
                policy_psk,
            }
        } else {
            ReconciliationAction::None
        }
    } else {
        let payload = PolicyPayload {
            name: policy_name(app_psk),
            version_psk: version_psk.clone(),
            description: policy_description(app_psk),
            operation_pattern: operation_pattern(&rules),
            rules,
        };
        if had_existing {
            ReconciliationAction::Update { policy_psk, payload }
        } else {
            ReconciliationAction::Create(payload)
        }
    };

    debug!(
        app_psk = %app_psk,
        version_psk = %version_psk,
        had_existing,
        action = action.label(),
        "policy reconciled"
    );

    action
}
