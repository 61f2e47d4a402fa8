//! Rule synthesis from the catalog.

use serde_json::Map;
use tracing::debug;

use mamwrap_contracts::{
    policy::ActiveFlagMap,
    rule::{ExistingPolicySnapshot, RuleAction, RuleActions, SynthesizedRule},
};

use crate::catalog::{ActionTemplate, PolicyCatalog, PolicyDefinition};

/// Builds the rule list for the policies switched on in a flag map.
#[derive(Debug, Clone, Copy)]
pub struct RuleSynthesizer<'c> {
    catalog: &'c PolicyCatalog,
}

impl<'c> RuleSynthesizer<'c> {
    pub fn new(catalog: &'c PolicyCatalog) -> Self {
        Self { catalog }
    }

    /// One rule per active policy, in catalog order.
    ///
    /// A rule whose name matches a stored rule in `existing` inherits that
    /// rule's psk so the platform updates it in place.
    pub fn synthesize(
        &self,
        flags: &ActiveFlagMap,
        existing: &ExistingPolicySnapshot,
    ) -> Vec<SynthesizedRule> {
        self.catalog
            .definitions()
            .iter()
            .filter(|definition| flags.is_on(definition.kind.canonical_name()))
            .map(|definition| self.build_rule(definition, existing))
            .collect()
    }

    fn build_rule(
        &self,
        definition: &PolicyDefinition,
        existing: &ExistingPolicySnapshot,
    ) -> SynthesizedRule {
        let psk = existing
            .rule_named(&definition.display_name)
            .map(|rule| rule.psk.clone());

        debug!(
            policy = %definition.kind,
            rule = %definition.display_name,
            preserved_psk = ?psk,
            "rule synthesized"
        );

        SynthesizedRule {
            name: definition.display_name.clone(),
            operation_pattern: definition.operation_pattern.clone(),
            description: definition.description.clone(),
            actions: RuleActions {
                onsuccess: vec![self.action(&definition.success_action)],
                onfail: vec![self.action(&definition.fail_action)],
            },
            ruleparams: Map::new(),
            psk,
        }
    }

    fn action(&self, template: &ActionTemplate) -> RuleAction {
        RuleAction {
            id: format!("{}{}", self.catalog.action_prefix(), template.id),
            params: template.params.clone(),
        }
    }
}
