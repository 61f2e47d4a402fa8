//! The policy catalog: one definition per wrappable policy.
//!
//! The catalog is declared in TOML and validated when it is loaded, so an
//! unknown or duplicated policy is caught once at startup instead of on every
//! lookup. The built-in catalog ships inside the crate; callers can load an
//! alternative one with `from_toml_str` or `from_file`.
//!
//! Example entry:
//! ```toml
//! [[policies]]
//! id = 12
//! kind = "datawipe"
//! display_name = "Datawipe"
//! description = "Wipes all data from an application if requested by an administrator."
//! operation_pattern = "(facts['com.apperian.application.datawipe'])"
//! success_action = { id = "datawipe" }
//! fail_action = { id = "keepcalmandcarryon.lol" }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use mamwrap_contracts::{
    error::{MamError, MamResult},
    policy::PolicyKind,
};

const BUILTIN_CATALOG: &str = include_str!("../policies/catalog.toml");

/// An action directive template. `id` is relative to the catalog's
/// `action_prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub id: String,
    #[serde(default)]
    pub params: String,
}

/// A single catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    /// The number callers select this policy by.
    pub id: u32,

    pub kind: PolicyKind,

    /// Rule name on the platform. Existing rules are matched by this name.
    pub display_name: String,

    pub description: String,

    /// Boolean expression over platform facts. Opaque to this client and
    /// sent exactly as written.
    pub operation_pattern: String,

    pub success_action: ActionTemplate,

    pub fail_action: ActionTemplate,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    action_prefix: String,
    policies: Vec<PolicyDefinition>,
}

/// The validated, immutable set of policy definitions.
///
/// Iteration order is declaration order, which is also the order rules are
/// synthesized in.
#[derive(Debug, Clone)]
pub struct PolicyCatalog {
    action_prefix: String,
    definitions: Vec<PolicyDefinition>,
}

impl PolicyCatalog {
    /// Load the catalog compiled into this crate.
    pub fn builtin() -> MamResult<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Parse `s` as a TOML catalog and validate it.
    ///
    /// Returns `MamError::Config` if the TOML is malformed or if the entries
    /// do not cover every `PolicyKind` exactly once with unique ids.
    pub fn from_toml_str(s: &str) -> MamResult<Self> {
        let file: CatalogFile = toml::from_str(s).map_err(|e| MamError::Config {
            reason: format!("failed to parse policy catalog TOML: {}", e),
        })?;
        validate(&file.policies)?;

        debug!(
            policies = file.policies.len(),
            action_prefix = %file.action_prefix,
            "policy catalog loaded"
        );

        Ok(Self {
            action_prefix: file.action_prefix,
            definitions: file.policies,
        })
    }

    /// Read the file at `path` and parse it as a TOML catalog.
    pub fn from_file(path: &Path) -> MamResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| MamError::Config {
            reason: format!("failed to read policy catalog '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn by_id(&self, id: u32) -> Option<&PolicyDefinition> {
        self.definitions.iter().find(|definition| definition.id == id)
    }

    pub fn by_kind(&self, kind: PolicyKind) -> Option<&PolicyDefinition> {
        self.definitions.iter().find(|definition| definition.kind == kind)
    }

    /// All definitions in declaration order.
    pub fn definitions(&self) -> &[PolicyDefinition] {
        &self.definitions
    }

    pub fn action_prefix(&self) -> &str {
        &self.action_prefix
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn validate(definitions: &[PolicyDefinition]) -> MamResult<()> {
    let mut ids = HashSet::new();
    let mut kinds = HashSet::new();

    for definition in definitions {
        if !ids.insert(definition.id) {
            return Err(MamError::Config {
                reason: format!("policy id {} is declared more than once", definition.id),
            });
        }
        if !kinds.insert(definition.kind) {
            return Err(MamError::Config {
                reason: format!("policy '{}' is declared more than once", definition.kind),
            });
        }
    }

    if let Some(missing) = PolicyKind::ALL.into_iter().find(|kind| !kinds.contains(kind)) {
        return Err(MamError::Config {
            reason: format!("policy '{}' has no catalog entry", missing),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use mamwrap_contracts::{error::MamError, policy::PolicyKind};

    use super::PolicyCatalog;

    fn entry(id: u32, kind: &str) -> String {
        format!(
            r#"
            [[policies]]
            id = {id}
            kind = "{kind}"
            display_name = "{kind}"
            description = "test"
            operation_pattern = "(true)"
            success_action = {{ id = "keepcalmandcarryon.lol" }}
            fail_action = {{ id = "keepcalmandcarryon.lol" }}
            "#
        )
    }

    fn catalog_with(entries: &[(u32, &str)]) -> String {
        let mut toml = String::from("action_prefix = \"com.apperian.\"\n");
        for (id, kind) in entries {
            toml.push_str(&entry(*id, kind));
        }
        toml
    }

    fn full_entries() -> Vec<(u32, &'static str)> {
        PolicyKind::ALL
            .into_iter()
            .enumerate()
            .map(|(index, kind)| (index as u32, kind.canonical_name()))
            .collect()
    }

    #[test]
    fn test_builtin_catalog_covers_every_policy() {
        let catalog = PolicyCatalog::builtin().unwrap();
        assert_eq!(catalog.len(), 17);
        for kind in PolicyKind::ALL {
            assert!(catalog.by_kind(kind).is_some(), "missing {kind}");
        }
        assert_eq!(catalog.action_prefix(), "com.apperian.");
    }

    /// Ids are the numbers the platform assigns, independent of declaration order.
    #[test]
    fn test_builtin_catalog_ids() {
        let catalog = PolicyCatalog::builtin().unwrap();
        let expected = [
            (0, PolicyKind::IbmVpn),
            (1, PolicyKind::DataInUse),
            (2, PolicyKind::DataAtRest),
            (3, PolicyKind::RootProtection),
            (4, PolicyKind::EncryptedChecksumValidation),
            (5, PolicyKind::SecuritySettingsCheck),
            (6, PolicyKind::VersionControl),
            (7, PolicyKind::IpRestriction),
            (8, PolicyKind::LogBlocking),
            (9, PolicyKind::VpnConfig),
            (10, PolicyKind::ChecksumValidation),
            (11, PolicyKind::DynamicAuth),
            (12, PolicyKind::DataWipe),
            (13, PolicyKind::AppUsage),
            (14, PolicyKind::CrashLog),
            (15, PolicyKind::EmmCompliance),
            (16, PolicyKind::DeviceMdm),
        ];
        for (id, kind) in expected {
            assert_eq!(catalog.by_id(id).map(|d| d.kind), Some(kind), "id {id}");
        }
        assert!(catalog.by_id(17).is_none());
    }

    #[test]
    fn test_builtin_catalog_device_mdm_block_params() {
        let catalog = PolicyCatalog::builtin().unwrap();
        let mdm = catalog.by_kind(PolicyKind::DeviceMdm).unwrap();
        assert_eq!(mdm.fail_action.id, "block");
        assert!(mdm.fail_action.params.contains("not enrolled in MDM"));
        assert_eq!(mdm.success_action.params, "");
    }

    /// Patterns are sent byte for byte, whitespace runs included.
    #[test]
    fn test_builtin_catalog_versioncontrol_pattern_exact() {
        let catalog = PolicyCatalog::builtin().unwrap();
        let expected = format!(
            "((typeof(facts['com.apperian.application.version']) === 'undefined'{}\
             && facts['com.apperian.apps.installedversion'] !== -1 \
             && facts['com.apperian.apps.latestversion'] > facts['com.apperian.apps.installedversion']){}\
             || (facts['com.apperian.apps.latestversion'] > facts['com.apperian.application.version']))",
            " ".repeat(33),
            " ".repeat(32),
        );
        let definition = catalog.by_kind(PolicyKind::VersionControl).unwrap();
        assert_eq!(definition.operation_pattern, expected);
    }

    #[test]
    fn test_custom_catalog_loads() {
        let catalog = PolicyCatalog::from_toml_str(&catalog_with(&full_entries())).unwrap();
        assert_eq!(catalog.len(), 17);
        assert_eq!(catalog.definitions()[0].kind, PolicyKind::ALL[0]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut entries = full_entries();
        entries[1].0 = entries[0].0;

        match PolicyCatalog::from_toml_str(&catalog_with(&entries)) {
            Err(MamError::Config { reason }) => {
                assert!(reason.contains("declared more than once"), "got: {reason}");
            }
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_kind_rejected() {
        let mut entries = full_entries();
        entries.pop();

        match PolicyCatalog::from_toml_str(&catalog_with(&entries)) {
            Err(MamError::Config { reason }) => {
                assert!(reason.contains("device_mdm"), "got: {reason}");
            }
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut entries = full_entries();
        entries.push((40, "geofencing"));

        assert!(matches!(
            PolicyCatalog::from_toml_str(&catalog_with(&entries)),
            Err(MamError::Config { .. })
        ));
    }

    #[test]
    fn test_catalog_parse_error() {
        match PolicyCatalog::from_toml_str("this is not valid toml ][[[") {
            Err(MamError::Config { reason }) => {
                assert!(reason.contains("failed to parse policy catalog TOML"));
            }
            other => panic!("expected Config error, got {:?}", other),
        }
    }
}
