//! Selection → flag map encoding.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use mamwrap_contracts::{
    error::{MamError, MamResult},
    policy::{ActiveFlagMap, FlagValue},
};

use crate::catalog::{PolicyCatalog, PolicyDefinition};

/// Flags the platform still lists that have no catalog entry. They default
/// to off and can never be selected.
pub const LEGACY_TOGGLEABLE: [&str; 4] = ["remotecontrol", "copypaste", "dar", "jailbreak"];

/// Flags the platform lists but does not allow toggling.
pub const UNSUPPORTED: [&str; 8] = [
    "geofencing",
    "pin",
    "expiration",
    "fakeloc",
    "vpn",
    "lockout",
    "appfederation",
    "smartfirewall",
];

/// The policy ids a caller asked for, in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySelection {
    ids: Vec<u32>,
}

impl PolicySelection {
    pub fn new(ids: impl IntoIterator<Item = u32>) -> Self {
        Self { ids: ids.into_iter().collect() }
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Turns a `PolicySelection` into the flag map sent with a wrap request.
#[derive(Debug, Clone, Copy)]
pub struct PolicyEncoder<'c> {
    catalog: &'c PolicyCatalog,
}

impl<'c> PolicyEncoder<'c> {
    pub fn new(catalog: &'c PolicyCatalog) -> Self {
        Self { catalog }
    }

    /// The flag map with nothing selected.
    pub fn defaults(&self) -> BTreeMap<String, FlagValue> {
        let mut flags = BTreeMap::new();
        for definition in self.catalog.definitions() {
            flags.insert(definition.kind.canonical_name().to_string(), FlagValue::Off);
        }
        for name in LEGACY_TOGGLEABLE {
            flags.insert(name.to_string(), FlagValue::Off);
        }
        for name in UNSUPPORTED {
            flags.insert(name.to_string(), FlagValue::Unsupported);
        }
        flags
    }

    /// Encode `selection` into a flag map.
    ///
    /// Every id is resolved before anything is built: a single unknown id
    /// fails the whole call with `MamError::UnknownPolicy` and no map is
    /// produced. The result does not depend on selection order or on
    /// duplicate ids.
    pub fn encode(&self, selection: &PolicySelection) -> MamResult<ActiveFlagMap> {
        let resolved = selection
            .ids()
            .iter()
            .map(|&id| {
                self.catalog.by_id(id).ok_or_else(|| {
                    warn!(policy_id = id, "selected policy id has no catalog entry");
                    MamError::UnknownPolicy { id }
                })
            })
            .collect::<MamResult<Vec<&PolicyDefinition>>>()?;

        let mut flags = self.defaults();
        for definition in resolved {
            flags.insert(definition.kind.canonical_name().to_string(), FlagValue::On);
        }

        let map = ActiveFlagMap::new(flags);
        debug!(
            selected = selection.ids().len(),
            active = map.active_names().count(),
            "policy selection encoded"
        );
        Ok(map)
    }
}
