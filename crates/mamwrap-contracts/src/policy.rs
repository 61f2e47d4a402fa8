//! Policy identity and flag-map types.
//!
//! A caller selects policies by numeric id; the encoder resolves each id to a
//! `PolicyKind` through the catalog and records the result in an
//! `ActiveFlagMap`, which is sent verbatim as the `data` parameter of a wrap
//! request.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::MamError;

/// The closed set of policies the platform can wrap into an application.
///
/// Serialized by canonical name (e.g. `"ibm_vpn"`, `"dynamicauth"`), which is
/// also the key used in the wrap request's flag map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    IbmVpn,
    DataInUse,
    DataAtRest,
    #[serde(rename = "rootprotection")]
    RootProtection,
    EncryptedChecksumValidation,
    SecuritySettingsCheck,
    #[serde(rename = "versioncontrol")]
    VersionControl,
    #[serde(rename = "iprestriction")]
    IpRestriction,
    LogBlocking,
    VpnConfig,
    ChecksumValidation,
    #[serde(rename = "dynamicauth")]
    DynamicAuth,
    #[serde(rename = "datawipe")]
    DataWipe,
    AppUsage,
    CrashLog,
    EmmCompliance,
    DeviceMdm,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 17] = [
        PolicyKind::IbmVpn,
        PolicyKind::DataInUse,
        PolicyKind::DataAtRest,
        PolicyKind::RootProtection,
        PolicyKind::EncryptedChecksumValidation,
        PolicyKind::SecuritySettingsCheck,
        PolicyKind::VersionControl,
        PolicyKind::IpRestriction,
        PolicyKind::LogBlocking,
        PolicyKind::VpnConfig,
        PolicyKind::ChecksumValidation,
        PolicyKind::DynamicAuth,
        PolicyKind::DataWipe,
        PolicyKind::AppUsage,
        PolicyKind::CrashLog,
        PolicyKind::EmmCompliance,
        PolicyKind::DeviceMdm,
    ];

    /// The key this policy occupies in the wrap request's flag map.
    pub fn canonical_name(self) -> &'static str {
        match self {
            PolicyKind::IbmVpn => "ibm_vpn",
            PolicyKind::DataInUse => "data_in_use",
            PolicyKind::DataAtRest => "data_at_rest",
            PolicyKind::RootProtection => "rootprotection",
            PolicyKind::EncryptedChecksumValidation => "encrypted_checksum_validation",
            PolicyKind::SecuritySettingsCheck => "security_settings_check",
            PolicyKind::VersionControl => "versioncontrol",
            PolicyKind::IpRestriction => "iprestriction",
            PolicyKind::LogBlocking => "log_blocking",
            PolicyKind::VpnConfig => "vpn_config",
            PolicyKind::ChecksumValidation => "checksum_validation",
            PolicyKind::DynamicAuth => "dynamicauth",
            PolicyKind::DataWipe => "datawipe",
            PolicyKind::AppUsage => "app_usage",
            PolicyKind::CrashLog => "crash_log",
            PolicyKind::EmmCompliance => "emm_compliance",
            PolicyKind::DeviceMdm => "device_mdm",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl FromStr for PolicyKind {
    type Err = MamError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        PolicyKind::ALL
            .into_iter()
            .find(|kind| kind.canonical_name() == value)
            .ok_or_else(|| MamError::Config {
                reason: format!("unknown policy name '{value}'"),
            })
    }
}

/// The value of one entry in the flag map.
///
/// On the wire: `Off` is `0`, `On` is `1`, `Unsupported` is `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagValue {
    Off,
    On,
    /// Legacy policies the platform still lists but that cannot be toggled.
    Unsupported,
}

impl Serialize for FlagValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FlagValue::Off => serializer.serialize_u8(0),
            FlagValue::On => serializer.serialize_u8(1),
            FlagValue::Unsupported => serializer.serialize_none(),
        }
    }
}

/// Canonical policy name → flag value, for every name the platform knows.
///
/// Built once per wrap request by the encoder and never modified afterwards;
/// there are deliberately no mutating methods. Keys are kept sorted so the
/// serialized form is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActiveFlagMap {
    flags: BTreeMap<String, FlagValue>,
}

impl ActiveFlagMap {
    pub fn new(flags: BTreeMap<String, FlagValue>) -> Self {
        Self { flags }
    }

    pub fn get(&self, name: &str) -> Option<FlagValue> {
        self.flags.get(name).copied()
    }

    /// True only when `name` is present and set to `On`.
    pub fn is_on(&self, name: &str) -> bool {
        self.get(name) == Some(FlagValue::On)
    }

    /// Canonical names currently set to `On`, in sorted order.
    pub fn active_names(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .filter(|(_, value)| **value == FlagValue::On)
            .map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FlagValue)> {
        self.flags.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
