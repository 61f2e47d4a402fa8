//! Client configuration.
//!
//! Values are layered, later layers winning:
//!
//!   built-in defaults → TOML file → `MAMWRAP_*` environment → explicit overrides
//!
//! and validated once at the end. Credentials never come from the file. The
//! user may also be given as an override; the password is read from
//! `MAMWRAP_PASSWORD` only and held as a `SecretString`, as is the client
//! token, so neither shows up in `Debug` output or logs.
//!
//! Example file:
//! ```toml
//! region = "eu"
//! timeout_secs = 60
//!
//! [poll]
//! interval_secs = 10
//! max_attempts = 90
//!
//! [regions.staging]
//! rpc_url = "https://easesvc.staging.example/ease.interface.php"
//! rest_url = "https://ws.staging.example"
//! uploader_url = "https://fupload.staging.example"
//! ```

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use mamwrap_contracts::error::{MamError, MamResult};
use mamwrap_core::poll::{PollPolicy, DEFAULT_POLL_INTERVAL};

pub const DEFAULT_CONFIG_FILE: &str = "mamwrap.toml";
pub const DEFAULT_REGION: &str = "na";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The three service roots of one platform region, as configured.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionConfig {
    /// JSON-RPC endpoint. Also the base of the dynamic policy resource.
    pub rpc_url: String,
    /// REST API root.
    pub rest_url: String,
    /// File uploader root.
    pub uploader_url: String,
}

/// `RegionConfig` with every URL parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEndpoints {
    pub rpc_url: Url,
    pub rest_url: Url,
    pub uploader_url: Url,
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub regions: BTreeMap<String, RegionConfig>,
    pub region: String,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_max_attempts: Option<u32>,
    /// Alternative policy catalog; the built-in one is used when unset.
    pub catalog_path: Option<PathBuf>,
    /// Sent as `X-HTTP-Token` on RPC calls when set.
    pub client_token: Option<SecretString>,
    pub user: Option<String>,
    pub password: Option<SecretString>,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub region: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub poll_max_attempts: Option<u32>,
    pub catalog_path: Option<PathBuf>,
    pub user: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    region: Option<String>,
    timeout_secs: Option<u64>,
    catalog_path: Option<PathBuf>,
    poll: Option<PollPatch>,
    #[serde(default)]
    regions: BTreeMap<String, RegionConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PollPatch {
    interval_secs: Option<u64>,
    max_attempts: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut regions = BTreeMap::new();
        regions.insert(
            "na".to_string(),
            RegionConfig {
                rpc_url: "https://easesvc.apperian.com/ease.interface.php".to_string(),
                rest_url: "https://na01ws.apperian.com".to_string(),
                uploader_url: "https://fupload.apperian.com".to_string(),
            },
        );
        regions.insert(
            "eu".to_string(),
            RegionConfig {
                rpc_url: "https://easesvc.apperian.eu/ease.interface.php".to_string(),
                rest_url: "https://eu01ws.apperian.eu".to_string(),
                uploader_url: "https://fupload.apperian.eu".to_string(),
            },
        );

        Self {
            regions,
            region: DEFAULT_REGION.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            poll_max_attempts: None,
            catalog_path: None,
            client_token: None,
            user: None,
            password: None,
        }
    }
}

impl ClientConfig {
    pub fn load(options: LoadOptions) -> MamResult<Self> {
        let mut config = Self::default();

        if let Some(path) = resolve_config_path(options.config_path.as_deref()) {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
            debug!(path = %path.display(), "config file applied");
        } else if let Some(path) = options.config_path {
            return Err(MamError::Config {
                reason: format!("config file '{}' does not exist", path.display()),
            });
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// The parsed endpoints of the selected region.
    pub fn endpoints(&self) -> MamResult<RegionEndpoints> {
        let region = self.regions.get(&self.region).ok_or_else(|| MamError::Config {
            reason: format!(
                "unknown region '{}' (known: {})",
                self.region,
                self.regions.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        })?;
        parse_region(&self.region, region)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.poll_max_attempts,
        }
    }

    pub fn validate(&self) -> MamResult<()> {
        for (name, region) in &self.regions {
            parse_region(name, region)?;
        }
        self.endpoints()?;
        if self.timeout_secs == 0 {
            return Err(MamError::Config {
                reason: "timeout_secs must be greater than zero".to_string(),
            });
        }
        if self.poll_max_attempts == Some(0) {
            return Err(MamError::Config {
                reason: "poll.max_attempts must be at least 1; leave it unset to poll without bound"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(region) = patch.region {
            self.region = region;
        }
        if let Some(timeout_secs) = patch.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        if let Some(catalog_path) = patch.catalog_path {
            self.catalog_path = Some(catalog_path);
        }
        if let Some(poll) = patch.poll {
            if let Some(interval_secs) = poll.interval_secs {
                self.poll_interval_secs = interval_secs;
            }
            if let Some(max_attempts) = poll.max_attempts {
                self.poll_max_attempts = Some(max_attempts);
            }
        }
        self.regions.extend(patch.regions);
    }

    fn apply_env_overrides(&mut self) -> MamResult<()> {
        if let Some(value) = read_env("MAMWRAP_REGION") {
            self.region = value;
        }
        if let Some(value) = read_env("MAMWRAP_TIMEOUT_SECS") {
            self.timeout_secs = parse_number("MAMWRAP_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("MAMWRAP_POLL_INTERVAL_SECS") {
            self.poll_interval_secs = parse_number("MAMWRAP_POLL_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("MAMWRAP_POLL_MAX_ATTEMPTS") {
            self.poll_max_attempts = Some(parse_number("MAMWRAP_POLL_MAX_ATTEMPTS", &value)?);
        }
        if let Some(value) = read_env("MAMWRAP_CATALOG") {
            self.catalog_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("MAMWRAP_HTTP_TOKEN") {
            self.client_token = Some(value.into());
        }
        if let Some(value) = read_env("MAMWRAP_USER") {
            self.user = Some(value);
        }
        if let Some(value) = read_env("MAMWRAP_PASSWORD") {
            self.password = Some(value.into());
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(region) = overrides.region {
            self.region = region;
        }
        if let Some(interval_secs) = overrides.poll_interval_secs {
            self.poll_interval_secs = interval_secs;
        }
        if let Some(max_attempts) = overrides.poll_max_attempts {
            self.poll_max_attempts = Some(max_attempts);
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog_path = Some(catalog_path);
        }
        if let Some(user) = overrides.user {
            self.user = Some(user);
        }
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }
    if let Some(path) = read_env("MAMWRAP_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> MamResult<ConfigPatch> {
    let contents = std::fs::read_to_string(path).map_err(|e| MamError::Config {
        reason: format!("could not read config file '{}': {}", path.display(), e),
    })?;
    toml::from_str(&contents).map_err(|e| MamError::Config {
        reason: format!("could not parse config file '{}': {}", path.display(), e),
    })
}

fn parse_region(name: &str, region: &RegionConfig) -> MamResult<RegionEndpoints> {
    Ok(RegionEndpoints {
        rpc_url: parse_url(name, "rpc_url", &region.rpc_url)?,
        rest_url: parse_url(name, "rest_url", &region.rest_url)?,
        uploader_url: parse_url(name, "uploader_url", &region.uploader_url)?,
    })
}

fn parse_url(region: &str, field: &str, raw: &str) -> MamResult<Url> {
    Url::parse(raw).map_err(|e| MamError::Config {
        reason: format!("regions.{region}.{field} is not a valid URL ('{raw}'): {e}"),
    })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> MamResult<T> {
    value.trim().parse::<T>().map_err(|_| MamError::Config {
        reason: format!("invalid value for {key}: '{value}'"),
    })
}
