//! # mamwrap-policy
//!
//! Turns a caller's policy selection into the dynamic-policy change a wrap
//! request carries.
//!
//! ## Overview
//!
//! [`PolicyCatalog`] holds the 17 wrappable policies, declared in TOML and
//! validated when loaded. The pipeline runs in three pure steps:
//!
//! 1. [`PolicyEncoder`] maps selected ids onto the platform's flag map.
//! 2. [`RuleSynthesizer`] builds one rule per active policy, keeping the psk
//!    of any stored rule with the same name.
//! 3. [`reconcile`] compares the rules against the stored policy and picks
//!    one of NONE, CREATE, UPDATE or DELETE.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use mamwrap_policy::{reconcile, PolicyCatalog, PolicyEncoder, PolicySelection, RuleSynthesizer};
//!
//! let catalog = PolicyCatalog::builtin()?;
//! let flags = PolicyEncoder::new(&catalog).encode(&PolicySelection::new([11, 12]))?;
//! let rules = RuleSynthesizer::new(&catalog).synthesize(&flags, &snapshot);
//! let action = reconcile(rules, &snapshot, &app_psk, &version_psk);
//! ```

pub mod catalog;
pub mod encoder;
pub mod reconciler;
pub mod synthesizer;

pub use catalog::{ActionTemplate, PolicyCatalog, PolicyDefinition};
pub use encoder::{PolicyEncoder, PolicySelection};
pub use reconciler::{operation_pattern, reconcile};
pub use synthesizer::RuleSynthesizer;

// ── Tests ─────────────────────────────────────────────────────────────────────
