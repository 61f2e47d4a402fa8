//! Collaborator traits for the job drivers.
//!
//! The drivers never talk to the network themselves. Each platform endpoint
//! they depend on sits behind one of these traits:
//!
//! - `AppDetailService`: application version detail (psk, signing state)
//! - `PolicyQueryService`: the dynamic policy stored for a version
//! - `WrapService`: wrap status and wrap submission
//! - `SigningService`: signing submission
//! - `PublishService`: publish transactions
//! - `Uploader`: binary upload for a publish transaction
//! - `Sleeper`: the wait between two polls
//!
//! `mamwrap-client` implements the platform-facing traits over HTTP; tests
//! implement them with in-memory fakes.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use mamwrap_contracts::{
    error::MamResult,
    ids::Psk,
    job::{SigningStatus, VersionDetail, VersionStatus, WrapSubmission},
    rule::ExistingPolicySnapshot,
};

pub trait AppDetailService: Send + Sync {
    /// The current version of `app_psk`.
    fn version_detail(&self, app_psk: &Psk) -> MamResult<VersionDetail>;
}

pub trait PolicyQueryService: Send + Sync {
    /// The dynamic policy stored for `version_psk`. A version that never had
    /// one yields an empty snapshot, not an error.
    fn existing_policy(&self, version_psk: &Psk) -> MamResult<ExistingPolicySnapshot>;
}

pub trait WrapService: Send + Sync {
    /// One observation of the wrap state of `app_psk`.
    fn wrap_status(&self, app_psk: &Psk) -> MamResult<VersionStatus>;

    /// Ask the platform to start wrapping. Returns once the request is
    /// accepted; the job itself runs server-side.
    fn submit_wrap(&self, submission: &WrapSubmission) -> MamResult<()>;
}

pub trait SigningService: Send + Sync {
    /// Start signing `app_psk` with a stored credential and return the
    /// signing status the platform reports right away.
    fn submit_signing(&self, app_psk: &Psk, credential_psk: &Psk) -> MamResult<SigningStatus>;
}

pub trait PublishService: Send + Sync {
    /// Open a publish transaction and return its id.
    fn create_transaction(&self) -> MamResult<String>;

    /// Publish the uploaded file under `metadata` and return the new app id.
    fn publish(&self, transaction_id: &str, file_id: &str, metadata: &Value) -> MamResult<Psk>;
}

pub trait Uploader: Send + Sync {
    /// Upload `file` into a publish transaction and return the uploader's
    /// file id.
    fn upload(&self, transaction_id: &str, file: &Path) -> MamResult<String>;
}

/// The wait between two polls.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}
