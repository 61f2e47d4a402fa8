//! Wrap and signing job types.
//!
//! Both jobs run server-side; the client only ever sees them through
//! polling. `WrapStatus` and `SigningStatus` are the observed values,
//! `PollRecord` is one observation, and `JobResult` is what a driver returns
//! to its caller.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ids::Psk, policy::ActiveFlagMap, rule::ReconciliationAction};

/// What a polled status means for the loop observing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobProgress {
    /// Not finished yet; sleep and poll again.
    Pending,
    /// Terminal and successful.
    Succeeded,
    /// Terminal and unsuccessful; stop polling at once.
    Failed,
}

/// The wrap status code reported by the version status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapStatus {
    /// -1
    Error,
    /// 0. Not a recognized in-progress or completed code while polling, so
    /// a wrap loop that observes it stops with a failure.
    NoPoliciesApplied,
    /// 1
    PoliciesApplied,
    /// 2
    InProgress,
    /// 3
    PendingSigning,
    /// 4
    CompletedNoPolicies,
    /// Any code outside the table above.
    Unknown(i64),
}

impl WrapStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            -1 => WrapStatus::Error,
            0 => WrapStatus::NoPoliciesApplied,
            1 => WrapStatus::PoliciesApplied,
            2 => WrapStatus::InProgress,
            3 => WrapStatus::PendingSigning,
            4 => WrapStatus::CompletedNoPolicies,
            other => WrapStatus::Unknown(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            WrapStatus::Error => -1,
            WrapStatus::NoPoliciesApplied => 0,
            WrapStatus::PoliciesApplied => 1,
            WrapStatus::InProgress => 2,
            WrapStatus::PendingSigning => 3,
            WrapStatus::CompletedNoPolicies => 4,
            WrapStatus::Unknown(code) => code,
        }
    }

    /// Human-readable message for this status.
    pub fn message(self) -> Cow<'static, str> {
        match self {
            WrapStatus::Error => Cow::Borrowed("Error applying policies"),
            WrapStatus::NoPoliciesApplied => {
                Cow::Borrowed("Wrapping completed, no policies applied")
            }
            WrapStatus::PoliciesApplied => Cow::Borrowed("Policies applied"),
            WrapStatus::InProgress => Cow::Borrowed("Wrapping in progress..."),
            WrapStatus::PendingSigning => Cow::Borrowed("Wrapping completed, pending signing"),
            WrapStatus::CompletedNoPolicies => {
                Cow::Borrowed("Wrapping completed, no policies applied")
            }
            WrapStatus::Unknown(code) => Cow::Owned(format!("Unknown wrapping status {code}")),
        }
    }

    /// Retry on {1, 2}, succeed on {3, 4}, fail on everything else.
    pub fn progress(self) -> JobProgress {
        match self {
            WrapStatus::PoliciesApplied | WrapStatus::InProgress => JobProgress::Pending,
            WrapStatus::PendingSigning | WrapStatus::CompletedNoPolicies => JobProgress::Succeeded,
            WrapStatus::Error | WrapStatus::NoPoliciesApplied | WrapStatus::Unknown(_) => {
                JobProgress::Failed
            }
        }
    }
}

impl fmt::Display for WrapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.message())
    }
}

/// Wrapper runtime metadata attached to a version status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WrapperInfo {
    /// Passed back untouched as `apperianWrapperVersion` on submit.
    #[serde(default)]
    pub wrapper_version: Value,
}

/// The result of the version status RPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionStatus {
    pub ver_status: i64,
    #[serde(default)]
    pub ver_psk: Option<Psk>,
    #[serde(default)]
    pub app_status: Value,
    #[serde(default)]
    pub apperian_wrapper_info: WrapperInfo,
}

impl VersionStatus {
    pub fn status(&self) -> WrapStatus {
        WrapStatus::from_code(self.ver_status)
    }
}

/// Signing state of an application version.
///
/// Serialized as the platform's string form (`"not_started"`,
/// `"in_progress"`, `"signed"`, or anything else for failures).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SigningStatus {
    NotStarted,
    InProgress,
    Signed,
    Other(String),
}

impl SigningStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SigningStatus::NotStarted => "not_started",
            SigningStatus::InProgress => "in_progress",
            SigningStatus::Signed => "signed",
            SigningStatus::Other(value) => value,
        }
    }

    pub fn progress(&self) -> JobProgress {
        match self {
            SigningStatus::InProgress => JobProgress::Pending,
            SigningStatus::Signed => JobProgress::Succeeded,
            SigningStatus::NotStarted | SigningStatus::Other(_) => JobProgress::Failed,
        }
    }
}

impl From<String> for SigningStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "not_started" => SigningStatus::NotStarted,
            "in_progress" => SigningStatus::InProgress,
            "signed" => SigningStatus::Signed,
            _ => SigningStatus::Other(value),
        }
    }
}

impl From<SigningStatus> for String {
    fn from(value: SigningStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SigningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `version` object inside an application detail response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDetail {
    pub psk: Psk,
    #[serde(default)]
    pub signing_status: Option<SigningStatus>,
    #[serde(default)]
    pub signing_status_details: Option<Value>,
}

/// Everything a wrap submission carries apart from session credentials,
/// which the transport adds itself.
#[derive(Debug, Clone, PartialEq)]
pub struct WrapSubmission {
    pub app_psk: Psk,
    pub version_psk: Psk,
    pub active_flags: ActiveFlagMap,
    pub action: ReconciliationAction,
    pub wrapper_version: Value,
}

/// One observation made by a poll loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollRecord {
    /// 1-based position in the loop.
    pub attempt: u32,
    /// The observed status in display form (e.g. `"2 (Wrapping in progress...)"`).
    pub status: String,
    pub observed_at: DateTime<Utc>,
}

/// The outcome a job driver returns to its caller.
///
/// Anomalous statuses are reported here as `Failed`, not as errors: the
/// driver did its job, the server-side job did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    /// The job reached a successful terminal status.
    Succeeded {
        message: String,
        details: Option<Value>,
        polls: Vec<PollRecord>,
    },

    /// The job reached a failing or unrecognized status.
    Failed {
        message: String,
        /// Extra diagnostics from the platform, e.g. signing status details.
        details: Option<Value>,
        polls: Vec<PollRecord>,
    },

    /// Fire-and-forget mode: the job was accepted and not observed further.
    Submitted { message: String },
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Succeeded { .. } | JobResult::Submitted { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            JobResult::Succeeded { message, .. }
            | JobResult::Failed { message, .. }
            | JobResult::Submitted { message } => message,
        }
    }

    /// Platform diagnostics reported with the terminal status, if any.
    pub fn details(&self) -> Option<&Value> {
        match self {
            JobResult::Succeeded { details, .. } | JobResult::Failed { details, .. } => details.as_ref(),
            JobResult::Submitted { .. } => None,
        }
    }

    pub fn polls(&self) -> &[PollRecord] {
        match self {
            JobResult::Succeeded { polls, .. } | JobResult::Failed { polls, .. } => polls,
            JobResult::Submitted { .. } => &[],
        }
    }
}
