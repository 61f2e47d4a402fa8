//! The signing job driver.

use std::sync::Arc;

use tracing::{info, warn};

use mamwrap_contracts::{
    error::MamResult,
    ids::{JobId, Psk},
    job::{JobProgress, JobResult, SigningStatus},
};

use crate::{
    poll::{CancelToken, Observation, PollPolicy, Poller, ThreadSleeper},
    traits::{AppDetailService, SigningService, Sleeper},
};

/// Whether `SigningJobDriver::run` waits for the signing job to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigningMode {
    #[default]
    Wait,
    /// Return as soon as the platform accepts the request.
    FireAndForget,
}

/// Signs an application version with a stored credential.
pub struct SigningJobDriver {
    apps: Arc<dyn AppDetailService>,
    signer: Arc<dyn SigningService>,
    sleeper: Arc<dyn Sleeper>,
    poll: PollPolicy,
    cancel: CancelToken,
}

impl SigningJobDriver {
    pub fn new(apps: Arc<dyn AppDetailService>, signer: Arc<dyn SigningService>) -> Self {
        Self {
            apps,
            signer,
            sleeper: Arc::new(ThreadSleeper),
            poll: PollPolicy::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Submit signing for `app_psk` and, in `Wait` mode, poll the version
    /// detail until its signing status leaves `in_progress`.
    ///
    /// Success iff the final status is `signed`; any other final status is
    /// `JobResult::Failed`. Both carry the platform's `signing_status_details`.
    /// A version detail without a signing status counts as `not_started`.
    pub fn run(&self, app_psk: &Psk, credential_psk: &Psk, mode: SigningMode) -> MamResult<JobResult> {
        let job_id = JobId::new();
        info!(
            job_id = %job_id,
            app_psk = %app_psk,
            credential_psk = %credential_psk,
            "signing job starting"
        );

        let accepted = self.signer.submit_signing(app_psk, credential_psk)?;
        info!(job_id = %job_id, status = %accepted, "signing submitted");

        if mode == SigningMode::FireAndForget {
            return Ok(JobResult::Submitted { message: accepted.to_string() });
        }

        let poller = Poller::new(self.poll, self.sleeper.as_ref(), &self.cancel);
        let polled = poller.run(&job_id, || {
            let detail = self.apps.version_detail(app_psk)?;
            let status = detail.signing_status.clone().unwrap_or(SigningStatus::NotStarted);
            Ok(Observation {
                progress: status.progress(),
                label: status.to_string(),
                value: (status, detail.signing_status_details),
            })
        })?;

        let (status, details) = polled.value;
        let message = format!("Signing finished - {}", status);

        if polled.progress == JobProgress::Succeeded {
            info!(job_id = %job_id, "signing finished");
            Ok(JobResult::Succeeded { message, details, polls: polled.polls })
        } else {
            warn!(job_id = %job_id, status = %status, details = ?details, "signing failed");
            Ok(JobResult::Failed { message, details, polls: polled.polls })
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
