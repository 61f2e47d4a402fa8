//! The wrap job driver.
//!
//! A wrap runs in two phases:
//!
//!   Encode → Snapshot → Synthesize → Reconcile → Submit   (plan and submit)
//!   Poll → [sleep → Poll]* → terminal status              (observe)
//!
//! Selection errors surface before any collaborator is called. Submission
//! always precedes the first poll, and polls are strictly sequential.

use std::sync::Arc;

use tracing::{debug, info, warn};

use mamwrap_contracts::{
    error::MamResult,
    ids::{JobId, Psk},
    job::{JobProgress, JobResult, PollRecord, WrapStatus, WrapSubmission},
    rule::ReconciliationAction,
};
use mamwrap_policy::{reconcile, PolicyCatalog, PolicyEncoder, PolicySelection, RuleSynthesizer};

use crate::{
    poll::{CancelToken, Observation, PollPolicy, Poller, ThreadSleeper},
    traits::{AppDetailService, PolicyQueryService, Sleeper, WrapService},
};

/// What a finished wrap job reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct WrapReport {
    pub job_id: JobId,
    pub version_psk: Psk,
    /// The dynamic-policy change sent with the wrap request.
    pub action: ReconciliationAction,
    pub result: JobResult,
}

/// Drives one application through policy reconciliation and wrapping.
///
/// A driver holds no per-job state; the same driver can run any number of
/// jobs, including concurrently from several threads.
pub struct WrapJobDriver {
    catalog: Arc<PolicyCatalog>,
    apps: Arc<dyn AppDetailService>,
    policies: Arc<dyn PolicyQueryService>,
    wrapper: Arc<dyn WrapService>,
    sleeper: Arc<dyn Sleeper>,
    poll: PollPolicy,
    cancel: CancelToken,
}

impl WrapJobDriver {
    /// Create a driver that sleeps on the current thread and polls every
    /// ten seconds without bound.
    pub fn new(
        catalog: Arc<PolicyCatalog>,
        apps: Arc<dyn AppDetailService>,
        policies: Arc<dyn PolicyQueryService>,
        wrapper: Arc<dyn WrapService>,
    ) -> Self {
        Self {
            catalog,
            apps,
            policies,
            wrapper,
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

    /// Wrap `app_psk` with the policies in `selection` and wait for the
    /// platform to finish.
    ///
    /// # Pipeline
    ///
    /// 1. Encode the selection into a flag map (no network yet)
    /// 2. Look up the app's current version psk
    /// 3. Fetch the version's stored dynamic policy, synthesize rules and
    ///    reconcile them into one action
    /// 4. Read the wrapper version from the current wrap status
    /// 5. Submit the wrap request
    /// 6. Poll: statuses 1 and 2 sleep and poll again; 3 and 4 succeed; any
    ///    other status fails on first sight
    ///
    /// # Errors
    ///
    /// `UnknownPolicy` for a bad selection, any collaborator error, and the
    /// poll primitive's `Cancelled` / `PollLimitExceeded`. A failing wrap
    /// status is not an error; it is `JobResult::Failed`.
    pub fn run(&self, app_psk: &Psk, selection: &PolicySelection) -> MamResult<WrapReport> {
        let job_id = JobId::new();

        // ── Step 1: Encode ───────────────────────────────────────────────────
        let flags = PolicyEncoder::new(&self.catalog).encode(selection)?;

        info!(
            job_id = %job_id,
            app_psk = %app_psk,
            policies = ?selection.ids(),
            "wrap job starting"
        );

        // ── Step 2: Current version ──────────────────────────────────────────
        let version_psk = self.apps.version_detail(app_psk)?.psk;

        // ── Step 3: Reconcile against the stored policy ──────────────────────
        //
        // Fetched fresh for every job; a cached snapshot could turn an update
        // into a duplicate create.
        let snapshot = self.policies.existing_policy(&version_psk)?;
        let rules = RuleSynthesizer::new(&self.catalog).synthesize(&flags, &snapshot);
        let action = reconcile(rules, &snapshot, app_psk, &version_psk);

        debug!(
            job_id = %job_id,
            version_psk = %version_psk,
            action = action.label(),
            "dynamic policy planned"
        );

        // ── Step 4: Wrapper version ──────────────────────────────────────────
        let wrapper_version = self
            .wrapper
            .wrap_status(app_psk)?
            .apperian_wrapper_info
            .wrapper_version;

        // ── Step 5: Submit ───────────────────────────────────────────────────
        let submission = WrapSubmission {
            app_psk: app_psk.clone(),
            version_psk: version_psk.clone(),
            active_flags: flags,
            action,
            wrapper_version,
        };
        self.wrapper.submit_wrap(&submission)?;
        info!(job_id = %job_id, "wrap submitted");

        // ── Step 6: Poll ─────────────────────────────────────────────────────
        let poller = Poller::new(self.poll, self.sleeper.as_ref(), &self.cancel);
        let polled = poller.run(&job_id, || {
            let status = self.wrapper.wrap_status(app_psk)?.status();
            Ok(Observation {
                value: status,
                progress: status.progress(),
                label: status.to_string(),
            })
        })?;

        let result = wrap_result(polled.value, polled.progress, polled.polls);
        if result.is_success() {
            info!(job_id = %job_id, message = %result.message(), "wrap finished");
        } else {
            warn!(job_id = %job_id, message = %result.message(), "wrap failed");
        }

        Ok(WrapReport {
            job_id,
            version_psk,
            action: submission.action,
            result,
        })
    }
}

fn wrap_result(status: WrapStatus, progress: JobProgress, polls: Vec<PollRecord>) -> JobResult {
    let message = status.message().into_owned();
    match progress {
        JobProgress::Succeeded => JobResult::Succeeded { message, details: None, polls },
        _ => JobResult::Failed { message, details: None, polls },
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
