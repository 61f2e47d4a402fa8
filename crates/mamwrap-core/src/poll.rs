//! The cooperative poll primitive shared by the wrap and signing drivers.
//!
//! A poll loop observes a server-side job until it reaches a terminal status.
//! Between observations it waits through a `Sleeper`, so tests can replace
//! the wall clock. The loop can be bounded with `PollPolicy::max_attempts`
//! and stopped from another thread with a `CancelToken`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use mamwrap_contracts::{
    error::{MamError, MamResult},
    ids::JobId,
    job::{JobProgress, PollRecord},
};

use crate::traits::Sleeper;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How often to poll and when to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until a terminal status is seen, however long that takes.
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::unbounded(DEFAULT_POLL_INTERVAL)
    }
}

impl PollPolicy {
    pub fn unbounded(interval: Duration) -> Self {
        Self { interval, max_attempts: None }
    }

    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self { max_attempts: Some(max_attempts), ..self }
    }
}

/// Shared flag that stops a running poll loop at its next check.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// One observation handed back to the loop by the caller's probe.
#[derive(Debug, Clone)]
pub struct Observation<T> {
    pub value: T,
    pub progress: JobProgress,
    /// Status in display form; recorded in the poll history and logged.
    pub label: String,
}

/// The last observation of a loop that reached a terminal status.
#[derive(Debug, Clone)]
pub struct Polled<T> {
    pub value: T,
    /// `Succeeded` or `Failed`; never `Pending`.
    pub progress: JobProgress,
    pub polls: Vec<PollRecord>,
}

/// Runs poll loops with one policy, sleeper and cancel token.
pub struct Poller<'a> {
    policy: PollPolicy,
    sleeper: &'a dyn Sleeper,
    cancel: &'a CancelToken,
}

impl<'a> Poller<'a> {
    pub fn new(policy: PollPolicy, sleeper: &'a dyn Sleeper, cancel: &'a CancelToken) -> Self {
        Self { policy, sleeper, cancel }
    }

    /// Call `probe` until it reports a terminal status.
    ///
    /// `Pending` observations are logged and followed by one sleep of
    /// `policy.interval`. The first `Succeeded` or `Failed` observation ends
    /// the loop and is returned with the full poll history.
    ///
    /// # Errors
    ///
    /// - whatever `probe` returns, unchanged
    /// - `MamError::Cancelled` if the token is set before a poll or during a sleep
    /// - `MamError::PollLimitExceeded` once `max_attempts` pending observations
    ///   have been made
    pub fn run<T, F>(&self, job_id: &JobId, mut probe: F) -> MamResult<Polled<T>>
    where
        F: FnMut() -> MamResult<Observation<T>>,
    {
        let mut polls = Vec::new();
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                warn!(job_id = %job_id, attempts = attempt, "poll loop cancelled");
                return Err(MamError::Cancelled { attempts: attempt });
            }

            attempt += 1;
            let observation = probe()?;
            polls.push(PollRecord {
                attempt,
                status: observation.label.clone(),
                observed_at: Utc::now(),
            });

            if observation.progress != JobProgress::Pending {
                debug!(
                    job_id = %job_id,
                    attempt,
                    status = %observation.label,
                    "terminal status observed"
                );
                return Ok(Polled {
                    value: observation.value,
                    progress: observation.progress,
                    polls,
                });
            }

            info!(job_id = %job_id, attempt, status = %observation.label, "job still running");

            if self.policy.max_attempts.is_some_and(|max| attempt >= max) {
                warn!(job_id = %job_id, attempts = attempt, "poll attempt limit reached");
                return Err(MamError::PollLimitExceeded { attempts: attempt });
            }

            self.sleeper.sleep(self.policy.interval);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::traits::Sleeper;

    use super::CancelToken;

    /// A sleeper that records every requested sleep and returns at once.
    #[derive(Clone, Default)]
    pub struct RecordingSleeper {
        pub sleeps: Arc<Mutex<Vec<Duration>>>,
        /// When set, cancelled on the first sleep.
        pub cancel_on_sleep: Option<CancelToken>,
    }

    impl RecordingSleeper {
        pub fn count(&self) -> usize {
            self.sleeps.lock().unwrap().len()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
            if let Some(token) = &self.cancel_on_sleep {
                token.cancel();
            }
        }
    }
}
