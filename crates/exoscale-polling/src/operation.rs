//! Waiting on server-side asynchronous operations
//!
//! Mutating API calls return an operation that completes in the background.
//! [`OperationWaiter`] polls it with an interval that grows with the run
//! time, tolerating a bounded streak of server errors along the way.

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::poll::{Classify, ErrorKind, NoOpObserver, PollObserver};

/// Consecutive server errors tolerated before giving up
pub const DEFAULT_ABORT_AFTER_ERRORS: u32 = 5;

/// Interval used during the first 30 seconds of a wait
const MIN_INTERVAL_SECS: f64 = 3.0;
/// Interval used once a wait has run for 15 minutes
const MAX_INTERVAL_SECS: f64 = 60.0;
const RAMP_START_SECS: f64 = 30.0;
const RAMP_END_SECS: f64 = 900.0;

/// State of an asynchronous operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationState {
    /// Still running
    Pending,
    /// Completed successfully
    Success,
    /// Completed with an error
    Failure,
    /// Timed out server-side
    Timeout,
    /// A state this client does not know about
    Unknown(String),
}

impl OperationState {
    /// The API's name for this state
    pub fn as_str(&self) -> &str {
        match self {
            OperationState::Pending => "pending",
            OperationState::Success => "success",
            OperationState::Failure => "failure",
            OperationState::Timeout => "timeout",
            OperationState::Unknown(state) => state,
        }
    }
}

impl From<String> for OperationState {
    fn from(state: String) -> Self {
        match state.as_str() {
            "pending" => OperationState::Pending,
            "success" => OperationState::Success,
            "failure" => OperationState::Failure,
            "timeout" => OperationState::Timeout,
            _ => OperationState::Unknown(state),
        }
    }
}

impl From<OperationState> for String {
    fn from(state: OperationState) -> Self {
        match state {
            OperationState::Unknown(state) => state,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resource an operation acts on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReference {
    pub id: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
}

/// An operation as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationStatus {
    pub id: String,
    pub state: OperationState,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub reference: Option<OperationReference>,
}

impl OperationStatus {
    /// Parse an operation from an API response body
    pub fn from_json(body: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Interval before the next poll, given how long the wait has run
///
/// 3 seconds for the first 30 seconds, then rising linearly to reach one
/// minute at 15 minutes of run time, then every minute.
pub fn poll_interval(run_time: Duration) -> Duration {
    let slope = (MAX_INTERVAL_SECS - MIN_INTERVAL_SECS) / (RAMP_END_SECS - RAMP_START_SECS);
    let offset = MIN_INTERVAL_SECS - RAMP_START_SECS * slope;
    let interval = slope * run_time.as_secs_f64() + offset;
    Duration::from_secs_f64(interval.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS))
}

/// Ways an operation wait can fail
#[derive(Debug)]
pub enum OperationError<E> {
    /// The operation ended in `failure` or `timeout`
    Failed {
        id: String,
        state: OperationState,
        reason: Option<String>,
    },

    /// The API reported a state this client does not know
    InvalidState(String),

    /// The operation was still pending when the wait limit passed
    MaxWaitExceeded { elapsed: Duration },

    /// Too many consecutive server errors while polling
    ServerErrors { attempts: u32, source: E },

    /// The probe failed with a non-server error
    Probe(E),
}

impl<E: fmt::Display> fmt::Display for OperationError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::Failed { state, reason, .. } => match reason {
                Some(reason) => write!(f, "Operation error: {}, {}", state, reason),
                None => write!(f, "Operation error: {}", state),
            },
            OperationError::InvalidState(state) => {
                write!(f, "Invalid operation state: {}", state)
            }
            OperationError::MaxWaitExceeded { elapsed } => write!(
                f,
                "Operation max wait time reached after {:.0}s",
                elapsed.as_secs_f64()
            ),
            OperationError::ServerErrors { attempts, source } => write!(
                f,
                "Server error while polling operation ({} consecutive errors): {}",
                attempts, source
            ),
            OperationError::Probe(source) => source.fmt(f),
        }
    }
}

impl<E: Error + 'static> Error for OperationError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OperationError::ServerErrors { source, .. } | OperationError::Probe(source) => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Polls an asynchronous operation until it leaves the `pending` state
///
/// # Example
///
/// ```rust,no_run
/// use exoscale_polling::poll::{ProbeError, TracingObserver};
/// use exoscale_polling::{OperationStatus, OperationWaiter};
/// use std::time::Duration;
///
/// async fn get_operation(id: &str) -> Result<OperationStatus, ProbeError> {
///     # unimplemented!()
/// }
///
/// async fn example() {
///     let status = OperationWaiter::new()
///         .with_max_wait(Duration::from_secs(600))
///         .with_observer(TracingObserver::new("create-instance"))
///         .wait(|| get_operation("e2047130-b86e-11ef-83b3-0d8312b2c2d7"))
///         .await;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct OperationWaiter<O = NoOpObserver> {
    max_wait: Option<Duration>,
    abort_after_errors: u32,
    observer: O,
}

impl Default for OperationWaiter<NoOpObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationWaiter<NoOpObserver> {
    /// Create a waiter without a wait limit
    pub fn new() -> Self {
        Self {
            max_wait: None,
            abort_after_errors: DEFAULT_ABORT_AFTER_ERRORS,
            observer: NoOpObserver,
        }
    }
}

impl<O> OperationWaiter<O> {
    /// Stop waiting once the operation has been pending this long
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Number of consecutive server errors that ends the wait
    pub fn with_abort_after_errors(mut self, count: u32) -> Self {
        self.abort_after_errors = count.max(1);
        self
    }

    /// Set the observer
    pub fn with_observer<O2>(self, observer: O2) -> OperationWaiter<O2> {
        OperationWaiter {
            max_wait: self.max_wait,
            abort_after_errors: self.abort_after_errors,
            observer,
        }
    }
}

impl<O: PollObserver> OperationWaiter<O> {
    /// Poll the operation until it succeeds or fails
    ///
    /// Server errors from the probe are retried until
    /// `abort_after_errors` of them happen in a row; any other probe error
    /// ends the wait immediately.
    pub async fn wait<F, Fut, E>(&self, mut probe: F) -> Result<OperationStatus, OperationError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<OperationStatus, E>>,
        E: Classify + fmt::Display,
    {
        let start = Instant::now();
        let mut calls: u32 = 0;
        let mut server_errors: u32 = 0;

        loop {
            calls += 1;
            self.observer.on_call_start(calls, None);

            let status = match probe().await {
                Ok(status) => {
                    server_errors = 0;
                    status
                }
                Err(err) => {
                    let kind = err.kind();
                    if kind != ErrorKind::Server {
                        self.observer.on_aborted(calls, kind, &err);
                        return Err(OperationError::Probe(err));
                    }

                    server_errors += 1;
                    if server_errors >= self.abort_after_errors {
                        self.observer.on_aborted(calls, kind, &err);
                        return Err(OperationError::ServerErrors {
                            attempts: server_errors,
                            source: err,
                        });
                    }

                    self.observer.on_ignored_error(calls, kind, &err);
                    self.pause(start, calls).await;
                    continue;
                }
            };

            match status.state {
                OperationState::Success => {
                    self.observer.on_success(calls, start.elapsed());
                    return Ok(status);
                }
                OperationState::Failure | OperationState::Timeout => {
                    return Err(OperationError::Failed {
                        id: status.id,
                        state: status.state,
                        reason: status.reason,
                    });
                }
                OperationState::Unknown(state) => {
                    return Err(OperationError::InvalidState(state));
                }
                OperationState::Pending => {
                    let run_time = start.elapsed();
                    if let Some(max_wait) = self.max_wait {
                        if run_time > max_wait {
                            self.observer.on_timeout(calls, run_time);
                            return Err(OperationError::MaxWaitExceeded { elapsed: run_time });
                        }
                    }
                    self.pause(start, calls).await;
                }
            }
        }
    }

    async fn pause(&self, start: Instant, calls: u32) {
        let run_time = start.elapsed();
        let interval = poll_interval(run_time);
        self.observer.on_retry(calls, interval, run_time);
        tokio::time::sleep(interval).await;
    }
}
