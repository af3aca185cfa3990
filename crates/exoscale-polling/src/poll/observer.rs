//! Polling observation and logging
//!
//! The engine itself never logs. Everything it does is reported to a
//! [`PollObserver`]; [`TracingObserver`] turns those events into `tracing`
//! records.

use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::classify::ErrorKind;

/// Observer trait for polling run events
///
/// # Example
///
/// ```rust
/// use exoscale_polling::poll::{ErrorKind, PollObserver};
/// use std::fmt::Display;
/// use std::time::Duration;
///
/// struct PrintObserver;
///
/// impl PollObserver for PrintObserver {
///     fn on_call_start(&self, call: u32, _max_tries: Option<u32>) {
///         println!("probe call {call}");
///     }
///
///     fn on_ignored_error(&self, _call: u32, kind: ErrorKind, _error: &dyn Display) {
///         println!("ignoring {kind} error");
///     }
///
///     fn on_retry(&self, _calls: u32, delay: Duration, _elapsed: Duration) {
///         println!("sleeping {delay:?}");
///     }
///
///     fn on_success(&self, calls: u32, _elapsed: Duration) {
///         println!("done after {calls} calls");
///     }
///
///     fn on_max_calls_exceeded(&self, calls: u32, _elapsed: Duration) {
///         println!("gave up after {calls} calls");
///     }
///
///     fn on_timeout(&self, _calls: u32, elapsed: Duration) {
///         println!("timed out after {elapsed:?}");
///     }
/// }
/// ```
pub trait PollObserver: Send + Sync {
    /// Called before each probe call
    ///
    /// # Arguments
    ///
    /// * `call` - The call number (1-indexed)
    /// * `max_tries` - The call budget, if any
    fn on_call_start(&self, call: u32, max_tries: Option<u32>);

    /// Called when the probe failed with an error from the ignored set
    fn on_ignored_error(&self, call: u32, kind: ErrorKind, error: &dyn Display);

    /// Called when a call did not succeed and the run will sleep before the next one
    ///
    /// # Arguments
    ///
    /// * `calls` - Calls made so far
    /// * `delay` - The sleep before the next call
    /// * `elapsed` - Time since the run started
    fn on_retry(&self, calls: u32, delay: Duration, elapsed: Duration);

    /// Called when the success predicate held
    fn on_success(&self, calls: u32, elapsed: Duration);

    /// Called when the call budget was exhausted
    fn on_max_calls_exceeded(&self, calls: u32, elapsed: Duration);

    /// Called when the wall-clock deadline passed
    fn on_timeout(&self, calls: u32, elapsed: Duration);

    /// Called when the probe failed with an error outside the ignored set
    fn on_aborted(&self, call: u32, kind: ErrorKind, error: &dyn Display) {
        let _ = (call, kind, error);
    }
}

/// A no-op observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl PollObserver for NoOpObserver {
    fn on_call_start(&self, _call: u32, _max_tries: Option<u32>) {}

    fn on_ignored_error(&self, _call: u32, _kind: ErrorKind, _error: &dyn Display) {}

    fn on_retry(&self, _calls: u32, _delay: Duration, _elapsed: Duration) {}

    fn on_success(&self, _calls: u32, _elapsed: Duration) {}

    fn on_max_calls_exceeded(&self, _calls: u32, _elapsed: Duration) {}

    fn on_timeout(&self, _calls: u32, _elapsed: Duration) {}
}

/// An observer that logs polling events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_call_start`, `on_retry`: DEBUG
/// - `on_ignored_error`, `on_aborted`: WARN
/// - `on_success`: INFO (if > 1 call) or DEBUG (first call)
/// - `on_max_calls_exceeded`, `on_timeout`: ERROR
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// What is being waited for (for log context)
    operation: String,
}

impl TracingObserver {
    /// Create a new tracing observer
    ///
    /// # Arguments
    ///
    /// * `operation` - What is being waited for, e.g. `"instance-running"`
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    /// Get the operation name
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("poll")
    }
}

impl PollObserver for TracingObserver {
    fn on_call_start(&self, call: u32, max_tries: Option<u32>) {
        tracing::debug!(
            operation = %self.operation,
            call = call,
            max_tries = ?max_tries,
            "probing"
        );
    }

    fn on_ignored_error(&self, call: u32, kind: ErrorKind, error: &dyn Display) {
        tracing::warn!(
            operation = %self.operation,
            call = call,
            kind = %kind,
            error = %error,
            "probe failed with ignored error"
        );
    }

    fn on_retry(&self, calls: u32, delay: Duration, elapsed: Duration) {
        tracing::debug!(
            operation = %self.operation,
            calls = calls,
            delay_ms = delay.as_millis() as u64,
            elapsed_ms = elapsed.as_millis() as u64,
            "condition not met, waiting"
        );
    }

    fn on_success(&self, calls: u32, elapsed: Duration) {
        if calls > 1 {
            tracing::info!(
                operation = %self.operation,
                calls = calls,
                elapsed_ms = elapsed.as_millis() as u64,
                "condition met"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                elapsed_ms = elapsed.as_millis() as u64,
                "condition met on first call"
            );
        }
    }

    fn on_max_calls_exceeded(&self, calls: u32, elapsed: Duration) {
        tracing::error!(
            operation = %self.operation,
            calls = calls,
            elapsed_ms = elapsed.as_millis() as u64,
            "maximum number of calls exceeded"
        );
    }

    fn on_timeout(&self, calls: u32, elapsed: Duration) {
        tracing::error!(
            operation = %self.operation,
            calls = calls,
            elapsed_ms = elapsed.as_millis() as u64,
            "polling timed out"
        );
    }

    fn on_aborted(&self, call: u32, kind: ErrorKind, error: &dyn Display) {
        tracing::warn!(
            operation = %self.operation,
            call = call,
            kind = %kind,
            error = %error,
            "polling aborted by probe error"
        );
    }
}

/// An observer that counts polling events
///
/// Useful for testing.
#[derive(Debug, Default)]
pub struct StatsObserver {
    /// Call start events
    pub call_starts: AtomicU32,
    /// Ignored error events
    pub ignored_errors: AtomicU32,
    /// Retry (sleep) events
    pub retries: AtomicU32,
    /// Success events
    pub successes: AtomicU32,
    /// Max-calls events
    pub max_calls_exceeded: AtomicU32,
    /// Timeout events
    pub timeouts: AtomicU32,
    /// Abort events
    pub aborts: AtomicU32,
}

impl StatsObserver {
    /// Create a new stats observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of call starts
    pub fn call_starts(&self) -> u32 {
        self.call_starts.load(Ordering::SeqCst)
    }

    /// Get the number of ignored errors
    pub fn ignored_errors(&self) -> u32 {
        self.ignored_errors.load(Ordering::SeqCst)
    }

    /// Get the number of retries
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    /// Get the number of successes
    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    /// Get the number of max-calls events
    pub fn max_calls_exceeded(&self) -> u32 {
        self.max_calls_exceeded.load(Ordering::SeqCst)
    }

    /// Get the number of timeouts
    pub fn timeouts(&self) -> u32 {
        self.timeouts.load(Ordering::SeqCst)
    }

    /// Get the number of aborts
    pub fn aborts(&self) -> u32 {
        self.aborts.load(Ordering::SeqCst)
    }
}

impl PollObserver for StatsObserver {
    fn on_call_start(&self, _call: u32, _max_tries: Option<u32>) {
        self.call_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_ignored_error(&self, _call: u32, _kind: ErrorKind, _error: &dyn Display) {
        self.ignored_errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_retry(&self, _calls: u32, _delay: Duration, _elapsed: Duration) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _calls: u32, _elapsed: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_max_calls_exceeded(&self, _calls: u32, _elapsed: Duration) {
        self.max_calls_exceeded.fetch_add(1, Ordering::SeqCst);
    }

    fn on_timeout(&self, _calls: u32, _elapsed: Duration) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_aborted(&self, _call: u32, _kind: ErrorKind, _error: &dyn Display) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T: PollObserver + ?Sized> PollObserver for std::sync::Arc<T> {
    fn on_call_start(&self, call: u32, max_tries: Option<u32>) {
        (**self).on_call_start(call, max_tries)
    }

    fn on_ignored_error(&self, call: u32, kind: ErrorKind, error: &dyn Display) {
        (**self).on_ignored_error(call, kind, error)
    }

    fn on_retry(&self, calls: u32, delay: Duration, elapsed: Duration) {
        (**self).on_retry(calls, delay, elapsed)
    }

    fn on_success(&self, calls: u32, elapsed: Duration) {
        (**self).on_success(calls, elapsed)
    }

    fn on_max_calls_exceeded(&self, calls: u32, elapsed: Duration) {
        (**self).on_max_calls_exceeded(calls, elapsed)
    }

    fn on_timeout(&self, calls: u32, elapsed: Duration) {
        (**self).on_timeout(calls, elapsed)
    }

    fn on_aborted(&self, call: u32, kind: ErrorKind, error: &dyn Display) {
        (**self).on_aborted(call, kind, error)
    }
}

impl<T: PollObserver + ?Sized> PollObserver for Box<T> {
    fn on_call_start(&self, call: u32, max_tries: Option<u32>) {
        (**self).on_call_start(call, max_tries)
    }

    fn on_ignored_error(&self, call: u32, kind: ErrorKind, error: &dyn Display) {
        (**self).on_ignored_error(call, kind, error)
    }

    fn on_retry(&self, calls: u32, delay: Duration, elapsed: Duration) {
        (**self).on_retry(calls, delay, elapsed)
    }

    fn on_success(&self, calls: u32, elapsed: Duration) {
        (**self).on_success(calls, elapsed)
    }

    fn on_max_calls_exceeded(&self, calls: u32, elapsed: Duration) {
        (**self).on_max_calls_exceeded(calls, elapsed)
    }

    fn on_timeout(&self, calls: u32, elapsed: Duration) {
        (**self).on_timeout(calls, elapsed)
    }

    fn on_aborted(&self, call: u32, kind: ErrorKind, error: &dyn Display) {
        (**self).on_aborted(call, kind, error)
    }
}
