//! Error types for the polling engine
//!
//! A run ends in exactly one of three ways besides success: the call budget
//! runs out, the deadline passes, or the probe fails with an error that is
//! not in the ignored set.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use super::executor::Observed;

/// Terminal failures of a polling run
///
/// `values` is `Some` only when value collection was enabled for the run,
/// and then holds one entry per probe call in call order.
#[derive(Debug)]
pub enum PollError<T, E> {
    /// The call budget was exhausted without the predicate holding
    MaxCallsExceeded {
        /// Calls made
        calls: u32,
        /// Time since the run started
        elapsed: Duration,
        /// Values observed so far, if collected
        values: Option<Vec<Observed<T, E>>>,
    },

    /// The deadline passed without the predicate holding
    Timeout {
        /// Time since the run started
        elapsed: Duration,
        /// Calls made
        calls: u32,
        /// Values observed so far, if collected
        values: Option<Vec<Observed<T, E>>>,
    },

    /// The probe failed with an error outside the ignored set
    Probe(E),
}

impl<T, E: fmt::Display> fmt::Display for PollError<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollError::MaxCallsExceeded { calls, elapsed, .. } => write!(
                f,
                "max calls exceeded: {} calls over {:.2}s",
                calls,
                elapsed.as_secs_f64()
            ),
            PollError::Timeout { elapsed, calls, .. } => write!(
                f,
                "polling timed out after {:.2}s ({} calls)",
                elapsed.as_secs_f64(),
                calls
            ),
            PollError::Probe(source) => source.fmt(f),
        }
    }
}

impl<T: fmt::Debug, E: Error + 'static> Error for PollError<T, E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PollError::Probe(source) => Some(source),
            _ => None,
        }
    }
}

impl<T, E> PollError<T, E> {
    /// Create a max-calls error
    pub fn max_calls_exceeded(
        calls: u32,
        elapsed: Duration,
        values: Option<Vec<Observed<T, E>>>,
    ) -> Self {
        PollError::MaxCallsExceeded {
            calls,
            elapsed,
            values,
        }
    }

    /// Create a timeout error
    pub fn timeout(elapsed: Duration, calls: u32, values: Option<Vec<Observed<T, E>>>) -> Self {
        PollError::Timeout {
            elapsed,
            calls,
            values,
        }
    }

    /// Check if the call budget was exhausted
    pub fn is_max_calls_exceeded(&self) -> bool {
        matches!(self, PollError::MaxCallsExceeded { .. })
    }

    /// Check if the deadline passed
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout { .. })
    }

    /// Check if the probe aborted the run
    pub fn is_probe_error(&self) -> bool {
        matches!(self, PollError::Probe(_))
    }

    /// Number of calls made, when known
    ///
    /// The engine does not count the aborting call of a `Probe` error.
    pub fn calls(&self) -> Option<u32> {
        match self {
            PollError::MaxCallsExceeded { calls, .. } | PollError::Timeout { calls, .. } => {
                Some(*calls)
            }
            PollError::Probe(_) => None,
        }
    }

    /// Time since the run started, for limit errors
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            PollError::MaxCallsExceeded { elapsed, .. } | PollError::Timeout { elapsed, .. } => {
                Some(*elapsed)
            }
            PollError::Probe(_) => None,
        }
    }

    /// Values collected before the run failed
    pub fn values(&self) -> Option<&[Observed<T, E>]> {
        match self {
            PollError::MaxCallsExceeded { values, .. } | PollError::Timeout { values, .. } => {
                values.as_deref()
            }
            PollError::Probe(_) => None,
        }
    }

    /// Take the values collected before the run failed
    pub fn into_values(self) -> Option<Vec<Observed<T, E>>> {
        match self {
            PollError::MaxCallsExceeded { values, .. } | PollError::Timeout { values, .. } => {
                values
            }
            PollError::Probe(_) => None,
        }
    }

    /// Get the probe's error, consuming this error
    pub fn into_probe_error(self) -> Option<E> {
        match self {
            PollError::Probe(source) => Some(source),
            _ => None,
        }
    }

    /// Map the probe error type using a closure
    ///
    /// Ignored errors recorded in collected values are mapped too.
    pub fn map_err<F, E2>(self, f: F) -> PollError<T, E2>
    where
        F: Fn(E) -> E2,
    {
        let map_values = |values: Option<Vec<Observed<T, E>>>| {
            values.map(|values| values.into_iter().map(|v| v.map_err(&f)).collect())
        };

        match self {
            PollError::MaxCallsExceeded {
                calls,
                elapsed,
                values,
            } => PollError::MaxCallsExceeded {
                calls,
                elapsed,
                values: map_values(values),
            },
            PollError::Timeout {
                elapsed,
                calls,
                values,
            } => PollError::Timeout {
                elapsed,
                calls,
                values: map_values(values),
            },
            PollError::Probe(source) => PollError::Probe(f(source)),
        }
    }
}
