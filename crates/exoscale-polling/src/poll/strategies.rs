//! Step strategies
//!
//! A step strategy computes the delay before the next probe call from the
//! previous delay and the number of calls made so far. Strategies are pure:
//! the same inputs always give the same delay, so independent runs can share
//! one strategy value.

use crate::types::StepKind;
use std::time::Duration;

/// Smallest increment applied by [`linear_doubling`]
const DOUBLING_FLOOR: Duration = Duration::from_secs(1);

/// Computes the next inter-call delay
///
/// Implemented for every `Fn(Duration, u32) -> Duration`, so plain functions
/// and closures can be passed wherever a strategy is expected.
///
/// # Example
///
/// ```rust
/// use exoscale_polling::poll::StepStrategy;
/// use std::time::Duration;
///
/// // Add half a second per call, whatever the previous delay was.
/// let step = |_previous: Duration, calls: u32| Duration::from_millis(500) * calls;
/// assert_eq!(step.next_delay(Duration::ZERO, 3), Duration::from_millis(1500));
/// ```
pub trait StepStrategy: Send + Sync {
    /// Delay to apply before the next call
    ///
    /// # Arguments
    ///
    /// * `previous` - The delay that was applied before the call that just failed
    /// * `calls` - The number of probe calls made so far
    fn next_delay(&self, previous: Duration, calls: u32) -> Duration;
}

impl<F> StepStrategy for F
where
    F: Fn(Duration, u32) -> Duration + Send + Sync,
{
    fn next_delay(&self, previous: Duration, calls: u32) -> Duration {
        self(previous, calls)
    }
}

impl StepStrategy for StepKind {
    fn next_delay(&self, previous: Duration, calls: u32) -> Duration {
        match self {
            StepKind::Constant => constant(previous, calls),
            StepKind::LinearDoubling => linear_doubling(previous, calls),
        }
    }
}

/// Always returns the previous delay
pub fn constant(previous: Duration, _calls: u32) -> Duration {
    previous
}

/// Returns `previous + max(previous, 1s)`
///
/// Starting from one second this yields 1, 2, 4, 8, ... seconds; starting
/// from zero the first step jumps to one second.
///
/// ```rust
/// use exoscale_polling::poll::linear_doubling;
/// use std::time::Duration;
///
/// assert_eq!(linear_doubling(Duration::from_secs(2), 1), Duration::from_secs(4));
/// assert_eq!(linear_doubling(Duration::ZERO, 1), Duration::from_secs(1));
/// ```
pub fn linear_doubling(previous: Duration, _calls: u32) -> Duration {
    previous.saturating_add(previous.max(DOUBLING_FLOOR))
}
