//! Polling engine
//!
//! Repeatedly invokes a caller-supplied probe until a success predicate
//! holds, a call budget is spent, or a wall-clock deadline passes. Resource
//! wrappers use it to await asynchronous cloud operations such as an
//! instance reaching the `running` state.
//!
//! # Features
//!
//! - Call budget (`max_tries`) and deadline (`timeout`), independently optional
//! - Pure step strategies: `constant` (default), `linear_doubling`, or any
//!   `Fn(Duration, u32) -> Duration`
//! - Probe errors filtered by [`ErrorKind`]: ignored kinds are retried,
//!   others abort the run unchanged
//! - Optional collection of every observed value
//! - Observable runs via the `PollObserver` trait, with a `TracingObserver`
//!
//! # Example
//!
//! ```rust,no_run
//! use exoscale_polling::poll::{equals, ErrorKind, Poller, PollError, ProbeError};
//! use std::time::Duration;
//!
//! async fn instance_state() -> Result<&'static str, ProbeError> {
//!     Ok("running")
//! }
//!
//! async fn example() -> Result<(), PollError<&'static str, ProbeError>> {
//!     let poller = Poller::builder()
//!         .with_timeout(Duration::from_secs(300))
//!         .with_initial_delay(Duration::from_secs(2))
//!         .ignore(ErrorKind::Server)
//!         .build();
//!
//!     poller.poll(instance_state, equals("running")).await?;
//!     Ok(())
//! }
//! ```

mod classify;
mod error;
mod executor;
mod observer;
mod strategies;
mod truthy;

pub use classify::{Classify, ErrorKind, ProbeError};
pub use error::PollError;
pub use executor::{
    poll_with_policy, with_args, Observed, Polled, Poller, PollerBuilder, DEFAULT_INITIAL_DELAY,
};
pub use observer::{NoOpObserver, PollObserver, StatsObserver, TracingObserver};
pub use strategies::{constant, linear_doubling, StepStrategy};
pub use truthy::{equals, is_truthy, Truthy};
