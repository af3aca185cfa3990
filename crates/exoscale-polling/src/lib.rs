//! # exoscale-polling
//!
//! Polling engine used by the Exoscale resource wrappers to await
//! asynchronous control-plane operations:
//! - A bounded probe loop with call-count and wall-clock limits
//! - Pure step strategies (constant, linear-doubling, custom)
//! - Selective suppression of probe errors by category
//! - Optional collection of every observed probe value
//! - A waiter for server-side asynchronous operations
//! - Serde-loadable polling policies

pub mod error;
pub mod operation;
pub mod poll;
pub mod types;

pub use error::{Error, Result};
pub use operation::{OperationError, OperationState, OperationStatus, OperationWaiter};
pub use poll::{
    is_truthy, poll_with_policy, with_args, ErrorKind, Observed, PollError, Polled, Poller,
    PollerBuilder, ProbeError,
};
pub use types::{PollPoliciesConfig, PollPolicy, StepKind};
