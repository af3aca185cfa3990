//! Configuration types for polling runs

mod poll_policy;

pub use poll_policy::*;
