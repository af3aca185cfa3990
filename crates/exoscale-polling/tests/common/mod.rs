//! Shared fixtures for the resource wait tests
//!
//! [`FakeApi`] stands in for the Exoscale control plane: every request pops
//! the next scripted response, and the last response repeats once the
//! script runs out.

#![allow(dead_code)]

use exoscale_polling::{OperationStatus, ProbeError};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub const ZONE: &str = "ch-gva-2";
pub const INSTANCE_ID: &str = "8a3f0c2e-4a51-4f3f-9b1e-2f6c7d1a9e10";

/// Lifecycle state of a compute instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstanceState::Starting => "starting",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// A scripted API response: a body or an HTTP error status
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Status(u16),
}

/// Scripted control-plane replies
pub struct FakeApi<T> {
    replies: Mutex<VecDeque<Reply<T>>>,
    requests: AtomicU32,
}

impl<T: Clone> FakeApi<T> {
    pub fn new(replies: impl IntoIterator<Item = Reply<T>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: AtomicU32::new(0),
        }
    }

    /// Number of requests served so far
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Serve the next reply, classifying error statuses
    pub async fn request(&self, path: &str) -> Result<T, ProbeError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            }
        };
        match reply.expect("FakeApi has no scripted replies") {
            Reply::Ok(body) => Ok(body),
            Reply::Status(status) => Err(ProbeError::from_status(status, path)),
        }
    }
}

impl FakeApi<InstanceState> {
    pub async fn instance_state(&self, zone: &str, id: &str) -> Result<InstanceState, ProbeError> {
        self.request(&format!("/v2/{}/instance/{}", zone, id)).await
    }
}

impl FakeApi<String> {
    /// Fetch and parse an operation
    pub async fn get_operation(&self, id: &str) -> Result<OperationStatus, ProbeError> {
        let body = self.request(&format!("/v2/operation/{}", id)).await?;
        OperationStatus::from_json(&body).map_err(|e| ProbeError::other(e.to_string()))
    }
}

/// A JSON operation body in the given state
pub fn operation_body(state: &str, reason: Option<&str>) -> String {
    let reason = reason
        .map(|r| format!(r#", "reason": "{}""#, r))
        .unwrap_or_default();
    format!(
        r#"{{"id": "e2047130-b86e-11ef-83b3-0d8312b2c2d7", "state": "{}"{}, "reference": {{"id": "{}", "link": "/v2/instance/{}", "command": "get-instance"}}}}"#,
        state, reason, INSTANCE_ID, INSTANCE_ID
    )
}
