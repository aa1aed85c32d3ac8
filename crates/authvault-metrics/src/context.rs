//! `RequestContext`: the ambient state threaded explicitly through every
//! public authvault call (spec.md §5, §9 "Per-session ambient state").
//!
//! Rust has no task-local suitable for this without hiding the dependency
//! behind `tokio::task_local!`; spec.md §9 explicitly prefers a leading
//! "request context" parameter for languages without ambient context, so
//! that is the shape used here.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Per-request metadata: correlation id, request id, deadline, environment
/// tag, and a small metadata map. Draw logs and metrics from this, not from
/// ambient globals.
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: String,
    request_id: String,
    start_time: Instant,
    deadline: Option<Instant>,
    metadata: BTreeMap<String, String>,
    environment: String,
}

impl RequestContext {
    /// Start a new root context with a fresh correlation id.
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            request_id: Uuid::new_v4().to_string(),
            start_time: Instant::now(),
            deadline: None,
            metadata: BTreeMap::new(),
            environment: environment.into(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Attach a deadline `timeout` from now. Used by the caller-provided
    /// cancellation/deadline propagation in spec.md §5.
    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        self.deadline = Some(self.start_time + timeout);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// True once the attached deadline, if any, has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Elapsed time since this context (or its root) started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Derive a child context for a nested call: isolates its own metadata
    /// but inherits the correlation id unless the caller overrides it
    /// (spec.md §5 "Nested contexts isolate their metadata but inherit the
    /// correlation id if not overridden").
    pub fn child(&self) -> Self {
        Self {
            correlation_id: self.correlation_id.clone(),
            request_id: Uuid::new_v4().to_string(),
            start_time: Instant::now(),
            deadline: self.deadline,
            metadata: BTreeMap::new(),
            environment: self.environment.clone(),
        }
    }
}
