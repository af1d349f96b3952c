//! Error taxonomy.
//!
//! Capture degradation is deliberately absent: a failed capture substitutes
//! the synthetic pattern and is never an error to the caller.

use thiserror::Error;

/// Failures surfaced by the session manager. All map to HTTP 503.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session id outside the fixed slot range.
    #[error("invalid session id {id}")]
    InvalidSession { id: i64 },

    /// Backend resource setup (FIFO, display connection) failed during
    /// creation. The slot is torn back down before this is returned.
    #[error("session {id} resource setup failed: {reason}")]
    ResourceExhausted { id: usize, reason: String },

    /// The target program could not be spawned (missing WAD, exec failure).
    #[error("failed to spawn doom for session {id}: {reason}")]
    SpawnFailed { id: usize, reason: String },
}

/// Failures surfaced by an input sink.
#[derive(Error, Debug)]
pub enum InputError {
    /// Malformed payload, unresolvable key, or missing injection capability.
    /// Maps to HTTP 400.
    #[error("input rejected: {reason}")]
    Rejected { reason: String },

    /// Transport-level write failure to the sink (e.g. no FIFO reader).
    /// Maps to HTTP 500; the session is untouched.
    #[error("input delivery failed: {reason}")]
    DeliveryFailed { reason: String },
}

/// JPEG encoding failure. Fatal to the current stream connection only.
#[derive(Error, Debug)]
#[error("jpeg encoding failed: {reason}")]
pub struct EncodeError {
    pub reason: String,
}
