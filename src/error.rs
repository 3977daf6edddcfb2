//! Crate-wide error taxonomy. Per-tick errors are caught inside the room
//! actor, logged with structured fields, and never escape to crash the
//! process; only startup errors propagate out of `main`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomError {
    /// Malformed message, NaN angle, unknown `input` variant. Dropped,
    /// counted, never disconnects the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A message referenced a sessionId with no body — a race during
    /// leave. Dropped, debug-logged.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// Duplicate body id on add. Fatal for that join attempt only.
    #[error("conflict: body id already present: {0}")]
    Conflict(String),

    /// World file missing or invalid at startup. The room still starts,
    /// degraded (empty planet set).
    #[error("failed to load world config: {0}")]
    ConfigLoadFailure(String),

    /// A logic bug produced a non-monotonic `physicsStep` or similar
    /// invariant violation. Fatal for the room: fail fast rather than
    /// broadcast divergent state.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),
}
