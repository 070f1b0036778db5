//! Shared primitive identifiers and timestamps.

/// Team identifier, owned by the team directory.
pub type TeamId = u64;
/// Task identifier, owned by the task catalogue.
pub type TaskId = u64;
/// Monotonic solve identifier; assignment order is arrival order.
pub type SolveId = u64;
/// Milliseconds since the Unix epoch.
pub type TimestampMs = u64;
