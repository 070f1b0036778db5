//! Task, team, and solve records exchanged with storage and callers.

use serde::{Deserialize, Serialize};

use crate::types::{SolveId, TaskId, TeamId, TimestampMs};

/// Catalogue row for a task, without derived scoring fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Stable task identifier.
    pub id: TaskId,
    /// Display name.
    pub name: String,
    /// Category tags, e.g. `["web", "crypto"]`.
    pub categories: Vec<String>,
    /// Free-form difficulty label.
    pub difficulty: String,
    /// Task statement.
    pub description: String,
    /// Activation time; `None` means the task is not scheduled.
    pub started_at_ms: Option<TimestampMs>,
}

/// Insert payload used to create a new task together with its flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Display name.
    pub name: String,
    /// Category tags.
    pub categories: Vec<String>,
    /// Free-form difficulty label.
    pub difficulty: String,
    /// Task statement.
    pub description: String,
    /// Activation time; `None` leaves the task unscheduled.
    pub started_at_ms: Option<TimestampMs>,
    /// Accepted flag strings. Each flag must be globally unique.
    pub flags: Vec<String>,
}

/// One accepted flag of an activated task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivatedFlag {
    /// Task the flag proves.
    pub task_id: TaskId,
    /// Secret flag string.
    pub flag: String,
    /// Activation time of the owning task.
    pub started_at_ms: TimestampMs,
}

/// Task as shown to players, with derived points and solver count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Stable task identifier.
    pub id: TaskId,
    /// Display name.
    pub name: String,
    /// Category tags.
    pub categories: Vec<String>,
    /// Free-form difficulty label.
    pub difficulty: String,
    /// Task statement.
    pub description: String,
    /// Current point value.
    pub points: u32,
    /// Distinct teams counted inside the current scoring window.
    pub solvers: u64,
}

/// Display attributes of a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamProfile {
    /// Stable team identifier.
    pub id: TeamId,
    /// Display name.
    pub name: String,
    /// Country code, possibly empty.
    pub country: String,
    /// Affiliation, possibly empty.
    pub affiliation: String,
    /// Website, possibly empty.
    pub website: String,
    /// Registration time.
    pub created_at_ms: TimestampMs,
}

/// Insert payload used to register a team.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewTeam {
    /// Display name; unique.
    pub name: String,
    /// Country code.
    pub country: String,
    /// Affiliation.
    pub affiliation: String,
    /// Website.
    pub website: String,
    /// Registration time.
    pub created_at_ms: TimestampMs,
}

/// Team and country counts for the statistics view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TeamCensus {
    /// Registered teams.
    pub teams: u64,
    /// Distinct non-empty countries among those teams.
    pub countries: u64,
}

/// Immutable ledger row: one team solved one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SolveEvent {
    /// Monotonic identifier assigned by storage.
    pub id: SolveId,
    /// Solving team.
    pub team_id: TeamId,
    /// Solved task.
    pub task_id: TaskId,
    /// Creation time.
    pub created_at_ms: TimestampMs,
}
