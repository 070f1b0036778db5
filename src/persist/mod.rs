//! Storage seams consumed by the engine, plus the SQLite implementation.

pub mod sqlite;

use std::time::Instant;

use hashbrown::HashMap;
use thiserror::Error;

use crate::{
    model::{ActivatedFlag, SolveEvent, TaskRecord, TeamCensus, TeamProfile},
    types::{TaskId, TeamId, TimestampMs},
};

/// Storage failure. Every variant is transient from the caller's view.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage connection lock poisoned")]
    Poisoned,
    /// The caller's deadline passed before the write was issued.
    #[error("deadline passed before storage call")]
    DeadlineExceeded,
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Result of appending a solve to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The row was inserted.
    Created(SolveEvent),
    /// The `(team, task)` uniqueness constraint rejected the insert.
    AlreadySolved,
}

/// Read-only view of tasks eligible for play.
pub trait TaskCatalogue: Send + Sync {
    /// Flags of every task whose start time is at or before `now_ms`.
    fn activated_flags(&self, now_ms: TimestampMs) -> PersistResult<Vec<ActivatedFlag>>;

    /// Every task whose start time is at or before `now_ms`, ordered by id.
    fn activated_tasks(&self, now_ms: TimestampMs) -> PersistResult<Vec<TaskRecord>>;

    /// Names of the given tasks regardless of activation; unknown ids are absent.
    fn task_names(&self, ids: &[TaskId]) -> PersistResult<HashMap<TaskId, String>>;
}

/// Append-only, `(team, task)`-unique record of solves.
pub trait SolveLedger: Send + Sync {
    /// Appends one solve. Uniqueness is enforced by storage, not by callers.
    fn record_solve(&self, team_id: TeamId, task_id: TaskId, at_ms: TimestampMs) -> PersistResult<RecordOutcome>;

    /// Like [`SolveLedger::record_solve`], but refuses to write once `expires` has passed.
    ///
    /// Implementations should check as late as possible, after any lock wait.
    fn record_solve_within(
        &self,
        team_id: TeamId,
        task_id: TaskId,
        at_ms: TimestampMs,
        expires: Instant,
    ) -> PersistResult<RecordOutcome> {
        if Instant::now() >= expires {
            return Err(PersistError::DeadlineExceeded);
        }
        self.record_solve(team_id, task_id, at_ms)
    }

    /// Solves created inside `[from_ms, to_ms]`, in id order.
    fn solves_between(&self, from_ms: TimestampMs, to_ms: TimestampMs) -> PersistResult<Vec<SolveEvent>>;

    /// Solves of `task_id`, oldest first; empty unless the task started by `activated_by_ms`.
    fn solves_for_task(&self, task_id: TaskId, activated_by_ms: TimestampMs) -> PersistResult<Vec<SolveEvent>>;

    /// Solves of `team_id`, newest first.
    fn solves_for_team(&self, team_id: TeamId) -> PersistResult<Vec<SolveEvent>>;

    /// Solves of every team in `team_ids`, newest first.
    fn solves_for_teams(&self, team_ids: &[TeamId]) -> PersistResult<Vec<SolveEvent>> {
        let mut out = Vec::new();
        for team_id in team_ids {
            out.extend(self.solves_for_team(*team_id)?);
        }
        out.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms).then_with(|| b.id.cmp(&a.id)));
        Ok(out)
    }
}

/// Team display data owned by an external collaborator.
pub trait TeamDirectory: Send + Sync {
    /// Profiles for the ids that exist; unknown ids are absent from the map.
    fn lookup_teams(&self, ids: &[TeamId]) -> PersistResult<HashMap<TeamId, TeamProfile>>;

    /// Teams registered before `registered_before_ms` and their distinct countries.
    fn team_census(&self, registered_before_ms: TimestampMs) -> PersistResult<TeamCensus>;
}
