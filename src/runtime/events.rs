//! Engine event stream payloads.

use crate::types::{SolveId, TaskId, TeamId};

/// Events broadcast by the engine and its background refresher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A new solve was recorded.
    Solved {
        /// Ledger id of the new row.
        solve_id: SolveId,
        /// Solving team.
        team_id: TeamId,
        /// Solved task.
        task_id: TaskId,
    },
    /// A new flag snapshot was published.
    FlagIndexRefreshed {
        /// Number of flags in the new snapshot.
        flags: usize,
    },
    /// A refresh failed; the previous snapshot stays current.
    FlagIndexRefreshFailed,
}
