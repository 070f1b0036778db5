use hashbrown::{HashMap, HashSet};

use crate::{
    core::freeze::ScoringWindow,
    model::SolveEvent,
    types::{TaskId, TeamId},
};

/// Value of a task solved by exactly one team.
pub const MAX_POINTS: u32 = 500;
/// Floor no task value drops below.
pub const MIN_POINTS: u32 = 50;
/// Points lost per doubling of `(solvers + 3) / 4`.
pub const DECAY_PER_DOUBLING: f64 = 80.0;

/// Current value and solver count of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskValue {
    pub points: u32,
    pub solvers: u64,
}

impl TaskValue {
    pub fn unsolved() -> Self {
        Self {
            points: points_for_solvers(0),
            solvers: 0,
        }
    }
}

/// `max(50, floor(500 - 80 * log2((max(1, n) + 3) / 4)))`
pub fn points_for_solvers(solvers: u64) -> u32 {
    let n = solvers.max(1) as f64;
    let raw = (f64::from(MAX_POINTS) - DECAY_PER_DOUBLING * ((n + 3.0) / 4.0).log2()).floor();
    if raw <= f64::from(MIN_POINTS) {
        MIN_POINTS
    } else {
        raw as u32
    }
}

/// Distinct solving teams per task, counting only events inside `window`.
pub fn solver_counts(events: &[SolveEvent], window: ScoringWindow) -> HashMap<TaskId, u64> {
    let mut seen: HashSet<(TeamId, TaskId)> = HashSet::new();
    let mut counts: HashMap<TaskId, u64> = HashMap::new();
    for event in events {
        if !window.contains(event.created_at_ms) {
            continue;
        }
        if seen.insert((event.team_id, event.task_id)) {
            *counts.entry(event.task_id).or_insert(0) += 1;
        }
    }
    counts
}

/// Point values for every task with at least one counted solve.
///
/// Tasks absent from the map are worth [`TaskValue::unsolved`].
pub fn task_values(events: &[SolveEvent], window: ScoringWindow) -> HashMap<TaskId, TaskValue> {
    solver_counts(events, window)
        .into_iter()
        .map(|(task_id, solvers)| {
            (
                task_id,
                TaskValue {
                    points: points_for_solvers(solvers),
                    solvers,
                },
            )
        })
        .collect()
}
