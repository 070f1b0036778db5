use std::cmp::Ordering;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        freeze::{FreezePolicy, ScoringWindow},
        scoring::{task_values, TaskValue},
    },
    model::SolveEvent,
    types::{SolveId, TaskId, TeamId, TimestampMs},
};

/// Derived standing of one team; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreboardEntry {
    pub team_id: TeamId,
    pub points: u64,
    pub tasks_solved: u64,
    /// Timestamp of the counted solve with the greatest id.
    pub last_solve_at_ms: TimestampMs,
    pub last_solve_id: SolveId,
    pub last_task_id: TaskId,
}

/// Ranks teams from the events inside `window`.
///
/// Order: points descending, then the last counted solve's timestamp
/// ascending, then team id ascending. Teams without a counted solve are
/// omitted.
pub fn assemble_scoreboard(events: &[SolveEvent], window: ScoringWindow) -> Vec<ScoreboardEntry> {
    let values = task_values(events, window);
    let mut seen: HashSet<(TeamId, TaskId)> = HashSet::new();
    let mut by_team: HashMap<TeamId, ScoreboardEntry> = HashMap::new();

    for event in events {
        if !window.contains(event.created_at_ms) || !seen.insert((event.team_id, event.task_id)) {
            continue;
        }
        let value = values
            .get(&event.task_id)
            .copied()
            .unwrap_or_else(TaskValue::unsolved);

        let entry = by_team.entry(event.team_id).or_insert(ScoreboardEntry {
            team_id: event.team_id,
            points: 0,
            tasks_solved: 0,
            last_solve_at_ms: event.created_at_ms,
            last_solve_id: event.id,
            last_task_id: event.task_id,
        });
        entry.points += u64::from(value.points);
        entry.tasks_solved += 1;
        if event.id >= entry.last_solve_id {
            entry.last_solve_id = event.id;
            entry.last_solve_at_ms = event.created_at_ms;
            entry.last_task_id = event.task_id;
        }
    }

    let mut out: Vec<ScoreboardEntry> = by_team.into_values().collect();
    out.sort_by(compare_entries);
    out
}

fn compare_entries(a: &ScoreboardEntry, b: &ScoreboardEntry) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| a.last_solve_at_ms.cmp(&b.last_solve_at_ms))
        .then_with(|| a.team_id.cmp(&b.team_id))
}

/// Drops events the freeze hides from per-task and per-team listings.
pub fn visible_in_detail<I>(policy: &FreezePolicy, now_ms: TimestampMs, events: I) -> Vec<SolveEvent>
where
    I: IntoIterator<Item = SolveEvent>,
{
    events
        .into_iter()
        .filter(|e| !policy.is_hidden_from_detail(now_ms, e.created_at_ms))
        .collect()
}
