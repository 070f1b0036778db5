use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::broadcast,
    time::{Duration, Instant},
};
use tracing::{debug, error, info};

use crate::{
    clock::Clock,
    core::{
        flags::{FlagIndex, FlagIndexSnapshot},
        freeze::{CompetitionWindow, FreezePolicy},
        scoreboard::{assemble_scoreboard, visible_in_detail},
        scoring::{task_values, TaskValue},
    },
    model::{SolveEvent, TaskSummary},
    persist::{PersistError, PersistResult, RecordOutcome, SolveLedger, TaskCatalogue, TeamDirectory},
    runtime::events::EngineEvent,
    types::{TaskId, TeamId, TimestampMs},
};

use super::error::{EngineError, EngineResult, TransientFailure};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// One ranked scoreboard line with the team's display attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreboardRow {
    /// 1-based position.
    pub rank: usize,
    pub team_id: TeamId,
    pub team_name: String,
    pub country: String,
    pub points: u64,
    pub tasks_solved: u64,
    pub last_solve_at_ms: TimestampMs,
    /// Every solve of the team, newest first, minus freeze-hidden ones.
    pub solved: Vec<SolvedTask>,
}

/// Team that solved a given task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSolver {
    pub team_id: TeamId,
    pub team_name: String,
    pub solved_at_ms: TimestampMs,
}

/// Task solved by a given team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolvedTask {
    pub task_id: TaskId,
    pub task_name: String,
    pub solved_at_ms: TimestampMs,
}

/// Aggregate figures over the whole competition window, never freeze-filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionStats {
    pub start_ms: TimestampMs,
    pub end_ms: TimestampMs,
    pub total_solves: u64,
    pub total_teams: u64,
    pub total_countries: u64,
    pub unsolved_tasks: u64,
}

/// Storage collaborators and settings an engine is built from.
pub struct EngineParts {
    pub catalogue: Arc<dyn TaskCatalogue>,
    pub ledger: Arc<dyn SolveLedger>,
    pub teams: Arc<dyn TeamDirectory>,
    pub clock: Arc<dyn Clock>,
    pub window: CompetitionWindow,
    /// Budget used by [`ScoringEngine::deadline`].
    pub request_timeout: Duration,
}

/// Flag resolution and scoring engine.
///
/// Submissions resolve tokens against the in-memory flag snapshot and append
/// to the ledger; every read recomputes standings from the ledger.
pub struct ScoringEngine {
    catalogue: Arc<dyn TaskCatalogue>,
    ledger: Arc<dyn SolveLedger>,
    teams: Arc<dyn TeamDirectory>,
    clock: Arc<dyn Clock>,
    flags: FlagIndex,
    freeze: FreezePolicy,
    request_timeout: Duration,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl ScoringEngine {
    /// Builds an engine with an empty flag snapshot; call
    /// [`ScoringEngine::refresh_flags`] or spawn the refresher before serving.
    pub fn new(parts: EngineParts) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            catalogue: parts.catalogue,
            ledger: parts.ledger,
            teams: parts.teams,
            clock: parts.clock,
            flags: FlagIndex::new(),
            freeze: FreezePolicy::new(parts.window),
            request_timeout: parts.request_timeout,
            events_tx,
        }
    }

    /// Builds an engine whose three storage seams share one store.
    pub fn with_store<S>(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        window: CompetitionWindow,
        request_timeout: Duration,
    ) -> Self
    where
        S: TaskCatalogue + SolveLedger + TeamDirectory + 'static,
    {
        Self::new(EngineParts {
            catalogue: Arc::clone(&store) as Arc<dyn TaskCatalogue>,
            ledger: Arc::clone(&store) as Arc<dyn SolveLedger>,
            teams: store as Arc<dyn TeamDirectory>,
            clock,
            window,
            request_timeout,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    pub fn flag_index(&self) -> &FlagIndex {
        &self.flags
    }

    /// Deadline one request timeout from now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.request_timeout
    }

    pub fn now_ms(&self) -> TimestampMs {
        self.clock.now_ms()
    }

    /// Rebuilds the flag snapshot from the catalogue and publishes it.
    ///
    /// On failure the previous snapshot stays current.
    pub async fn refresh_flags(&self, deadline: Instant) -> Result<usize, TransientFailure> {
        let now = self.clock.now_ms();
        let catalogue = Arc::clone(&self.catalogue);
        match run_blocking(deadline, move || catalogue.activated_flags(now)).await {
            Ok(flags) => {
                let snapshot = FlagIndexSnapshot::from_flags(flags, now);
                let count = snapshot.len();
                self.flags.publish(snapshot);
                debug!(flags = count, built_at_ms = now, "flag index refreshed");
                let _ = self.events_tx.send(EngineEvent::FlagIndexRefreshed { flags: count });
                Ok(count)
            }
            Err(err) => {
                error!(error = %err, "not updating flags");
                let _ = self.events_tx.send(EngineEvent::FlagIndexRefreshFailed);
                Err(err)
            }
        }
    }

    /// Credits `team_id` with the task `token` proves.
    pub async fn submit_flag(&self, team_id: TeamId, token: &str, deadline: Instant) -> EngineResult<SolveEvent> {
        let Some(task_id) = self.flags.resolve(token) else {
            debug!(team_id, "invalid flag submitted");
            return Err(EngineError::InvalidToken);
        };

        let at_ms = self.clock.now_ms();
        let ledger = Arc::clone(&self.ledger);
        let expires = deadline.into_std();
        let outcome = run_blocking(deadline, move || {
            ledger.record_solve_within(team_id, task_id, at_ms, expires)
        })
        .await?;

        match outcome {
            RecordOutcome::Created(event) => {
                info!(team_id, task_id, solve_id = event.id, "task solved");
                let _ = self.events_tx.send(EngineEvent::Solved {
                    solve_id: event.id,
                    team_id,
                    task_id,
                });
                Ok(event)
            }
            RecordOutcome::AlreadySolved => {
                debug!(team_id, task_id, "task already solved");
                Err(EngineError::AlreadySolved)
            }
        }
    }

    /// Current standings inside the effective scoring window.
    pub async fn scoreboard(&self, deadline: Instant) -> EngineResult<Vec<ScoreboardRow>> {
        let now = self.clock.now_ms();
        let window = self.freeze.scoring_window(now);
        let ledger = Arc::clone(&self.ledger);
        let events = run_blocking(deadline, move || ledger.solves_between(window.from_ms, window.to_ms)).await?;

        let entries = assemble_scoreboard(&events, window);
        let ids: Vec<TeamId> = entries.iter().map(|e| e.team_id).collect();
        let catalogue = Arc::clone(&self.catalogue);
        let ledger = Arc::clone(&self.ledger);
        let teams = Arc::clone(&self.teams);
        let (profiles, solves, task_names) = run_blocking(deadline, move || {
            let profiles = teams.lookup_teams(&ids)?;
            let solves = ledger.solves_for_teams(&ids)?;
            let task_ids: Vec<TaskId> = solves
                .iter()
                .map(|e| e.task_id)
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            Ok((profiles, solves, catalogue.task_names(&task_ids)?))
        })
        .await?;

        let mut solved_by_team: HashMap<TeamId, Vec<SolvedTask>> = HashMap::new();
        for event in visible_in_detail(&self.freeze, now, solves) {
            let solved = named_solve(&task_names, &event)?;
            solved_by_team.entry(event.team_id).or_default().push(solved);
        }

        entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| -> EngineResult<ScoreboardRow> {
                let team = profiles.get(&entry.team_id).ok_or_else(|| {
                    TransientFailure::Inconsistent(format!("team {} scored but not in directory", entry.team_id))
                })?;
                Ok(ScoreboardRow {
                    rank: idx + 1,
                    team_id: entry.team_id,
                    team_name: team.name.clone(),
                    country: team.country.clone(),
                    points: entry.points,
                    tasks_solved: entry.tasks_solved,
                    last_solve_at_ms: entry.last_solve_at_ms,
                    solved: solved_by_team.remove(&entry.team_id).unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Activated tasks with their current points and solver counts.
    pub async fn tasks(&self, deadline: Instant) -> EngineResult<Vec<TaskSummary>> {
        let now = self.clock.now_ms();
        let window = self.freeze.scoring_window(now);
        let catalogue = Arc::clone(&self.catalogue);
        let ledger = Arc::clone(&self.ledger);
        let (tasks, events) = run_blocking(deadline, move || {
            Ok((
                catalogue.activated_tasks(now)?,
                ledger.solves_between(window.from_ms, window.to_ms)?,
            ))
        })
        .await?;

        let values = task_values(&events, window);
        Ok(tasks
            .into_iter()
            .map(|task| {
                let value = values.get(&task.id).copied().unwrap_or_else(TaskValue::unsolved);
                TaskSummary {
                    id: task.id,
                    name: task.name,
                    categories: task.categories,
                    difficulty: task.difficulty,
                    description: task.description,
                    points: value.points,
                    solvers: value.solvers,
                }
            })
            .collect())
    }

    /// Teams that solved `task_id`, oldest first, minus freeze-hidden solves.
    pub async fn task_solvers(&self, task_id: TaskId, deadline: Instant) -> EngineResult<Vec<TaskSolver>> {
        let now = self.clock.now_ms();
        let ledger = Arc::clone(&self.ledger);
        let events = run_blocking(deadline, move || ledger.solves_for_task(task_id, now)).await?;
        let visible = visible_in_detail(&self.freeze, now, events);

        let ids: Vec<TeamId> = visible.iter().map(|e| e.team_id).collect();
        let teams = Arc::clone(&self.teams);
        let profiles = run_blocking(deadline, move || teams.lookup_teams(&ids)).await?;

        visible
            .into_iter()
            .map(|event| -> EngineResult<TaskSolver> {
                let team = profiles.get(&event.team_id).ok_or_else(|| {
                    TransientFailure::Inconsistent(format!("solver team {} not in directory", event.team_id))
                })?;
                Ok(TaskSolver {
                    team_id: event.team_id,
                    team_name: team.name.clone(),
                    solved_at_ms: event.created_at_ms,
                })
            })
            .collect()
    }

    /// Public solve history of `team_id`, newest first, minus freeze-hidden solves.
    pub async fn team_solve_history(&self, team_id: TeamId, deadline: Instant) -> EngineResult<Vec<SolvedTask>> {
        self.solve_history(team_id, true, deadline).await
    }

    /// Solve history a team sees of itself; the freeze does not apply.
    pub async fn own_solve_history(&self, team_id: TeamId, deadline: Instant) -> EngineResult<Vec<SolvedTask>> {
        self.solve_history(team_id, false, deadline).await
    }

    /// Totals over the full competition window.
    pub async fn competition_stats(&self, deadline: Instant) -> EngineResult<CompetitionStats> {
        let now = self.clock.now_ms();
        let full = self.freeze.full_window();
        let catalogue = Arc::clone(&self.catalogue);
        let ledger = Arc::clone(&self.ledger);
        let teams = Arc::clone(&self.teams);
        let (events, census, tasks) = run_blocking(deadline, move || {
            Ok((
                ledger.solves_between(full.from_ms, full.to_ms)?,
                teams.team_census(full.to_ms)?,
                catalogue.activated_tasks(now)?,
            ))
        })
        .await?;

        let solved: HashSet<TaskId> = events.iter().map(|e| e.task_id).collect();
        let unsolved = tasks.iter().filter(|t| !solved.contains(&t.id)).count();

        Ok(CompetitionStats {
            start_ms: full.from_ms,
            end_ms: full.to_ms,
            total_solves: events.len() as u64,
            total_teams: census.teams,
            total_countries: census.countries,
            unsolved_tasks: unsolved as u64,
        })
    }

    async fn solve_history(&self, team_id: TeamId, apply_freeze: bool, deadline: Instant) -> EngineResult<Vec<SolvedTask>> {
        let catalogue = Arc::clone(&self.catalogue);
        let ledger = Arc::clone(&self.ledger);
        // Names are looked up without the activation filter: a task unscheduled
        // after being solved keeps its history.
        let (events, names) = run_blocking(deadline, move || {
            let events = ledger.solves_for_team(team_id)?;
            let ids: Vec<TaskId> = events.iter().map(|e| e.task_id).collect();
            Ok((events, catalogue.task_names(&ids)?))
        })
        .await?;

        let events = if apply_freeze {
            visible_in_detail(&self.freeze, self.clock.now_ms(), events)
        } else {
            events
        };
        events.iter().map(|event| named_solve(&names, event)).collect()
    }
}

fn named_solve(names: &HashMap<TaskId, String>, event: &SolveEvent) -> EngineResult<SolvedTask> {
    let name = names.get(&event.task_id).ok_or_else(|| {
        TransientFailure::Inconsistent(format!("solved task {} not in catalogue", event.task_id))
    })?;
    Ok(SolvedTask {
        task_id: event.task_id,
        task_name: name.clone(),
        solved_at_ms: event.created_at_ms,
    })
}

/// Runs one storage call on the blocking pool, bounded by `deadline`.
///
/// An already expired deadline fails before dispatch, and again on the
/// worker if the call waited in the pool queue. Once the call starts, expiry
/// only abandons the wait; writes go through `record_solve_within`, which
/// re-checks the deadline right before inserting.
async fn run_blocking<T, F>(deadline: Instant, f: F) -> Result<T, TransientFailure>
where
    F: FnOnce() -> PersistResult<T> + Send + 'static,
    T: Send + 'static,
{
    if Instant::now() >= deadline {
        return Err(TransientFailure::DeadlineExceeded);
    }
    let expires = deadline.into_std();
    let task = tokio::task::spawn_blocking(move || {
        if std::time::Instant::now() >= expires {
            return Err(PersistError::DeadlineExceeded);
        }
        f()
    });
    match tokio::time::timeout_at(deadline, task).await {
        Err(_) => Err(TransientFailure::DeadlineExceeded),
        Ok(Err(join)) => Err(TransientFailure::Worker(format!("join error: {join}"))),
        Ok(Ok(Err(PersistError::DeadlineExceeded))) => Err(TransientFailure::DeadlineExceeded),
        Ok(Ok(result)) => result.map_err(TransientFailure::from),
    }
}
