//! SQLite-backed task catalogue, solve ledger, and team directory.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use rusqlite::{Connection, ErrorCode, Row, params, params_from_iter};

use crate::{
    model::{ActivatedFlag, NewTask, NewTeam, SolveEvent, TaskRecord, TeamCensus, TeamProfile},
    types::{SolveId, TaskId, TeamId, TimestampMs},
};

use super::{PersistError, PersistResult, RecordOutcome, SolveLedger, TaskCatalogue, TeamDirectory};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SOLVE_COLUMNS: &str = "solves.id, solves.team_id, solves.task_id, solves.created_at_ms";

/// SQLite implementation of every storage seam.
///
/// Several stores may open the same database file; the `(team, task)`
/// unique index is shared by all of them.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates a database at `path`.
    ///
    /// Enables WAL mode, `synchronous=NORMAL`, and foreign keys.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Registers a team.
    pub fn add_team(&self, team: NewTeam) -> PersistResult<TeamId> {
        let conn = self.lock()?;
        let id: i64 = conn.query_row(
            "INSERT INTO teams(name, country, affiliation, website, created_at_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
            params![
                team.name,
                team.country,
                team.affiliation,
                team.website,
                team.created_at_ms as i64,
            ],
            |row| row.get(0),
        )?;
        Ok(id as TeamId)
    }

    /// Creates a task and its flags in one transaction.
    pub fn add_task(&self, task: NewTask) -> PersistResult<TaskId> {
        let categories = serde_json::to_string(&task.categories)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id: i64 = tx.query_row(
            "INSERT INTO tasks(name, description, categories, difficulty, started_at_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
            params![
                task.name,
                task.description,
                categories,
                task.difficulty,
                task.started_at_ms.map(|v| v as i64),
            ],
            |row| row.get(0),
        )?;
        {
            let mut stmt = tx.prepare("INSERT INTO task_flags(task_id, flag) VALUES (?1, ?2)")?;
            for flag in &task.flags {
                stmt.execute(params![id, flag])?;
            }
        }
        tx.commit()?;
        Ok(id as TaskId)
    }

    /// Schedules, reschedules, or unschedules a task. Returns false if it does not exist.
    pub fn set_task_start(&self, task_id: TaskId, started_at_ms: Option<TimestampMs>) -> PersistResult<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE tasks SET started_at_ms = ?1 WHERE id = ?2",
            params![started_at_ms.map(|v| v as i64), task_id as i64],
        )?;
        Ok(updated > 0)
    }

    /// Highest solve id assigned so far, or 0.
    pub fn latest_solve_id(&self) -> PersistResult<SolveId> {
        let conn = self.lock()?;
        let id: Option<i64> = conn.query_row("SELECT MAX(id) FROM solves", [], |row| row.get(0))?;
        Ok(id.unwrap_or(0) as SolveId)
    }

    fn lock(&self) -> PersistResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| PersistError::Poisoned)
    }

    fn in_list(len: usize) -> String {
        vec!["?"; len].join(",")
    }

    fn query_solves(&self, sql: &str, args: impl rusqlite::Params) -> PersistResult<Vec<SolveEvent>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, solve_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl TaskCatalogue for SqliteStore {
    fn activated_flags(&self, now_ms: TimestampMs) -> PersistResult<Vec<ActivatedFlag>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT task_flags.task_id, task_flags.flag, tasks.started_at_ms \
             FROM task_flags \
             INNER JOIN tasks ON (tasks.id = task_flags.task_id) \
             WHERE tasks.started_at_ms IS NOT NULL AND tasks.started_at_ms <= ?1",
        )?;
        let rows = stmt.query_map(params![now_ms as i64], |row| {
            let task_id: i64 = row.get(0)?;
            let started_at_ms: i64 = row.get(2)?;
            Ok(ActivatedFlag {
                task_id: task_id as TaskId,
                flag: row.get(1)?,
                started_at_ms: started_at_ms as TimestampMs,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn activated_tasks(&self, now_ms: TimestampMs) -> PersistResult<Vec<TaskRecord>> {
        let raw = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                "SELECT id, name, categories, difficulty, description, started_at_ms \
                 FROM tasks \
                 WHERE started_at_ms IS NOT NULL AND started_at_ms <= ?1 \
                 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![now_ms as i64], |row| {
                let id: i64 = row.get(0)?;
                let started_at_ms: Option<i64> = row.get(5)?;
                let categories: String = row.get(2)?;
                Ok((
                    TaskRecord {
                        id: id as TaskId,
                        name: row.get(1)?,
                        categories: Vec::new(),
                        difficulty: row.get(3)?,
                        description: row.get(4)?,
                        started_at_ms: started_at_ms.map(|v| v as TimestampMs),
                    },
                    categories,
                ))
            })?;
            let mut raw = Vec::new();
            for row in rows {
                raw.push(row?);
            }
            raw
        };

        raw.into_iter()
            .map(|(mut task, categories)| -> PersistResult<TaskRecord> {
                task.categories = serde_json::from_str(&categories)?;
                Ok(task)
            })
            .collect()
    }

    fn task_names(&self, ids: &[TaskId]) -> PersistResult<HashMap<TaskId, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!("SELECT id, name FROM tasks WHERE id IN ({})", Self::in_list(ids.len()));
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter().map(|id| *id as i64)), |row| {
            let id: i64 = row.get(0)?;
            Ok((id as TaskId, row.get::<_, String>(1)?))
        })?;

        let mut out = HashMap::with_capacity(ids.len());
        for row in rows {
            let (id, name) = row?;
            out.insert(id, name);
        }
        Ok(out)
    }
}

impl SolveLedger for SqliteStore {
    fn record_solve(&self, team_id: TeamId, task_id: TaskId, at_ms: TimestampMs) -> PersistResult<RecordOutcome> {
        let conn = self.lock()?;
        insert_solve(&conn, team_id, task_id, at_ms)
    }

    fn record_solve_within(
        &self,
        team_id: TeamId,
        task_id: TaskId,
        at_ms: TimestampMs,
        expires: Instant,
    ) -> PersistResult<RecordOutcome> {
        let conn = self.lock()?;
        // Checked after the lock wait, right before the insert.
        if Instant::now() >= expires {
            return Err(PersistError::DeadlineExceeded);
        }
        insert_solve(&conn, team_id, task_id, at_ms)
    }

    fn solves_between(&self, from_ms: TimestampMs, to_ms: TimestampMs) -> PersistResult<Vec<SolveEvent>> {
        self.query_solves(
            &format!(
                "SELECT {SOLVE_COLUMNS} FROM solves \
                 WHERE solves.created_at_ms BETWEEN ?1 AND ?2 \
                 ORDER BY solves.id ASC"
            ),
            params![from_ms as i64, to_ms as i64],
        )
    }

    fn solves_for_task(&self, task_id: TaskId, activated_by_ms: TimestampMs) -> PersistResult<Vec<SolveEvent>> {
        self.query_solves(
            &format!(
                "SELECT {SOLVE_COLUMNS} FROM solves \
                 INNER JOIN tasks ON (tasks.id = solves.task_id) \
                 WHERE solves.task_id = ?1 \
                   AND tasks.started_at_ms IS NOT NULL AND tasks.started_at_ms <= ?2 \
                 ORDER BY solves.created_at_ms ASC, solves.id ASC"
            ),
            params![task_id as i64, activated_by_ms as i64],
        )
    }

    fn solves_for_team(&self, team_id: TeamId) -> PersistResult<Vec<SolveEvent>> {
        self.query_solves(
            &format!(
                "SELECT {SOLVE_COLUMNS} FROM solves \
                 WHERE solves.team_id = ?1 \
                 ORDER BY solves.created_at_ms DESC, solves.id DESC"
            ),
            params![team_id as i64],
        )
    }

    fn solves_for_teams(&self, team_ids: &[TeamId]) -> PersistResult<Vec<SolveEvent>> {
        if team_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.query_solves(
            &format!(
                "SELECT {SOLVE_COLUMNS} FROM solves \
                 WHERE solves.team_id IN ({}) \
                 ORDER BY solves.created_at_ms DESC, solves.id DESC",
                Self::in_list(team_ids.len())
            ),
            params_from_iter(team_ids.iter().map(|id| *id as i64)),
        )
    }
}

impl TeamDirectory for SqliteStore {
    fn lookup_teams(&self, ids: &[TeamId]) -> PersistResult<HashMap<TeamId, TeamProfile>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT id, name, country, affiliation, website, created_at_ms \
             FROM teams WHERE id IN ({})",
            Self::in_list(ids.len())
        );
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter().map(|id| *id as i64)), |row| {
            let id: i64 = row.get(0)?;
            let created_at_ms: i64 = row.get(5)?;
            Ok(TeamProfile {
                id: id as TeamId,
                name: row.get(1)?,
                country: row.get(2)?,
                affiliation: row.get(3)?,
                website: row.get(4)?,
                created_at_ms: created_at_ms as TimestampMs,
            })
        })?;

        let mut out = HashMap::with_capacity(ids.len());
        for row in rows {
            let team = row?;
            out.insert(team.id, team);
        }
        Ok(out)
    }

    fn team_census(&self, registered_before_ms: TimestampMs) -> PersistResult<TeamCensus> {
        let conn = self.lock()?;
        let (teams, countries): (i64, i64) = conn.query_row(
            "SELECT COUNT(1), COUNT(DISTINCT NULLIF(country, '')) \
             FROM teams WHERE created_at_ms < ?1",
            params![registered_before_ms as i64],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(TeamCensus {
            teams: teams as u64,
            countries: countries as u64,
        })
    }
}

fn solve_from_row(row: &Row<'_>) -> rusqlite::Result<SolveEvent> {
    let id: i64 = row.get(0)?;
    let team_id: i64 = row.get(1)?;
    let task_id: i64 = row.get(2)?;
    let created_at_ms: i64 = row.get(3)?;
    Ok(SolveEvent {
        id: id as SolveId,
        team_id: team_id as TeamId,
        task_id: task_id as TaskId,
        created_at_ms: created_at_ms as TimestampMs,
    })
}

fn insert_solve(conn: &Connection, team_id: TeamId, task_id: TaskId, at_ms: TimestampMs) -> PersistResult<RecordOutcome> {
    let inserted = conn.query_row(
        "INSERT INTO solves(team_id, task_id, created_at_ms) VALUES (?1, ?2, ?3) RETURNING id",
        params![team_id as i64, task_id as i64, at_ms as i64],
        |row| row.get::<_, i64>(0),
    );
    match inserted {
        Ok(id) => Ok(RecordOutcome::Created(SolveEvent {
            id: id as SolveId,
            team_id,
            task_id,
            created_at_ms: at_ms,
        })),
        Err(err) if is_unique_violation(&err) => Ok(RecordOutcome::AlreadySolved),
        Err(err) => Err(err.into()),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}
