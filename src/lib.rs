//! Flag resolution and dynamic scoring for jeopardy-style team competitions.
//!
//! # Examples
//!
//! Pure scoring with [`core::scoreboard::assemble_scoreboard`]:
//! ```
//! use flagscore::{
//!     core::{freeze::ScoringWindow, scoreboard::assemble_scoreboard, scoring::points_for_solvers},
//!     model::SolveEvent,
//! };
//!
//! let events = vec![
//!     SolveEvent { id: 1, team_id: 1, task_id: 7, created_at_ms: 10 },
//!     SolveEvent { id: 2, team_id: 2, task_id: 7, created_at_ms: 20 },
//! ];
//! let board = assemble_scoreboard(&events, ScoringWindow { from_ms: 0, to_ms: 100 });
//! assert_eq!(board[0].team_id, 1);
//! assert_eq!(board[0].points, u64::from(points_for_solvers(2)));
//! ```
//!
//! Engine usage with the SQLite store and background refresher:
//! ```no_run
//! use std::sync::Arc;
//!
//! use flagscore::{
//!     clock::SystemClock,
//!     config::EngineConfig,
//!     engine::service::ScoringEngine,
//!     persist::sqlite::SqliteStore,
//!     runtime::refresher::spawn_flag_refresher,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cfg = EngineConfig::load().expect("config");
//! let store = Arc::new(SqliteStore::open(&cfg.database.path).expect("open sqlite"));
//! let engine = Arc::new(ScoringEngine::with_store(
//!     store,
//!     Arc::new(SystemClock),
//!     cfg.competition_window().expect("window"),
//!     cfg.request_timeout(),
//! ));
//! let refresher = spawn_flag_refresher(Arc::clone(&engine), cfg.flag_refresh_interval());
//! let _ = engine.submit_flag(1, "FLAG{example}", engine.deadline()).await;
//! let _board = engine.scoreboard(engine.deadline()).await.expect("scoreboard");
//! refresher.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Injectable wall clocks.
pub mod clock;
/// Configuration loading.
pub mod config;
/// Flag index, freeze policy, decay formula, and ranking.
pub mod core;
/// Submission and scoreboard API.
pub mod engine;
/// Task, team, and solve records.
pub mod model;
/// Storage traits and SQLite implementation.
pub mod persist;
/// Background refresher and event stream.
pub mod runtime;
/// Shared primitive types.
pub mod types;
