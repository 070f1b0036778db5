//! Caller-facing submission and scoreboard API.

/// Engine error taxonomy.
pub mod error;
/// `ScoringEngine` and its read models.
pub mod service;
