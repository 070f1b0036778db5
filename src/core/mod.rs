//! Pure scoring core: flag index, freeze policy, decay, and ranking.

/// Flag index snapshots and the atomically swapped handle.
pub mod flags;
/// Competition window and freeze visibility rules.
pub mod freeze;
/// Scoreboard assembly and detail-view filtering.
pub mod scoreboard;
/// Dynamic point decay.
pub mod scoring;
