use serde::{Deserialize, Serialize};

use crate::types::TimestampMs;

/// Process-wide competition and freeze boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionWindow {
    pub start_ms: TimestampMs,
    pub end_ms: TimestampMs,
    pub freeze_start_ms: TimestampMs,
    pub freeze_end_ms: TimestampMs,
}

/// Inclusive time range of solves that count toward scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringWindow {
    pub from_ms: TimestampMs,
    pub to_ms: TimestampMs,
}

impl ScoringWindow {
    pub fn contains(&self, ts_ms: TimestampMs) -> bool {
        self.from_ms <= ts_ms && ts_ms <= self.to_ms
    }
}

/// Decides the scoring cutoff and detail-view visibility from the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezePolicy {
    window: CompetitionWindow,
}

impl FreezePolicy {
    pub fn new(window: CompetitionWindow) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &CompetitionWindow {
        &self.window
    }

    /// True while `now_ms` lies inside `[freeze_start, freeze_end]`.
    pub fn is_frozen_at(&self, now_ms: TimestampMs) -> bool {
        self.in_freeze_range(now_ms)
    }

    /// Latest solve timestamp that counts toward scores at `now_ms`.
    pub fn effective_cutoff(&self, now_ms: TimestampMs) -> TimestampMs {
        if self.is_frozen_at(now_ms) {
            self.window.freeze_start_ms
        } else {
            self.window.end_ms
        }
    }

    pub fn scoring_window(&self, now_ms: TimestampMs) -> ScoringWindow {
        ScoringWindow {
            from_ms: self.window.start_ms,
            to_ms: self.effective_cutoff(now_ms),
        }
    }

    /// Whole competition, ignoring the freeze.
    pub fn full_window(&self) -> ScoringWindow {
        ScoringWindow {
            from_ms: self.window.start_ms,
            to_ms: self.window.end_ms,
        }
    }

    /// An event is hidden only while the freeze is live and the event itself
    /// happened inside the freeze range. Hiding stops once the freeze ends.
    pub fn is_hidden_from_detail(&self, now_ms: TimestampMs, event_ts_ms: TimestampMs) -> bool {
        self.is_frozen_at(now_ms) && self.in_freeze_range(event_ts_ms)
    }

    fn in_freeze_range(&self, ts_ms: TimestampMs) -> bool {
        self.window.freeze_start_ms <= ts_ms && ts_ms <= self.window.freeze_end_ms
    }
}
