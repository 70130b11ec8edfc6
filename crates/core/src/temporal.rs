//! Temporal gate: maps heat to a retrieval time window.  Cold queries
//! (greetings, thanks) add no context weight, so retrieval is disabled
//! entirely below the floor.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How far back retrieval may reach for the current message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    /// Retrieval is skipped entirely; the pipeline short-circuits with empty
    /// memories.
    Disabled,
    Days(u32),
    Unlimited,
}

impl TimeWindow {
    /// Cutoff timestamp for a vector-store search, or `None` when the window
    /// is unlimited.  Calling this on `Disabled` is a caller bug; it returns
    /// `now` so nothing would match.
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeWindow::Disabled => Some(now),
            TimeWindow::Days(days) => Some(now - Duration::days(i64::from(days))),
            TimeWindow::Unlimited => None,
        }
    }

    pub fn describe(self) -> String {
        match self {
            TimeWindow::Disabled => "disabled".to_string(),
            TimeWindow::Days(days) => format!("{days}d"),
            TimeWindow::Unlimited => "unlimited".to_string(),
        }
    }

    /// Total order by reach, used to check monotonicity.
    fn reach(self) -> u32 {
        match self {
            TimeWindow::Disabled => 0,
            TimeWindow::Days(days) => days,
            TimeWindow::Unlimited => u32::MAX,
        }
    }
}

/// Map heat to its retrieval window.
pub fn window_for_heat(heat: f32) -> TimeWindow {
    if heat < 0.1 {
        TimeWindow::Disabled
    } else if heat < 0.3 {
        TimeWindow::Days(7)
    } else if heat < 0.6 {
        TimeWindow::Days(30)
    } else if heat < 0.8 {
        TimeWindow::Days(90)
    } else {
        TimeWindow::Unlimited
    }
}
