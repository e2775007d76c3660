use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{BreakType, FopId, Issuer};

use super::state::Remaining;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum NotificationKind {
    TimerStarted {
        remaining: Remaining,
        end: Option<DateTime<Utc>>,
    },
    TimerPaused {
        remaining: Remaining,
    },
    TimeSet {
        remaining: Remaining,
        end: Option<DateTime<Utc>>,
    },
    TimeIsOver,
    Heartbeat {
        remaining: Remaining,
    },
}

impl NotificationKind {
    pub fn name(&self) -> &'static str {
        match self {
            NotificationKind::TimerStarted { .. } => "timer-started",
            NotificationKind::TimerPaused { .. } => "timer-paused",
            NotificationKind::TimeSet { .. } => "time-set",
            NotificationKind::TimeIsOver => "time-is-over",
            NotificationKind::Heartbeat { .. } => "timer-heartbeat",
        }
    }
}

/// What displays receive through the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerNotification {
    pub fop_id: FopId,
    pub seq: u64,
    pub origin: Issuer,
    pub break_type: Option<BreakType>,
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: NotificationKind,
}
