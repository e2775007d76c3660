use serde::{Deserialize, Serialize};

use super::{AthleteRef, Issuer};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum BreakType {
    BeforeIntroduction,
    DuringIntroduction,
    FirstSnatch,
    FirstCleanAndJerk,
    GroupDone,
    Jury,
    Challenge,
    Marshal,
    Technical,
    Ceremony,
}

impl BreakType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakType::BeforeIntroduction => "BeforeIntroduction",
            BreakType::DuringIntroduction => "DuringIntroduction",
            BreakType::FirstSnatch => "FirstSnatch",
            BreakType::FirstCleanAndJerk => "FirstCleanAndJerk",
            BreakType::GroupDone => "GroupDone",
            BreakType::Jury => "Jury",
            BreakType::Challenge => "Challenge",
            BreakType::Marshal => "Marshal",
            BreakType::Technical => "Technical",
            BreakType::Ceremony => "Ceremony",
        }
    }
}

/// Everything that can happen on a field of play.
///
/// Adding a variant forces every consumer's `match` to be revisited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum EventKind {
    DecisionReset,
    DownSignal,
    StartLifting,
    #[serde(rename_all = "camelCase")]
    BreakStarted {
        break_type: BreakType,
        /// `None` starts an indefinite break.
        duration_ms: Option<i64>,
    },
    BreakPaused,
    #[serde(rename_all = "camelCase")]
    WeightChange {
        athlete: AthleteRef,
    },
    #[serde(rename_all = "camelCase")]
    RefereeDecision {
        athlete: AthleteRef,
        success: bool,
        ref1: Option<bool>,
        ref2: Option<bool>,
        ref3: Option<bool>,
    },
    TimeStarted,
    TimeStopped,
    TimeOver,
    #[serde(rename_all = "camelCase")]
    ForceTime {
        allowed_ms: i64,
    },
    /// Raised by the engine when a break clock runs out.
    #[serde(rename_all = "camelCase")]
    BreakDone {
        break_type: BreakType,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::DecisionReset => "DecisionReset",
            EventKind::DownSignal => "DownSignal",
            EventKind::StartLifting => "StartLifting",
            EventKind::BreakStarted { .. } => "BreakStarted",
            EventKind::BreakPaused => "BreakPaused",
            EventKind::WeightChange { .. } => "WeightChange",
            EventKind::RefereeDecision { .. } => "RefereeDecision",
            EventKind::TimeStarted => "TimeStarted",
            EventKind::TimeStopped => "TimeStopped",
            EventKind::TimeOver => "TimeOver",
            EventKind::ForceTime { .. } => "ForceTime",
            EventKind::BreakDone { .. } => "BreakDone",
        }
    }
}

/// An occurrence on the field of play together with whoever caused it.
///
/// When one event fans out into many display updates, the console that issued it
/// recognizes its own `origin` and skips the redundant refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    origin: Issuer,
    #[serde(flatten)]
    kind: EventKind,
}

impl DomainEvent {
    pub fn new(origin: Issuer, kind: EventKind) -> Self {
        Self { origin, kind }
    }

    pub fn origin(&self) -> &Issuer {
        &self.origin
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn into_parts(self) -> (Issuer, EventKind) {
        (self.origin, self.kind)
    }

    pub fn break_started(origin: Issuer, break_type: BreakType, duration_ms: Option<i64>) -> Self {
        Self::new(
            origin,
            EventKind::BreakStarted {
                break_type,
                duration_ms,
            },
        )
    }

    pub fn break_paused(origin: Issuer) -> Self {
        Self::new(origin, EventKind::BreakPaused)
    }

    pub fn time_started(origin: Issuer) -> Self {
        Self::new(origin, EventKind::TimeStarted)
    }

    pub fn time_stopped(origin: Issuer) -> Self {
        Self::new(origin, EventKind::TimeStopped)
    }

    pub fn time_over(origin: Issuer) -> Self {
        Self::new(origin, EventKind::TimeOver)
    }

    pub fn force_time(origin: Issuer, allowed_ms: i64) -> Self {
        Self::new(origin, EventKind::ForceTime { allowed_ms })
    }

    pub fn start_lifting(origin: Issuer) -> Self {
        Self::new(origin, EventKind::StartLifting)
    }

    pub fn break_done(origin: Issuer, break_type: BreakType) -> Self {
        Self::new(origin, EventKind::BreakDone { break_type })
    }
}
