use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{BreakType, DomainEvent, EventKind, Issuer};
use crate::utils::logging::format_hms;

use super::notification::NotificationKind;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    #[default]
    Indefinite,
    Duration,
    TargetEndTime,
}

/// Time left on a clock. Indefinite clocks have no number to show.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Remaining {
    Indefinite,
    Millis(i64),
}

impl Remaining {
    pub fn millis(&self) -> Option<i64> {
        match self {
            Remaining::Indefinite => None,
            Remaining::Millis(ms) => Some(*ms),
        }
    }

    pub fn is_indefinite(&self) -> bool {
        matches!(self, Remaining::Indefinite)
    }

    fn describe(&self) -> String {
        match self {
            Remaining::Indefinite => "indefinite".into(),
            Remaining::Millis(ms) => format_hms(*ms),
        }
    }
}

/// Public view of a field of play's timer. Published to readers after every command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub break_type: Option<BreakType>,
    pub break_duration_ms: Option<i64>,
    pub mode: TimerMode,
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub target_end_time: Option<DateTime<Utc>>,
    /// Frozen value; only meaningful while stopped in `Duration` mode.
    pub time_remaining_ms: i64,
    pub time_remaining_at_last_stop_ms: i64,
    pub origin: Option<Issuer>,
    /// Set by an accepted time-over signal, cleared by the next start or time change.
    #[serde(default)]
    pub time_over: bool,
    /// Sequence number of the last notification emitted for this field of play.
    pub seq: u64,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            break_type: None,
            break_duration_ms: None,
            mode: TimerMode::Indefinite,
            running: false,
            started_at: None,
            target_end_time: None,
            time_remaining_ms: 0,
            time_remaining_at_last_stop_ms: 0,
            origin: None,
            time_over: false,
            seq: 0,
        }
    }
}

impl TimerState {
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Remaining {
        match self.mode {
            TimerMode::Indefinite => Remaining::Indefinite,
            TimerMode::TargetEndTime => match self.target_end_time {
                Some(end) => Remaining::Millis((end - now).num_milliseconds()),
                None => Remaining::Millis(self.time_remaining_ms),
            },
            TimerMode::Duration => match (self.running, self.started_at) {
                (true, Some(started)) => {
                    let elapsed = (now - started).num_milliseconds();
                    Remaining::Millis(self.time_remaining_ms - elapsed)
                }
                _ => Remaining::Millis(self.time_remaining_ms),
            },
        }
    }
}

/// Something the engine wants the outside world to see after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify {
        kind: NotificationKind,
        origin: Issuer,
    },
    Raise(DomainEvent),
}

/// Authoritative timer for one field of play.
///
/// Every transition takes the current wall-clock time explicitly and returns the
/// notifications and derived events it produced; publishing them is the caller's job.
#[derive(Debug, Clone, Default)]
pub struct BreakTimer {
    state: TimerState,
    last_time_over_signal_at: Option<DateTime<Utc>>,
}

impl BreakTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        self.state.seq += 1;
        self.state.seq
    }

    pub fn live_remaining(&self, now: DateTime<Utc>) -> Remaining {
        self.state.remaining_at(now)
    }

    fn freeze(&mut self, now: DateTime<Utc>) {
        if !self.state.running {
            return;
        }
        self.state.time_remaining_ms = match self.state.remaining_at(now) {
            Remaining::Millis(ms) => ms,
            Remaining::Indefinite => 0,
        };
    }

    pub fn start(&mut self, issuer: Issuer, now: DateTime<Utc>) -> Vec<Effect> {
        // Restarting a running clock re-anchors it without jumping the shown value.
        self.freeze(now);
        self.state.started_at = Some(now);
        self.state.running = true;
        self.state.time_over = false;
        self.state.origin = Some(issuer.clone());

        let remaining = self.live_remaining(now);
        log_info!("timer started by {} remaining {}", issuer, remaining.describe());

        vec![Effect::Notify {
            kind: NotificationKind::TimerStarted {
                remaining,
                end: self.state.target_end_time,
            },
            origin: issuer,
        }]
    }

    pub fn stop(&mut self, issuer: Issuer, now: DateTime<Utc>) -> Vec<Effect> {
        if self.state.running {
            self.freeze(now);
            self.state.running = false;
            self.state.time_remaining_at_last_stop_ms = self.state.time_remaining_ms;
        }
        self.state.origin = Some(issuer.clone());

        // Frozen for a duration clock; a target clock keeps counting toward its end.
        let remaining = self.live_remaining(now);
        log_info!("timer paused by {} remaining {}", issuer, remaining.describe());

        vec![Effect::Notify {
            kind: NotificationKind::TimerPaused { remaining },
            origin: issuer,
        }]
    }

    pub fn set_indefinite(&mut self, issuer: Issuer) -> Vec<Effect> {
        self.state.mode = TimerMode::Indefinite;
        self.state.target_end_time = None;
        self.state.time_remaining_ms = 0;
        self.state.running = false;
        self.state.time_over = false;
        self.state.origin = Some(issuer.clone());

        vec![Effect::Notify {
            kind: NotificationKind::TimeSet {
                remaining: Remaining::Indefinite,
                end: None,
            },
            origin: issuer,
        }]
    }

    pub fn set_duration(&mut self, issuer: Issuer, duration_ms: i64) -> Vec<Effect> {
        self.state.mode = TimerMode::Duration;
        self.state.target_end_time = None;
        self.state.time_remaining_ms = duration_ms;
        self.state.running = false;
        self.state.time_over = false;
        self.state.origin = Some(issuer.clone());

        vec![Effect::Notify {
            kind: NotificationKind::TimeSet {
                remaining: Remaining::Millis(duration_ms),
                end: None,
            },
            origin: issuer,
        }]
    }

    /// `None` falls back to a plain duration holding whatever was left at this moment.
    pub fn set_target_end_time(
        &mut self,
        issuer: Issuer,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Vec<Effect> {
        let Some(end) = end else {
            let last_known = match self.live_remaining(now) {
                Remaining::Millis(ms) => ms,
                Remaining::Indefinite => self.state.time_remaining_ms,
            };
            return self.set_duration(issuer, last_known);
        };

        self.state.mode = TimerMode::TargetEndTime;
        self.state.target_end_time = Some(end);
        self.state.time_remaining_ms = (end - now).num_milliseconds();
        self.state.running = false;
        self.state.time_over = false;
        self.state.origin = Some(issuer.clone());

        vec![Effect::Notify {
            kind: NotificationKind::TimeSet {
                remaining: Remaining::Millis(self.state.time_remaining_ms),
                end: Some(end),
            },
            origin: issuer,
        }]
    }

    /// A display believes the clock hit zero. Only the first of a burst of such
    /// signals gets through; the rest return no effects.
    pub fn signal_time_over(
        &mut self,
        issuer: Issuer,
        now: DateTime<Utc>,
        debounce_ms: i64,
    ) -> Vec<Effect> {
        if !self.state.running || self.state.mode == TimerMode::Indefinite {
            log_debug!(
                "time over from {} ignored (running={}, mode={:?})",
                issuer,
                self.state.running,
                self.state.mode
            );
            return Vec::new();
        }
        if let Some(last) = self.last_time_over_signal_at {
            let since = (now - last).num_milliseconds();
            if since < debounce_ms {
                log_debug!("time over from {} debounced ({}ms since last)", issuer, since);
                return Vec::new();
            }
        }

        self.last_time_over_signal_at = Some(now);
        let mut effects = self.stop(issuer.clone(), now);
        self.state.time_over = true;
        effects.push(Effect::Notify {
            kind: NotificationKind::TimeIsOver,
            origin: issuer.clone(),
        });

        let derived = match self.state.break_type {
            Some(break_type) => DomainEvent::break_done(issuer, break_type),
            None => DomainEvent::time_over(issuer),
        };
        log_info!("time over accepted, raising {}", derived.kind().name());
        effects.push(Effect::Raise(derived));
        effects
    }

    /// Periodic push of the live value so idle observers can re-anchor.
    pub fn heartbeat(&self, now: DateTime<Utc>) -> Option<Effect> {
        if !self.state.running {
            return None;
        }
        Some(Effect::Notify {
            kind: NotificationKind::Heartbeat {
                remaining: self.live_remaining(now),
            },
            origin: Issuer::engine(),
        })
    }

    pub fn apply(&mut self, event: DomainEvent, now: DateTime<Utc>, debounce_ms: i64) -> Vec<Effect> {
        let (origin, kind) = event.into_parts();
        match kind {
            EventKind::BreakStarted {
                break_type,
                duration_ms,
            } => {
                self.state.break_type = Some(break_type);
                self.state.break_duration_ms = duration_ms;
                let mut effects = match duration_ms {
                    Some(ms) => self.set_duration(origin.clone(), ms),
                    None => self.set_indefinite(origin.clone()),
                };
                effects.extend(self.start(origin, now));
                effects
            }
            EventKind::BreakPaused | EventKind::TimeStopped => self.stop(origin, now),
            EventKind::TimeStarted => self.start(origin, now),
            EventKind::TimeOver => self.signal_time_over(origin, now, debounce_ms),
            EventKind::ForceTime { allowed_ms } => {
                self.state.break_type = None;
                self.state.break_duration_ms = None;
                self.set_duration(origin, allowed_ms)
            }
            EventKind::StartLifting => {
                let effects = if self.state.running {
                    self.stop(origin, now)
                } else {
                    Vec::new()
                };
                self.state.break_type = None;
                self.state.break_duration_ms = None;
                effects
            }
            EventKind::DecisionReset
            | EventKind::DownSignal
            | EventKind::WeightChange { .. }
            | EventKind::RefereeDecision { .. }
            | EventKind::BreakDone { .. } => {
                log_debug!("{} from {} does not touch the clock", kind.name(), origin);
                Vec::new()
            }
        }
    }
}
