use serde::Serialize;
use tokio::time::Instant;

use crate::events::{BreakType, Issuer};
use crate::timer::{NotificationKind, Remaining, TimerMode, TimerNotification, TimerSnapshot};

const ENABLE_LOGS: bool = false;

use crate::log_debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayRole {
    /// Scoreboards, attempt boards, overlays. They never issue commands of their own.
    Passive,
    /// An operator console; it already knows about the commands it sent.
    Console(Issuer),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Displayed {
    Hidden,
    Millis(u64),
}

/// What the rendering layer should draw right now.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayFrame {
    pub displayed: Displayed,
    pub running: bool,
    pub indefinite: bool,
    pub time_over: bool,
    pub break_type: Option<BreakType>,
}

impl Default for DisplayFrame {
    fn default() -> Self {
        Self {
            displayed: Displayed::Hidden,
            running: false,
            indefinite: true,
            time_over: false,
            break_type: None,
        }
    }
}

/// Outcome of [`DisplayTimer::on_notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Applied,
    /// Already folded into what the display shows.
    Stale,
    /// A console's own command came back; resync from the engine instead.
    OwnEcho,
}

/// Local countdown kept by one display.
///
/// The anchor is the local instant at which `remaining_at_anchor_ms` was true; the
/// shown value is derived from it on every tick, so pushes can be sparse. A clock
/// counting toward a target end time stays anchored even while the engine reports
/// it stopped.
#[derive(Debug, Clone)]
pub struct DisplayTimer {
    id: Issuer,
    role: DisplayRole,
    indefinite: bool,
    targeted: bool,
    running: bool,
    remaining_at_anchor_ms: i64,
    anchor: Option<Instant>,
    signaled: bool,
    time_over: bool,
    break_type: Option<BreakType>,
    last_seq: u64,
}

impl DisplayTimer {
    pub fn new(id: Issuer, role: DisplayRole) -> Self {
        Self {
            id,
            role,
            indefinite: true,
            targeted: false,
            running: false,
            remaining_at_anchor_ms: 0,
            anchor: None,
            signaled: false,
            time_over: false,
            break_type: None,
            last_seq: 0,
        }
    }

    pub fn id(&self) -> &Issuer {
        &self.id
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Seed from an authoritative snapshot (attach, reconnect, lag, or a console's
    /// own command).
    pub fn sync(&mut self, snapshot: &TimerSnapshot, now: Instant) {
        self.set_remaining(snapshot.remaining);
        self.targeted = snapshot.state.mode == TimerMode::TargetEndTime;
        self.running = snapshot.state.running;
        self.time_over = snapshot.state.time_over;
        self.signaled = snapshot.state.time_over;
        self.break_type = snapshot.state.break_type;
        self.reanchor(now);
        // Anything already reflected in the snapshot must not be replayed.
        self.last_seq = self.last_seq.max(snapshot.state.seq);
        log_debug!(
            "display {} synced at seq {} remaining {:?}",
            self.id,
            snapshot.state.seq,
            snapshot.remaining
        );
    }

    pub fn on_notification(&mut self, notification: &TimerNotification, now: Instant) -> Handled {
        if notification.seq <= self.last_seq {
            return Handled::Stale;
        }

        if let DisplayRole::Console(own) = &self.role {
            if own == &notification.origin {
                log_debug!("console {} skipping its own {}", own, notification.kind.name());
                return Handled::OwnEcho;
            }
        }
        self.last_seq = notification.seq;

        self.break_type = notification.break_type;
        match &notification.kind {
            NotificationKind::TimerStarted { remaining, end } => {
                self.set_remaining(*remaining);
                self.targeted = end.is_some();
                self.running = true;
                self.signaled = false;
                self.time_over = false;
            }
            NotificationKind::TimerPaused { remaining } => {
                self.set_remaining(*remaining);
                self.running = false;
            }
            NotificationKind::TimeSet { remaining, end } => {
                self.set_remaining(*remaining);
                self.targeted = end.is_some();
                self.running = false;
                self.signaled = false;
                self.time_over = false;
            }
            NotificationKind::TimeIsOver => {
                self.remaining_at_anchor_ms = 0;
                self.targeted = false;
                self.running = false;
                self.signaled = true;
                self.time_over = true;
            }
            NotificationKind::Heartbeat { remaining } => {
                if self.anchor.is_none() {
                    return Handled::Applied;
                }
                self.set_remaining(*remaining);
            }
        }
        self.reanchor(now);
        Handled::Applied
    }

    /// Advance the local clock. Returns true exactly once per countdown, when it
    /// first reaches zero while the engine runs; the caller then tells the engine.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.indefinite || self.signaled || !self.running {
            return false;
        }
        if self.current_ms(now) > 0 {
            return false;
        }
        self.signaled = true;
        true
    }

    pub fn current_ms(&self, now: Instant) -> i64 {
        match self.anchor {
            Some(anchor) => {
                let elapsed = now.saturating_duration_since(anchor).as_millis() as i64;
                self.remaining_at_anchor_ms - elapsed
            }
            None => self.remaining_at_anchor_ms,
        }
    }

    pub fn frame(&self, now: Instant) -> DisplayFrame {
        let displayed = if self.indefinite {
            Displayed::Hidden
        } else {
            Displayed::Millis(self.current_ms(now).max(0) as u64)
        };
        DisplayFrame {
            displayed,
            running: self.running,
            indefinite: self.indefinite,
            time_over: self.time_over,
            break_type: self.break_type,
        }
    }

    fn reanchor(&mut self, now: Instant) {
        let counting = !self.time_over && (self.running || (self.targeted && !self.indefinite));
        self.anchor = counting.then_some(now);
    }

    fn set_remaining(&mut self, remaining: Remaining) {
        match remaining {
            Remaining::Indefinite => {
                self.indefinite = true;
                self.remaining_at_anchor_ms = 0;
            }
            Remaining::Millis(ms) => {
                self.indefinite = false;
                self.remaining_at_anchor_ms = ms;
            }
        }
    }
}
