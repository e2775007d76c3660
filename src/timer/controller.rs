use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{self, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    clock::Clock,
    events::{DomainEvent, FopId, Issuer},
    relay::BroadcastRelay,
    settings::EngineSettings,
};

use super::{BreakTimer, Effect, Remaining, TimerNotification, TimerState};

/// Derived events flow back to the field-of-play logic through this channel.
pub type DerivedEventSender = mpsc::UnboundedSender<(FopId, DomainEvent)>;
pub type DerivedEventReceiver = mpsc::UnboundedReceiver<(FopId, DomainEvent)>;

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub remaining: Remaining,
}

enum TimerOp {
    Start,
    Stop,
    SetIndefinite,
    SetDuration(i64),
    SetTargetEndTime(Option<DateTime<Utc>>),
    SignalTimeOver,
    Apply(DomainEvent),
}

struct TimerCommand {
    issuer: Issuer,
    op: TimerOp,
    reply: oneshot::Sender<CommandOutcome>,
}

struct CommandOutcome {
    snapshot: TimerSnapshot,
    /// False when a time-over signal was dropped (not running, indefinite, debounced).
    accepted: bool,
}

/// Handle to the timer actor of one field of play.
///
/// Commands are queued and applied one at a time in arrival order; reads go through
/// a watch channel and never wait behind commands.
#[derive(Clone)]
pub struct TimerController {
    fop_id: FopId,
    commands: mpsc::UnboundedSender<TimerCommand>,
    state: watch::Receiver<TimerState>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    worker: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl TimerController {
    /// Spawn the actor on the current tokio runtime.
    pub fn spawn(
        fop_id: FopId,
        relay: BroadcastRelay,
        derived: DerivedEventSender,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        let (commands, inbox) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(TimerState::default());
        let cancel = CancellationToken::new();

        let worker = TimerWorker {
            fop_id: fop_id.clone(),
            timer: BreakTimer::new(),
            relay,
            derived,
            state_tx,
            clock: Arc::clone(&clock),
            settings,
        };
        let handle = tokio::spawn(worker.run(inbox, cancel.clone()));

        info!("timer for field of play {} started", fop_id);

        Self {
            fop_id,
            commands,
            state: state_rx,
            clock,
            cancel,
            worker: Arc::new(std::sync::Mutex::new(Some(handle))),
        }
    }

    pub fn fop_id(&self) -> &FopId {
        &self.fop_id
    }

    pub fn get_state(&self) -> TimerState {
        self.state.borrow().clone()
    }

    /// Consistent view plus the remaining time computed right now.
    pub fn get_snapshot(&self) -> TimerSnapshot {
        let state = self.state.borrow().clone();
        TimerSnapshot {
            remaining: state.remaining_at(self.clock.now()),
            state,
        }
    }

    pub fn live_remaining(&self) -> Remaining {
        self.state.borrow().remaining_at(self.clock.now())
    }

    pub async fn start(&self, issuer: Issuer) -> Result<TimerSnapshot> {
        self.send(issuer, TimerOp::Start).await.map(|outcome| outcome.snapshot)
    }

    pub async fn stop(&self, issuer: Issuer) -> Result<TimerSnapshot> {
        self.send(issuer, TimerOp::Stop).await.map(|outcome| outcome.snapshot)
    }

    pub async fn set_indefinite(&self, issuer: Issuer) -> Result<TimerSnapshot> {
        self.send(issuer, TimerOp::SetIndefinite)
            .await
            .map(|outcome| outcome.snapshot)
    }

    pub async fn set_duration(&self, issuer: Issuer, duration_ms: i64) -> Result<TimerSnapshot> {
        self.send(issuer, TimerOp::SetDuration(duration_ms))
            .await
            .map(|outcome| outcome.snapshot)
    }

    pub async fn set_target_end_time(
        &self,
        issuer: Issuer,
        end: Option<DateTime<Utc>>,
    ) -> Result<TimerSnapshot> {
        self.send(issuer, TimerOp::SetTargetEndTime(end))
            .await
            .map(|outcome| outcome.snapshot)
    }

    /// Returns whether the signal was accepted. Dropped signals are not errors.
    pub async fn signal_time_over(&self, issuer: Issuer) -> Result<bool> {
        self.send(issuer, TimerOp::SignalTimeOver)
            .await
            .map(|outcome| outcome.accepted)
    }

    pub async fn apply(&self, event: DomainEvent) -> Result<TimerSnapshot> {
        let issuer = event.origin().clone();
        self.send(issuer, TimerOp::Apply(event))
            .await
            .map(|outcome| outcome.snapshot)
    }

    /// Stop the actor and wait for it. Later commands fail.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|err| anyhow!("timer worker for {} failed to join: {err}", self.fop_id))?;
        }
        Ok(())
    }

    async fn send(&self, issuer: Issuer, op: TimerOp) -> Result<CommandOutcome> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(TimerCommand { issuer, op, reply })
            .map_err(|_| anyhow!("timer for field of play {} is shut down", self.fop_id))?;
        response
            .await
            .map_err(|_| anyhow!("timer for field of play {} dropped the command", self.fop_id))
    }
}

struct TimerWorker {
    fop_id: FopId,
    timer: BreakTimer,
    relay: BroadcastRelay,
    derived: DerivedEventSender,
    state_tx: watch::Sender<TimerState>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl TimerWorker {
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<TimerCommand>,
        cancel: CancellationToken,
    ) {
        let mut heartbeat = (self.settings.heartbeat_ms > 0).then(|| {
            let mut interval = time::interval(Duration::from_millis(self.settings.heartbeat_ms));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let running = self.timer.state().running;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("timer for field of play {} shutting down", self.fop_id);
                    break;
                }
                command = inbox.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle(command);
                }
                _ = next_heartbeat(&mut heartbeat), if running => {
                    if let Some(effect) = self.timer.heartbeat(self.clock.now()) {
                        self.publish(vec![effect]);
                    }
                }
            }
        }
    }

    fn handle(&mut self, command: TimerCommand) {
        let TimerCommand { issuer, op, reply } = command;
        let now = self.clock.now();
        let debounce_ms = self.settings.debounce_ms;

        let (effects, accepted) = match op {
            TimerOp::Start => (self.timer.start(issuer, now), true),
            TimerOp::Stop => (self.timer.stop(issuer, now), true),
            TimerOp::SetIndefinite => (self.timer.set_indefinite(issuer), true),
            TimerOp::SetDuration(ms) => (self.timer.set_duration(issuer, ms), true),
            TimerOp::SetTargetEndTime(end) => (self.timer.set_target_end_time(issuer, end, now), true),
            TimerOp::SignalTimeOver => {
                let effects = self.timer.signal_time_over(issuer, now, debounce_ms);
                let accepted = !effects.is_empty();
                (effects, accepted)
            }
            TimerOp::Apply(event) => (self.timer.apply(event, now, debounce_ms), true),
        };

        self.publish(effects);

        let snapshot = TimerSnapshot {
            state: self.timer.state().clone(),
            remaining: self.timer.live_remaining(now),
        };
        // The caller may have given up waiting; the command still happened.
        let _ = reply.send(CommandOutcome { snapshot, accepted });
    }

    fn publish(&mut self, effects: Vec<Effect>) {
        let now = self.clock.now();
        let mut notifications = Vec::new();
        let mut raised = Vec::new();
        for effect in effects {
            match effect {
                Effect::Notify { kind, origin } => notifications.push(TimerNotification {
                    fop_id: self.fop_id.clone(),
                    seq: self.timer.next_seq(),
                    origin,
                    break_type: self.timer.state().break_type,
                    emitted_at: now,
                    kind,
                }),
                Effect::Raise(event) => raised.push(event),
            }
        }

        // A subscriber resyncing on any of these must find them in the snapshot.
        self.state_tx.send_replace(self.timer.state().clone());

        for notification in notifications {
            self.relay.publish(&self.fop_id, notification);
        }
        for event in raised {
            if self.derived.send((self.fop_id.clone(), event)).is_err() {
                warn!("no listener for derived events on {}", self.fop_id);
            }
        }
    }
}

async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::BreakType;
    use crate::timer::NotificationKind;

    struct Harness {
        clock: ManualClock,
        relay: BroadcastRelay,
        derived: DerivedEventReceiver,
        controller: TimerController,
    }

    fn harness(settings: EngineSettings) -> Harness {
        let clock = ManualClock::default();
        let relay = BroadcastRelay::new(64);
        let (derived_tx, derived) = mpsc::unbounded_channel();
        let controller = TimerController::spawn(
            FopId::new("A"),
            relay.clone(),
            derived_tx,
            Arc::new(clock.clone()),
            settings,
        );
        Harness {
            clock,
            relay,
            derived,
            controller,
        }
    }

    fn issuer(name: &str) -> Issuer {
        Issuer::new(name)
    }

    #[tokio::test]
    async fn commands_publish_in_order_with_sequence_numbers() {
        let h = harness(EngineSettings::quiet());
        let mut subscription = h.relay.subscribe(&FopId::new("A"));

        h.controller.set_duration(issuer("a"), 60_000).await.unwrap();
        h.controller.start(issuer("a")).await.unwrap();
        h.clock.advance_ms(5_000);
        h.controller.stop(issuer("b")).await.unwrap();

        let first = subscription.recv().await.unwrap();
        let second = subscription.recv().await.unwrap();
        let third = subscription.recv().await.unwrap();

        assert_eq!((first.seq, second.seq, third.seq), (1, 2, 3));
        assert!(matches!(first.kind, NotificationKind::TimeSet { .. }));
        assert!(matches!(second.kind, NotificationKind::TimerStarted { .. }));
        assert_eq!(
            third.kind,
            NotificationKind::TimerPaused {
                remaining: Remaining::Millis(55_000)
            }
        );
        assert_eq!(third.origin, issuer("b"));
        assert_eq!(h.controller.get_state().seq, 3);
    }

    #[tokio::test]
    async fn live_remaining_reads_without_commands() {
        let h = harness(EngineSettings::quiet());
        h.controller.set_duration(issuer("a"), 30_000).await.unwrap();
        h.controller.start(issuer("a")).await.unwrap();

        h.clock.advance_ms(12_000);

        assert_eq!(h.controller.live_remaining(), Remaining::Millis(18_000));
        assert!(h.controller.get_snapshot().state.running);
    }

    #[tokio::test]
    async fn accepted_signal_raises_derived_event_once() {
        let mut h = harness(EngineSettings::quiet());
        h.controller
            .apply(DomainEvent::break_started(issuer("marshal"), BreakType::Technical, Some(10_000)))
            .await
            .unwrap();
        h.clock.advance_ms(10_000);

        let mut accepted = 0;
        for i in 0..5 {
            if h.controller.signal_time_over(issuer(&format!("board-{i}"))).await.unwrap() {
                accepted += 1;
            }
            h.clock.advance_ms(50);
        }

        assert_eq!(accepted, 1);
        let (fop, event) = h.derived.recv().await.unwrap();
        assert_eq!(fop, FopId::new("A"));
        assert_eq!(event, DomainEvent::break_done(issuer("board-0"), BreakType::Technical));
        assert!(h.derived.try_recv().is_err());
    }

    #[tokio::test]
    async fn snapshot_already_covers_delivered_notifications() {
        let h = harness(EngineSettings::quiet());
        let mut subscription = h.relay.subscribe(&FopId::new("A"));
        let controller = h.controller.clone();

        let commands = tokio::spawn(async move {
            controller.set_duration(issuer("a"), 10_000).await.unwrap();
            controller.start(issuer("a")).await.unwrap();
            controller.stop(issuer("a")).await.unwrap();
        });

        for _ in 0..3 {
            let notification = subscription.recv().await.unwrap();
            assert!(h.controller.get_snapshot().state.seq >= notification.seq);
        }
        commands.await.unwrap();
    }

    #[tokio::test]
    async fn commands_fail_after_shutdown() {
        let h = harness(EngineSettings::quiet());
        h.controller.shutdown().await.unwrap();

        assert!(h.controller.start(issuer("a")).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_pushes_live_value_while_running() {
        let settings = EngineSettings {
            heartbeat_ms: 1_000,
            ..EngineSettings::quiet()
        };
        let h = harness(settings);
        let mut subscription = h.relay.subscribe(&FopId::new("A"));

        h.controller.set_duration(issuer("a"), 60_000).await.unwrap();
        h.controller.start(issuer("a")).await.unwrap();
        h.clock.advance_ms(3_000);

        let mut heartbeats = Vec::new();
        while heartbeats.len() < 3 {
            let notification = subscription.recv().await.unwrap();
            if let NotificationKind::Heartbeat { remaining } = notification.kind {
                assert_eq!(notification.origin, Issuer::engine());
                heartbeats.push(remaining);
            }
        }
        assert_eq!(heartbeats.last(), Some(&Remaining::Millis(57_000)));
    }
}
