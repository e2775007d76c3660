use std::time::Duration;

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::relay::{Delivery, Subscription};
use crate::timer::TimerController;

use super::{DisplayFrame, DisplayTimer, Handled};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// A running display. Dropping the handle does not stop it; call [`detach`](Self::detach).
pub struct DisplayHandle {
    frames: watch::Receiver<DisplayFrame>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl DisplayHandle {
    pub fn frames(&self) -> watch::Receiver<DisplayFrame> {
        self.frames.clone()
    }

    pub fn current(&self) -> DisplayFrame {
        self.frames.borrow().clone()
    }

    /// Stop following the field of play. Engine state is untouched.
    pub async fn detach(self) {
        self.cancel.cancel();
        if let Err(err) = self.join.await {
            log_warn!("display loop failed to join: {err}");
        }
    }
}

/// Drive `timer` from `subscription`, ticking every `tick`.
///
/// The subscription must already exist so nothing published between the snapshot
/// and the first `recv` is lost.
pub fn spawn_display(
    controller: TimerController,
    subscription: Subscription,
    mut timer: DisplayTimer,
    tick: Duration,
) -> DisplayHandle {
    timer.sync(&controller.get_snapshot(), Instant::now());
    let (frames_tx, frames) = watch::channel(timer.frame(Instant::now()));
    let cancel = CancellationToken::new();

    let join = tokio::spawn(display_loop(
        controller,
        subscription,
        timer,
        tick,
        frames_tx,
        cancel.clone(),
    ));

    DisplayHandle {
        frames,
        cancel,
        join,
    }
}

async fn display_loop(
    controller: TimerController,
    mut subscription: Subscription,
    mut timer: DisplayTimer,
    tick: Duration,
    frames: watch::Sender<DisplayFrame>,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!("display {} attached to {}", timer.id(), controller.fop_id());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            }
            received = subscription.recv_or_lag() => {
                match received {
                    None => {
                        log_debug!("display {} lost its subscription", timer.id());
                        break;
                    }
                    Some(Delivery::Item(notification)) => {
                        if timer.on_notification(&notification, Instant::now()) == Handled::OwnEcho {
                            timer.sync(&controller.get_snapshot(), Instant::now());
                        }
                    }
                    Some(Delivery::Lagged(skipped)) => {
                        log_warn!("display {} missed {} notifications, resyncing", timer.id(), skipped);
                        timer.sync(&controller.get_snapshot(), Instant::now());
                    }
                }
            }
            _ = ticker.tick() => {
                if timer.tick(Instant::now()) {
                    signal_time_over(&controller, &timer);
                }
            }
        }
        frames.send_replace(timer.frame(Instant::now()));
    }

    subscription.cancel();
    log_info!("display {} detached from {}", timer.id(), controller.fop_id());
}

/// The engine answers through the relay; the loop keeps rendering meanwhile.
fn signal_time_over(controller: &TimerController, timer: &DisplayTimer) {
    let controller = controller.clone();
    let id = timer.id().clone();
    tokio::spawn(async move {
        match controller.signal_time_over(id.clone()).await {
            Ok(accepted) => log_debug!("display {} time over accepted={}", id, accepted),
            Err(err) => log_error!("display {} could not signal time over: {err:?}", id),
        }
    });
}
