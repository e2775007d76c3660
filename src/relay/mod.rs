//! Per field of play fan-out of timer notifications.
//!
//! Each field of play gets its own tokio broadcast channel, created on first use.
//! Publishing never waits: a subscriber that falls more than `capacity` notifications
//! behind skips the oldest ones and carries on.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::events::FopId;
use crate::timer::TimerNotification;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub struct BroadcastRelay<T = TimerNotification> {
    channels: Arc<RwLock<HashMap<FopId, broadcast::Sender<T>>>>,
    capacity: usize,
}

impl<T> Clone for BroadcastRelay<T> {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            capacity: self.capacity,
        }
    }
}

impl<T: Clone + Send + 'static> BroadcastRelay<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Fire-and-forget. Returns how many subscribers the notification reached.
    pub fn publish(&self, fop_id: &FopId, notification: T) -> usize {
        let channels = self.channels.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(sender) = channels.get(fop_id) else {
            return 0;
        };
        // Err only means nobody is listening right now.
        match sender.send(notification) {
            Ok(receivers) => receivers,
            Err(_) => {
                log_debug!("no subscribers on field of play {}", fop_id);
                0
            }
        }
    }

    /// Live stream starting with the next published notification. No snapshot is sent.
    pub fn subscribe(&self, fop_id: &FopId) -> Subscription<T> {
        let receiver = {
            let mut channels = self.channels.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            channels
                .entry(fop_id.clone())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        Subscription {
            fop_id: fop_id.clone(),
            receiver,
            cancel: CancellationToken::new(),
        }
    }

    pub fn subscriber_count(&self, fop_id: &FopId) -> usize {
        let channels = self.channels.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        channels
            .get(fop_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

/// Cancels a subscription from anywhere, e.g. when the UI detaches.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle(CancellationToken);

impl SubscriptionHandle {
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// What a subscriber gets out of [`Subscription::recv_or_lag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<T> {
    Item(T),
    /// This many notifications were overwritten before they could be read.
    Lagged(u64),
}

pub struct Subscription<T = TimerNotification> {
    fop_id: FopId,
    receiver: broadcast::Receiver<T>,
    cancel: CancellationToken,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    pub fn fop_id(&self) -> &FopId {
        &self.fop_id
    }

    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle(self.cancel.clone())
    }

    /// Next notification, or `None` once cancelled or the relay is gone.
    ///
    /// Lag is logged and skipped over; use [`recv_or_lag`](Self::recv_or_lag) to react to it.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.recv_or_lag().await? {
                Delivery::Item(notification) => return Some(notification),
                Delivery::Lagged(skipped) => {
                    log_warn!("subscriber on {} lagged, skipped {} notifications", self.fop_id, skipped);
                }
            }
        }
    }

    /// Like [`recv`](Self::recv) but reports how many notifications were dropped
    /// when this subscriber fell behind.
    pub async fn recv_or_lag(&mut self) -> Option<Delivery<T>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            received = self.receiver.recv() => match received {
                Ok(notification) => Some(Delivery::Item(notification)),
                Err(RecvError::Lagged(skipped)) => Some(Delivery::Lagged(skipped)),
                Err(RecvError::Closed) => None,
            },
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<T> {
        if self.cancel.is_cancelled() {
            return None;
        }
        loop {
            match self.receiver.try_recv() {
                Ok(notification) => return Some(notification),
                Err(TryRecvError::Lagged(skipped)) => {
                    log_warn!("subscriber on {} lagged, skipped {} notifications", self.fop_id, skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
