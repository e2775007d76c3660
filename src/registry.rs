use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use anyhow::Result;
use tokio::sync::mpsc;

use crate::{
    clock::{Clock, SystemClock},
    display::{spawn_display, DisplayHandle, DisplayRole, DisplayTimer},
    events::{FopId, Issuer},
    relay::{BroadcastRelay, Subscription},
    settings::{EngineSettings, SettingsStore},
    timer::{DerivedEventReceiver, DerivedEventSender, TimerController},
};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Every timer actor in the competition, keyed by field of play.
///
/// Callers always name the field of play they mean; there is no "current" one.
#[derive(Clone)]
pub struct FieldOfPlayRegistry {
    controllers: Arc<RwLock<HashMap<FopId, TimerController>>>,
    relay: BroadcastRelay,
    derived: DerivedEventSender,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl FieldOfPlayRegistry {
    /// The receiver yields `BreakDone`/`TimeOver` events raised by any field of play.
    pub fn new(settings: EngineSettings, clock: Arc<dyn Clock>) -> (Self, DerivedEventReceiver) {
        let (derived, derived_rx) = mpsc::unbounded_channel();
        let registry = Self {
            controllers: Arc::new(RwLock::new(HashMap::new())),
            relay: BroadcastRelay::new(settings.relay_capacity),
            derived,
            clock,
            settings,
        };
        (registry, derived_rx)
    }

    pub fn from_settings_store(store: &SettingsStore) -> (Self, DerivedEventReceiver) {
        Self::new(store.engine(), Arc::new(SystemClock))
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn relay(&self) -> &BroadcastRelay {
        &self.relay
    }

    /// Timer actor for `fop_id`, spawned on first use.
    pub fn controller(&self, fop_id: &FopId) -> TimerController {
        if let Some(controller) = self.get(fop_id) {
            return controller;
        }

        let mut controllers = self
            .controllers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        controllers
            .entry(fop_id.clone())
            .or_insert_with(|| {
                log_info!("creating timer for field of play {}", fop_id);
                TimerController::spawn(
                    fop_id.clone(),
                    self.relay.clone(),
                    self.derived.clone(),
                    Arc::clone(&self.clock),
                    self.settings.clone(),
                )
            })
            .clone()
    }

    pub fn get(&self, fop_id: &FopId) -> Option<TimerController> {
        self.controllers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(fop_id)
            .cloned()
    }

    pub fn fop_ids(&self) -> Vec<FopId> {
        let mut ids: Vec<FopId> = self
            .controllers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn subscribe(&self, fop_id: &FopId) -> Subscription {
        self.relay.subscribe(fop_id)
    }

    /// Attach a display: subscribe first, then seed from the engine, then follow pushes.
    pub fn attach_display(&self, fop_id: &FopId, role: DisplayRole) -> DisplayHandle {
        let controller = self.controller(fop_id);
        let subscription = self.relay.subscribe(fop_id);
        let id = match &role {
            DisplayRole::Console(issuer) => issuer.clone(),
            DisplayRole::Passive => Issuer::generate(),
        };
        let timer = DisplayTimer::new(id, role);
        spawn_display(
            controller,
            subscription,
            timer,
            Duration::from_millis(self.settings.display_tick_ms.max(1)),
        )
    }

    pub async fn shutdown(&self) -> Result<()> {
        let controllers: Vec<TimerController> = self
            .controllers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain()
            .map(|(_, controller)| controller)
            .collect();
        for controller in controllers {
            controller.shutdown().await?;
        }
        Ok(())
    }
}
