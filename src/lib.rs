//! Field-of-play timer engine: authoritative break/attempt clocks, per field of play
//! fan-out to displays, and the display-side countdown that keeps them in step.

pub mod clock;
pub mod display;
pub mod events;
pub mod registry;
pub mod relay;
pub mod settings;
pub mod timer;
pub mod utils;

use std::path::PathBuf;

use anyhow::Result;

pub use clock::{Clock, ManualClock, SystemClock};
pub use display::{DisplayFrame, DisplayHandle, DisplayRole, DisplayTimer, Displayed};
pub use events::{AthleteRef, BreakType, DomainEvent, EventKind, FopId, Issuer};
pub use registry::FieldOfPlayRegistry;
pub use relay::{BroadcastRelay, Delivery, Subscription, SubscriptionHandle};
pub use settings::{EngineSettings, SettingsStore};
pub use timer::{
    DerivedEventReceiver, NotificationKind, Remaining, TimerController, TimerMode,
    TimerNotification, TimerSnapshot, TimerState,
};
pub use utils::logging::init_logging;

/// Start-up used by the hosting application: logging, settings, then the registry.
///
/// Must be called from inside a tokio runtime since timers are spawned lazily on it.
pub fn bootstrap(settings_path: PathBuf) -> Result<(FieldOfPlayRegistry, DerivedEventReceiver)> {
    init_logging();
    log::info!("fop-timer starting up...");

    let store = SettingsStore::new(settings_path)?;
    let settings = store.engine();
    log::info!(
        "debounce {}ms, relay capacity {}, heartbeat {}ms",
        settings.debounce_ms,
        settings.relay_capacity,
        settings.heartbeat_ms
    );

    Ok(FieldOfPlayRegistry::from_settings_store(&store))
}
