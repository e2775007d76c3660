pub mod commands;
pub mod controller;
pub mod notification;
pub mod state;

pub use controller::{DerivedEventReceiver, DerivedEventSender, TimerController, TimerSnapshot};
pub use notification::{NotificationKind, TimerNotification};
pub use state::{BreakTimer, Effect, Remaining, TimerMode, TimerState};
