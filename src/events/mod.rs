pub mod event;
pub mod ids;

pub use event::{BreakType, DomainEvent, EventKind};
pub use ids::{AthleteRef, FopId, Issuer};
