pub mod countdown;
pub mod task;

pub use countdown::{DisplayFrame, DisplayRole, DisplayTimer, Displayed, Handled};
pub use task::{spawn_display, DisplayHandle};
