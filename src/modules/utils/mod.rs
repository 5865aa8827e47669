pub mod clock;
pub mod format;
pub mod io;
pub mod logging;
pub mod time;

pub use clock::{Clock, ManualClock, SystemClock};
