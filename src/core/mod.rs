pub mod clock;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock, to_chrono_duration};
pub use error::{LogError, Result};
pub use types::{Entry, Payload, Subject};
