pub mod flush;
pub mod notification;

pub use flush::FlushLog;
pub use notification::{NotificationKey, NotificationLog, NotificationRecord, Receiver};
