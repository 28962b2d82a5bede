pub mod notification;

pub use notification::{NotificationRequest, PushMessage};
