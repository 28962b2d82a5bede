//! HTTP handlers for push-daemon.

pub mod health;
pub mod notifications;

pub use health::{health_check, metrics_endpoint};
pub use notifications::send_notifications;
