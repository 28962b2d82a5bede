pub mod fcm;
pub mod mock;

use crate::models::PushMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fcm::{FcmProvider, FirebaseApp};
pub use mock::{FailAt, MockPushProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Provider-assigned message name, e.g. `projects/x/messages/456`.
    pub message_id: String,
}

impl ProviderResponse {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
        }
    }
}

/// Entry point to a push provider. Each call to [`PushProvider::initialize`]
/// builds a fresh, independently authenticated app.
#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn initialize(&self) -> Result<Box<dyn PushApp>, ProviderError>;
    fn name(&self) -> &'static str;
}

/// An initialized provider app.
pub trait PushApp: Send + Sync {
    fn messaging(&self) -> Result<Box<dyn MessagingClient>, ProviderError>;
}

/// Messaging sub-client obtained from a [`PushApp`].
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn send(&self, message: &PushMessage) -> Result<ProviderResponse, ProviderError>;
}
