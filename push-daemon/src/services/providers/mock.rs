use super::{MessagingClient, ProviderError, ProviderResponse, PushApp, PushProvider};
use crate::models::PushMessage;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Stage at which [`MockPushProvider`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Initialize,
    Messaging,
    Send,
}

/// In-memory push provider for dry runs and tests. Records every message it
/// is asked to send.
#[derive(Clone, Default)]
pub struct MockPushProvider {
    fail_at: Option<FailAt>,
    sent: Arc<Mutex<Vec<PushMessage>>>,
}

impl MockPushProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(stage: FailAt) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    /// Messages accepted so far, in send order.
    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl PushProvider for MockPushProvider {
    async fn initialize(&self) -> Result<Box<dyn PushApp>, ProviderError> {
        if self.fail_at == Some(FailAt::Initialize) {
            return Err(ProviderError::Credentials(
                "Mock provider refused to initialize".to_string(),
            ));
        }
        Ok(Box::new(self.clone()))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

impl PushApp for MockPushProvider {
    fn messaging(&self) -> Result<Box<dyn MessagingClient>, ProviderError> {
        if self.fail_at == Some(FailAt::Messaging) {
            return Err(ProviderError::Configuration(
                "Mock provider has no messaging client".to_string(),
            ));
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl MessagingClient for MockPushProvider {
    async fn send(&self, message: &PushMessage) -> Result<ProviderResponse, ProviderError> {
        if self.fail_at == Some(FailAt::Send) {
            return Err(ProviderError::SendFailed(
                "Mock provider rejected the message".to_string(),
            ));
        }

        let count = {
            let mut sent = self
                .sent
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            sent.push(message.clone());
            sent.len()
        };

        tracing::info!(
            device_token = %message.token,
            title = %message.title,
            "[MOCK] Push notification would be sent"
        );

        Ok(ProviderResponse::new(format!(
            "projects/mock/messages/{}",
            count
        )))
    }
}
