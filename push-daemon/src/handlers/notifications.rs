use axum::{body::Bytes, extract::State};
use validator::Validate;

use crate::models::NotificationRequest;
use crate::services::{record_provider_call, record_sent};
use crate::startup::AppState;
use service_core::error::AppError;

pub const INVALID_REQUEST: &str = "Invalid request";
pub const APP_INIT_FAILED: &str = "Firebase initialization failed";
pub const MESSAGING_INIT_FAILED: &str = "FCM Client init failed";
pub const SEND_FAILED: &str = "Failed to send FCM message";

/// `POST /send_notifications`
///
/// Decodes the request, initializes a fresh provider app, and sends one
/// notification to the first device token. Every failure maps to a fixed
/// plain-text message; the underlying cause is only logged.
#[tracing::instrument(skip(state, body))]
pub async fn send_notifications(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<String, AppError> {
    let request: NotificationRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "Rejecting undecodable notification request");
        AppError::BadRequest(INVALID_REQUEST.to_string())
    })?;

    request.validate().map_err(|e| {
        tracing::debug!(error = %e, "Rejecting invalid notification request");
        AppError::BadRequest(INVALID_REQUEST.to_string())
    })?;

    let message = request
        .to_push_message()
        .ok_or_else(|| AppError::BadRequest(INVALID_REQUEST.to_string()))?;

    if request.ignored_tokens() > 0 {
        tracing::warn!(
            ignored = request.ignored_tokens(),
            "Only the first device token is addressed; remaining tokens ignored"
        );
    }

    let provider = state.push_provider.as_ref();

    let app = provider.initialize().await.map_err(|e| {
        record_provider_call("initialize", "error");
        tracing::error!(provider = provider.name(), error = %e, "Provider initialization failed");
        AppError::Internal(APP_INIT_FAILED.to_string())
    })?;
    record_provider_call("initialize", "ok");

    let messaging = app.messaging().map_err(|e| {
        record_provider_call("messaging", "error");
        tracing::error!(provider = provider.name(), error = %e, "Messaging client init failed");
        AppError::Internal(MESSAGING_INIT_FAILED.to_string())
    })?;
    record_provider_call("messaging", "ok");

    let response = messaging.send(&message).await.map_err(|e| {
        record_provider_call("send", "error");
        tracing::error!(provider = provider.name(), error = %e, "Failed to send push notification");
        AppError::Internal(SEND_FAILED.to_string())
    })?;

    record_provider_call("send", "ok");
    record_sent(provider.name());

    tracing::info!(
        message_id = %response.message_id,
        "Push notification accepted by provider"
    );

    Ok(format!(
        "Successfully sent message to device: {}",
        response.message_id
    ))
}
