use super::{MessagingClient, ProviderError, ProviderResponse, PushApp, PushProvider};
use crate::config::FcmConfig;
use crate::models::PushMessage;
use crate::services::credentials::ServiceAccountKey;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_MINUTES: i64 = 60;

/// Firebase Cloud Messaging over the HTTP v1 API.
pub struct FcmProvider {
    config: FcmConfig,
    client: Client,
}

impl FcmProvider {
    pub fn new(config: FcmConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl PushProvider for FcmProvider {
    async fn initialize(&self) -> Result<Box<dyn PushApp>, ProviderError> {
        let key = self.config.credentials.load().await?;
        let app = FirebaseApp::new(key, &self.config.api_url, self.client.clone())?;
        Ok(Box::new(app))
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}

/// An FCM app bound to one service account.
#[derive(Clone)]
pub struct FirebaseApp {
    project_id: String,
    client_email: String,
    token_uri: String,
    key_id: Option<String>,
    signing_key: EncodingKey,
    api_url: String,
    client: Client,
}

impl FirebaseApp {
    pub fn new(key: ServiceAccountKey, api_url: &str, client: Client) -> Result<Self, ProviderError> {
        if key.client_email.is_empty() {
            return Err(ProviderError::Credentials(
                "Service account client_email is empty".to_string(),
            ));
        }

        let signing_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|e| {
                ProviderError::Credentials(format!("Failed to parse service account key: {}", e))
            })?;

        Ok(Self {
            project_id: key.project_id,
            client_email: key.client_email,
            token_uri: key.token_uri,
            key_id: key.private_key_id,
            signing_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl PushApp for FirebaseApp {
    fn messaging(&self) -> Result<Box<dyn MessagingClient>, ProviderError> {
        if self.project_id.is_empty() {
            return Err(ProviderError::Configuration(
                "project id is required to access the Firebase Cloud Messaging client".to_string(),
            ));
        }

        Ok(Box::new(FcmMessaging { app: self.clone() }))
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct FcmRequest<'a> {
    message: FcmMessage<'a>,
}

#[derive(Debug, Serialize)]
struct FcmMessage<'a> {
    token: &'a str,
    notification: FcmNotification<'a>,
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    name: Option<String>,
    #[serde(default)]
    error: Option<FcmError>,
}

#[derive(Debug, Deserialize)]
struct FcmError {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct FcmErrorEnvelope {
    error: FcmError,
}

struct FcmMessaging {
    app: FirebaseApp,
}

impl FcmMessaging {
    /// Exchange a signed JWT assertion for an OAuth2 access token.
    async fn access_token(&self) -> Result<String, ProviderError> {
        let app = &self.app;
        let now = Utc::now();
        let claims = AssertionClaims {
            iss: &app.client_email,
            scope: FCM_SCOPE,
            aud: &app.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(ASSERTION_LIFETIME_MINUTES)).timestamp(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = app.key_id.clone();
        let assertion = encode(&header, &claims, &app.signing_key).map_err(|e| {
            ProviderError::Authentication(format!("Failed to sign token assertion: {}", e))
        })?;

        let response = app
            .client
            .post(&app.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| {
                ProviderError::Connection(format!("Failed to contact token endpoint: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Authentication(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ProviderError::Authentication(format!("Failed to parse token response: {}", e))
        })?;

        Ok(token.access_token)
    }
}

#[async_trait]
impl MessagingClient for FcmMessaging {
    async fn send(&self, message: &PushMessage) -> Result<ProviderResponse, ProviderError> {
        let access_token = self.access_token().await?;

        let request = FcmRequest {
            message: FcmMessage {
                token: &message.token,
                notification: FcmNotification {
                    title: &message.title,
                    body: &message.body,
                },
            },
        };

        let url = format!("{}/{}/messages:send", self.app.api_url, self.app.project_id);

        let response = self
            .app
            .client
            .post(&url)
            .bearer_auth(&access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("Failed to connect to FCM: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<FcmErrorEnvelope>(&body) {
                Ok(envelope) => format!("{}: {}", envelope.error.status, envelope.error.message),
                Err(_) => body,
            };
            return Err(ProviderError::SendFailed(format!(
                "FCM API returned error status {}: {}",
                status, detail
            )));
        }

        let fcm_response: FcmResponse = response.json().await.map_err(|e| {
            ProviderError::SendFailed(format!("Failed to parse FCM response: {}", e))
        })?;

        if let Some(error) = fcm_response.error {
            return Err(ProviderError::SendFailed(format!(
                "FCM error ({}): {}",
                error.status, error.message
            )));
        }

        let name = fcm_response.name.ok_or_else(|| {
            ProviderError::SendFailed("FCM response did not include a message name".to_string())
        })?;

        tracing::info!(
            project_id = %self.app.project_id,
            message_id = %name,
            "Push notification sent via FCM"
        );

        Ok(ProviderResponse::new(name))
    }
}
