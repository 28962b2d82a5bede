//! Service-account credentials for the messaging provider.
//!
//! The source is fixed at startup but read again for every provider app, so
//! a rotated key file is picked up without restarting the daemon.

use super::ProviderError;
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Where service-account credentials are read from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialsSource {
    /// Path to a service-account JSON file, relative to the working directory.
    File(PathBuf),
    /// The service-account JSON document itself.
    Inline(String),
}

impl fmt::Debug for CredentialsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsSource::File(path) => f.debug_tuple("File").field(path).finish(),
            CredentialsSource::Inline(_) => f.write_str("Inline([REDACTED])"),
        }
    }
}

/// Google service-account key, as downloaded from the Firebase console.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: SecretString,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl CredentialsSource {
    /// Read and parse the service-account key.
    pub async fn load(&self) -> Result<ServiceAccountKey, ProviderError> {
        let raw = match self {
            CredentialsSource::File(path) => {
                tokio::fs::read_to_string(path).await.map_err(|e| {
                    ProviderError::Credentials(format!(
                        "Failed to read credentials file {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
            CredentialsSource::Inline(json) => json.clone(),
        };

        let key: ServiceAccountKey = serde_json::from_str(&raw).map_err(|e| {
            ProviderError::Credentials(format!("Failed to parse service account key: {}", e))
        })?;

        if !key.key_type.is_empty() && key.key_type != "service_account" {
            return Err(ProviderError::Credentials(format!(
                "Unsupported credential type '{}', expected service_account",
                key.key_type
            )));
        }

        Ok(key)
    }
}
