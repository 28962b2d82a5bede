#![allow(dead_code)]

use push_daemon::config::{DaemonConfig, FcmConfig};
use push_daemon::services::{CredentialsSource, PushProvider};
use push_daemon::startup::Application;
use service_core::config::Config as CoreConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test-service-account.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/test-service-account.pub.pem");
pub const TEST_KEY_ID: &str = "test-key-id";
pub const TEST_CLIENT_EMAIL: &str = "relay@test-project.iam.gserviceaccount.com";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub shutdown: CancellationToken,
    pub server: tokio::task::JoinHandle<std::io::Result<()>>,
}

pub fn test_config(fcm: FcmConfig) -> DaemonConfig {
    DaemonConfig {
        // Use random port for testing (port 0)
        common: CoreConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
        },
        fcm,
        pid_file: std::env::temp_dir().join(format!("push-daemon-test-{}.pid", std::process::id())),
    }
}

/// Service-account JSON whose token endpoint is `token_uri`.
pub fn service_account_json(project_id: &str, token_uri: &str) -> String {
    serde_json::json!({
        "type": "service_account",
        "project_id": project_id,
        "private_key_id": TEST_KEY_ID,
        "private_key": TEST_PRIVATE_KEY,
        "client_email": TEST_CLIENT_EMAIL,
        "token_uri": token_uri,
    })
    .to_string()
}

pub fn fcm_config(credentials: CredentialsSource, api_url: &str) -> FcmConfig {
    FcmConfig {
        credentials,
        api_url: api_url.to_string(),
        dry_run: false,
    }
}

pub fn missing_credentials() -> CredentialsSource {
    CredentialsSource::File(PathBuf::from("/nonexistent/push-daemon/auth.json"))
}

impl TestApp {
    pub async fn spawn(push_provider: Arc<dyn PushProvider>) -> Self {
        Self::spawn_with_config(test_config(FcmConfig::default()), push_provider).await
    }

    pub async fn spawn_with_config(
        config: DaemonConfig,
        push_provider: Arc<dyn PushProvider>,
    ) -> Self {
        let app = Application::build(config, push_provider)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);
        let shutdown = app.shutdown_handle();

        let server = tokio::spawn(app.run_until_stopped());

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            shutdown,
            server,
        }
    }

    pub async fn send_raw(&self, body: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/send_notifications", self.address))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn send(&self, payload: &serde_json::Value) -> reqwest::Response {
        self.send_raw(&payload.to_string()).await
    }
}
