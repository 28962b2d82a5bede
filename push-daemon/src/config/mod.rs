use crate::services::credentials::CredentialsSource;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;

pub const SERVICE_NAME: &str = "push-daemon";
pub const SERVICE_DESCRIPTION: &str = "Push notification relay daemon";

const DEFAULT_CREDENTIALS_FILE: &str = "auth.json";
const DEFAULT_FCM_API_URL: &str = "https://fcm.googleapis.com/v1/projects";

/// Settings for serving: listener, provider and PID file. Only `start` and
/// `stop` load these.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub common: core_config::Config,
    pub fcm: FcmConfig,
    pub pid_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub credentials: CredentialsSource,
    /// Base URL of the FCM HTTP v1 API, without the project segment.
    pub api_url: String,
    /// Record messages in-process instead of sending them.
    pub dry_run: bool,
}

/// Logging settings, needed by every command.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("LOG_LEVEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
        }
    }
}

impl DaemonConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        // Inline JSON wins over a file path so containers can inject secrets
        // without touching the filesystem.
        let credentials = match env::var("FCM_CREDENTIALS_JSON") {
            Ok(json) if !json.trim().is_empty() => CredentialsSource::Inline(json),
            _ => CredentialsSource::File(PathBuf::from(get_env(
                "FCM_CREDENTIALS_FILE",
                Some(DEFAULT_CREDENTIALS_FILE),
                is_prod,
            )?)),
        };

        Ok(DaemonConfig {
            common: common_config,
            fcm: FcmConfig {
                credentials,
                api_url: get_env("FCM_API_URL", Some(DEFAULT_FCM_API_URL), false)?,
                dry_run: parse_flag("FCM_DRY_RUN", env::var("FCM_DRY_RUN").ok().as_deref())?,
            },
            pid_file: env::var("PUSH_DAEMON_PID_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_pid_file()),
        })
    }
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            credentials: CredentialsSource::File(PathBuf::from(DEFAULT_CREDENTIALS_FILE)),
            api_url: DEFAULT_FCM_API_URL.to_string(),
            dry_run: false,
        }
    }
}

pub fn default_pid_file() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(env::temp_dir)
        .join(format!("{}.pid", SERVICE_NAME))
}

/// Boolean switch from the environment. Unset or empty means `false`;
/// anything unrecognised is rejected rather than read as `false`.
fn parse_flag(key: &str, value: Option<&str>) -> Result<bool, AppError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(false);
    };

    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be a boolean, got {:?}",
            key,
            other
        ))),
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_env_falls_back_to_default_outside_prod() {
        let value = get_env("PUSH_DAEMON_TEST_UNSET_KEY", Some("fallback"), false).unwrap();
        assert_eq!(value, "fallback");
    }

    #[test]
    fn get_env_requires_value_in_prod() {
        let err = get_env("PUSH_DAEMON_TEST_UNSET_KEY", Some("fallback"), true).unwrap_err();
        assert!(err.to_string().contains("required in production"));
    }

    #[test]
    fn get_env_without_default_is_an_error() {
        assert!(get_env("PUSH_DAEMON_TEST_UNSET_KEY", None, false).is_err());
    }

    #[test]
    fn default_fcm_config_reads_auth_json() {
        let fcm = FcmConfig::default();
        assert_eq!(
            fcm.credentials,
            CredentialsSource::File(PathBuf::from("auth.json"))
        );
        assert_eq!(fcm.api_url, "https://fcm.googleapis.com/v1/projects");
    }

    #[test]
    fn dry_run_flag_accepts_common_spellings() {
        for value in ["true", "TRUE", "1", "yes", "On"] {
            assert!(parse_flag("FCM_DRY_RUN", Some(value)).unwrap(), "{value}");
        }
        for value in ["false", "FALSE", "0", "no", "off", ""] {
            assert!(!parse_flag("FCM_DRY_RUN", Some(value)).unwrap(), "{value}");
        }
        assert!(!parse_flag("FCM_DRY_RUN", None).unwrap());
    }

    #[test]
    fn unrecognised_dry_run_flag_is_a_config_error() {
        let err = parse_flag("FCM_DRY_RUN", Some("sometimes")).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        assert!(err.to_string().contains("FCM_DRY_RUN"));
    }

    #[test]
    fn default_pid_file_is_named_after_service() {
        assert!(default_pid_file().ends_with("push-daemon.pid"));
    }
}
