//! OS service-manager integration.
//!
//! The daemon registers itself as a user-level service with the host's
//! native manager (systemd on Linux, launchd on macOS) and drives it through
//! the manager's own CLI. Nothing here reimplements service supervision.

pub mod launchd;
pub mod pidfile;
pub mod systemd;

use async_trait::async_trait;
use service_core::error::AppError;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;

pub use launchd::LaunchAgent;
pub use pidfile::PidFile;
pub use systemd::SystemdUserService;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Service is not installed")]
    NotInstalled,

    #[error("Service has already been installed")]
    AlreadyInstalled,

    #[error("Service is already running")]
    AlreadyRunning,

    #[error("Service has already been stopped")]
    AlreadyStopped,

    #[error("Service management is not supported on this platform")]
    Unsupported,

    #[error("`{command}` failed ({status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Server(#[from] AppError),
}

/// What the service manager needs to know to run this binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub description: String,
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl ServiceSpec {
    /// Spec for the running binary, launched as `<exe> start` from the
    /// current directory so relative credential paths keep resolving.
    pub fn for_current_process(name: &str, description: &str) -> Result<Self, DaemonError> {
        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            executable: std::env::current_exe()?,
            args: vec!["start".to_string()],
            working_dir: std::env::current_dir()?,
        })
    }
}

/// Lifecycle operations offered by a host service manager.
///
/// Each operation returns a human-readable status line on success.
#[async_trait]
pub trait ServiceManager: Send + Sync {
    async fn install(&self) -> Result<String, DaemonError>;
    async fn remove(&self) -> Result<String, DaemonError>;
    async fn start(&self) -> Result<String, DaemonError>;
    async fn stop(&self) -> Result<String, DaemonError>;
    async fn status(&self) -> Result<String, DaemonError>;

    async fn is_running(&self) -> Result<bool, DaemonError>;
    fn is_installed(&self) -> bool;

    /// Whether the current process is the one the manager is running as
    /// this service.
    async fn is_managed_process(&self) -> Result<bool, DaemonError>;

    /// Tell the manager the service has finished starting.
    fn notify_started(&self) {}
}

/// Rejects every operation; used where no native manager is supported.
pub struct UnsupportedManager;

#[async_trait]
impl ServiceManager for UnsupportedManager {
    async fn install(&self) -> Result<String, DaemonError> {
        Err(DaemonError::Unsupported)
    }

    async fn remove(&self) -> Result<String, DaemonError> {
        Err(DaemonError::Unsupported)
    }

    async fn start(&self) -> Result<String, DaemonError> {
        Err(DaemonError::Unsupported)
    }

    async fn stop(&self) -> Result<String, DaemonError> {
        Err(DaemonError::Unsupported)
    }

    async fn status(&self) -> Result<String, DaemonError> {
        Err(DaemonError::Unsupported)
    }

    async fn is_running(&self) -> Result<bool, DaemonError> {
        Ok(false)
    }

    fn is_installed(&self) -> bool {
        false
    }

    async fn is_managed_process(&self) -> Result<bool, DaemonError> {
        Ok(false)
    }
}

/// The native manager for the host platform.
pub fn platform_manager(spec: ServiceSpec) -> Box<dyn ServiceManager> {
    if cfg!(target_os = "linux") {
        match SystemdUserService::new(spec) {
            Ok(service) => return Box::new(service),
            Err(e) => tracing::warn!("systemd user service unavailable: {}", e),
        }
    } else if cfg!(target_os = "macos") {
        match LaunchAgent::new(spec) {
            Ok(agent) => return Box::new(agent),
            Err(e) => tracing::warn!("launchd agent unavailable: {}", e),
        }
    }
    Box::new(UnsupportedManager)
}

/// Run a manager CLI command, returning its stdout.
pub(crate) async fn run_command(program: &str, args: &[&str]) -> Result<String, DaemonError> {
    let command = format!("{} {}", program, args.join(" "));
    tracing::debug!(%command, "Running service manager command");

    let output = Command::new(program).args(args).output().await?;

    if !output.status.success() {
        return Err(DaemonError::Command {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
