//! Command-line dispatch: `push-daemon {install|remove|start|stop|status}`.

use crate::config::{DaemonConfig, SERVICE_DESCRIPTION, SERVICE_NAME};
use crate::daemon::{pidfile, DaemonError, PidFile, ServiceManager};
use crate::services::PushProvider;
use crate::startup::{push_provider_from_config, shutdown_signal, Application};
use clap::{error::ErrorKind, Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const USAGE: &str = "Usage: push-daemon install | remove | start | stop | status";

#[derive(Debug, Parser)]
#[command(name = SERVICE_NAME, version, about = SERVICE_DESCRIPTION)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Register as a user-level OS service
    Install,
    /// Unregister the OS service
    Remove,
    /// Serve HTTP, or ask the service manager to start the installed service
    Start,
    /// Stop the running server
    Stop,
    /// Report service status
    Status,
}

/// Parse process arguments. Missing or unknown commands yield `Ok(None)`;
/// only `--help` and `--version` surface as errors, for clap to print.
pub fn parse_command<I, T>(args: I) -> Result<Option<Command>, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(cli.command),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            Err(e)
        }
        Err(_) => Ok(None),
    }
}

pub struct Controller {
    manager: Box<dyn ServiceManager>,
    config: Option<DaemonConfig>,
    push_provider: Option<Arc<dyn PushProvider>>,
    shutdown: CancellationToken,
}

impl Controller {
    /// Configuration is read from the environment, and only by the commands
    /// that need it (`start` and `stop`).
    pub fn new(manager: Box<dyn ServiceManager>) -> Self {
        Self {
            manager,
            config: None,
            push_provider: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use `config` instead of reading the environment.
    pub fn with_config(mut self, config: DaemonConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Serve with `push_provider` instead of the one `config` selects.
    pub fn with_provider(mut self, push_provider: Arc<dyn PushProvider>) -> Self {
        self.push_provider = Some(push_provider);
        self
    }

    /// Cancelling this stops a server started by [`Controller::manage`]
    /// as if it had received SIGTERM.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run one command and return the status line to print.
    pub async fn manage(&self, command: Option<Command>) -> Result<String, DaemonError> {
        match command {
            None => Ok(USAGE.to_string()),
            Some(Command::Install) => self.manager.install().await,
            Some(Command::Remove) => self.manager.remove().await,
            Some(Command::Start) => self.start().await,
            Some(Command::Stop) => self.stop().await,
            Some(Command::Status) => self.manager.status().await,
        }
    }

    fn config(&self) -> Result<DaemonConfig, DaemonError> {
        match &self.config {
            Some(config) => Ok(config.clone()),
            None => Ok(DaemonConfig::load()?),
        }
    }

    async fn start(&self) -> Result<String, DaemonError> {
        if self.manager.is_installed() && !self.manager.is_managed_process().await? {
            return self.manager.start().await;
        }
        self.serve(self.config()?).await
    }

    /// Bind, publish the shutdown handle, report readiness, then serve until
    /// SIGINT/SIGTERM.
    async fn serve(&self, config: DaemonConfig) -> Result<String, DaemonError> {
        // Handlers go in before the PID file is visible to `stop`.
        let signal = shutdown_signal();
        let pid_file = PidFile::create(&config.pid_file)?;
        let push_provider = match &self.push_provider {
            Some(provider) => provider.clone(),
            None => push_provider_from_config(&config),
        };
        let app = Application::build(config, push_provider).await?;

        let shutdown = app.shutdown_handle();
        let stop = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = signal => {}
                _ = stop.cancelled() => {}
            }
            shutdown.cancel();
        });

        self.manager.notify_started();
        tracing::info!(
            port = app.port(),
            pid_file = %pid_file.path().display(),
            "{} started",
            SERVICE_NAME
        );

        app.run_until_stopped().await?;
        drop(pid_file);

        tracing::info!("Server shut down successfully");
        Ok(format!("{} stopped", SERVICE_DESCRIPTION))
    }

    async fn stop(&self) -> Result<String, DaemonError> {
        tracing::info!("Received request to stop the server. Shutting down gracefully...");

        if self.manager.is_running().await? {
            return self.manager.stop().await;
        }

        let config = self.config()?;
        match pidfile::terminate(&config.pid_file)? {
            Some(pid) => {
                tracing::info!(pid, "Sent SIGTERM to running server");
                Ok(format!("Stopping {} (pid {}): [OK]", SERVICE_DESCRIPTION, pid))
            }
            None if self.manager.is_installed() => Err(DaemonError::AlreadyStopped),
            None => Err(DaemonError::NotInstalled),
        }
    }
}
