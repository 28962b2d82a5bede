use super::{run_command, DaemonError, ServiceManager, ServiceSpec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A systemd user unit (`systemctl --user`).
pub struct SystemdUserService {
    spec: ServiceSpec,
    unit_dir: PathBuf,
    systemctl: String,
}

impl SystemdUserService {
    pub fn new(spec: ServiceSpec) -> Result<Self, DaemonError> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            DaemonError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no user configuration directory",
            ))
        })?;
        Ok(Self::with_unit_dir(spec, config_dir.join("systemd").join("user")))
    }

    pub fn with_unit_dir(spec: ServiceSpec, unit_dir: PathBuf) -> Self {
        Self {
            spec,
            unit_dir,
            systemctl: "systemctl".to_string(),
        }
    }

    /// Override the `systemctl` binary.
    pub fn with_systemctl(mut self, program: impl Into<String>) -> Self {
        self.systemctl = program.into();
        self
    }

    pub fn unit_name(&self) -> String {
        format!("{}.service", self.spec.name)
    }

    pub fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(self.unit_name())
    }

    async fn systemctl(&self, args: &[&str]) -> Result<String, DaemonError> {
        let mut full = vec!["--user"];
        full.extend_from_slice(args);
        run_command(&self.systemctl, &full).await
    }

    async fn show(&self) -> Result<UnitState, DaemonError> {
        let unit = self.unit_name();
        let output = self
            .systemctl(&["show", &unit, "--property=ActiveState", "--property=MainPID"])
            .await?;
        Ok(UnitState::parse(&output))
    }
}

/// Unit file contents. `Type=notify` so systemd waits for `READY=1`.
pub fn render_unit(spec: &ServiceSpec) -> String {
    let mut exec_start = format!("\"{}\"", spec.executable.display());
    for arg in &spec.args {
        exec_start.push(' ');
        exec_start.push_str(arg);
    }

    format!(
        "[Unit]\n\
         Description={description}\n\
         After=network-online.target\n\
         Wants=network-online.target\n\
         \n\
         [Service]\n\
         Type=notify\n\
         NotifyAccess=main\n\
         ExecStart={exec_start}\n\
         WorkingDirectory={working_dir}\n\
         Restart=on-failure\n\
         RestartSec=5\n\
         \n\
         [Install]\n\
         WantedBy=default.target\n",
        description = spec.description,
        exec_start = exec_start,
        working_dir = spec.working_dir.display(),
    )
}

#[derive(Debug, Default, PartialEq, Eq)]
struct UnitState {
    active: bool,
    main_pid: Option<u32>,
}

impl UnitState {
    fn parse(output: &str) -> Self {
        let mut state = UnitState::default();
        for line in output.lines() {
            match line.split_once('=') {
                Some(("ActiveState", value)) => {
                    state.active = matches!(value.trim(), "active" | "activating" | "reloading")
                }
                Some(("MainPID", value)) => {
                    state.main_pid = value.trim().parse().ok().filter(|pid| *pid != 0)
                }
                _ => {}
            }
        }
        state
    }

    /// Whether `pid` is the unit's main process. `INVOCATION_ID` is also
    /// inherited by shells spawned under other units, so it is not checked.
    fn is_main_process(&self, pid: u32) -> bool {
        self.active && self.main_pid == Some(pid)
    }
}

#[async_trait]
impl ServiceManager for SystemdUserService {
    async fn install(&self) -> Result<String, DaemonError> {
        let action = format!("Install {}:", self.spec.description);
        if self.is_installed() {
            return Err(DaemonError::AlreadyInstalled);
        }

        tokio::fs::create_dir_all(&self.unit_dir).await?;
        tokio::fs::write(self.unit_path(), render_unit(&self.spec)).await?;

        self.systemctl(&["daemon-reload"]).await?;
        self.systemctl(&["enable", &self.unit_name()]).await?;

        tracing::info!(unit = %self.unit_path().display(), "Installed systemd user unit");
        Ok(format!("{} [OK]", action))
    }

    async fn remove(&self) -> Result<String, DaemonError> {
        let action = format!("Removing {}:", self.spec.description);
        if !self.is_installed() {
            return Err(DaemonError::NotInstalled);
        }

        self.systemctl(&["disable", "--now", &self.unit_name()]).await?;
        tokio::fs::remove_file(self.unit_path()).await?;
        self.systemctl(&["daemon-reload"]).await?;

        Ok(format!("{} [OK]", action))
    }

    async fn start(&self) -> Result<String, DaemonError> {
        let action = format!("Starting {}:", self.spec.description);
        if !self.is_installed() {
            return Err(DaemonError::NotInstalled);
        }
        if self.is_running().await? {
            return Err(DaemonError::AlreadyRunning);
        }

        self.systemctl(&["start", &self.unit_name()]).await?;
        Ok(format!("{} [OK]", action))
    }

    async fn stop(&self) -> Result<String, DaemonError> {
        let action = format!("Stopping {}:", self.spec.description);
        if !self.is_installed() {
            return Err(DaemonError::NotInstalled);
        }
        if !self.is_running().await? {
            return Err(DaemonError::AlreadyStopped);
        }

        self.systemctl(&["stop", &self.unit_name()]).await?;
        Ok(format!("{} [OK]", action))
    }

    async fn status(&self) -> Result<String, DaemonError> {
        if !self.is_installed() {
            return Err(DaemonError::NotInstalled);
        }

        let state = self.show().await?;
        Ok(match (state.active, state.main_pid) {
            (true, Some(pid)) => format!("Service (pid {}) is running...", pid),
            (true, None) => "Service is running...".to_string(),
            (false, _) => "Service is stopped".to_string(),
        })
    }

    async fn is_running(&self) -> Result<bool, DaemonError> {
        if !self.is_installed() {
            return Ok(false);
        }
        Ok(self.show().await?.active)
    }

    fn is_installed(&self) -> bool {
        self.unit_path().exists()
    }

    async fn is_managed_process(&self) -> Result<bool, DaemonError> {
        if !self.is_installed() {
            return Ok(false);
        }
        Ok(self.show().await?.is_main_process(std::process::id()))
    }

    fn notify_started(&self) {
        match notify_ready() {
            Ok(true) => tracing::info!("Notified systemd of readiness"),
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to notify systemd of readiness: {}", e),
        }
    }
}

/// Send `READY=1` to `$NOTIFY_SOCKET`. Returns `false` when no socket is set.
#[cfg(unix)]
pub fn notify_ready() -> std::io::Result<bool> {
    use std::os::unix::net::UnixDatagram;

    let Some(socket) = std::env::var_os("NOTIFY_SOCKET") else {
        return Ok(false);
    };
    let socket = PathBuf::from(socket);
    let datagram = UnixDatagram::unbound()?;

    #[cfg(target_os = "linux")]
    {
        if let Some(name) = abstract_name(&socket) {
            use std::os::linux::net::SocketAddrExt;
            use std::os::unix::net::SocketAddr;

            let addr = SocketAddr::from_abstract_name(name)?;
            datagram.send_to_addr(b"READY=1", &addr)?;
            return Ok(true);
        }
    }

    datagram.send_to(b"READY=1", &socket)?;
    Ok(true)
}

#[cfg(not(unix))]
pub fn notify_ready() -> std::io::Result<bool> {
    Ok(false)
}

/// `@name` denotes a Linux abstract socket.
#[cfg(target_os = "linux")]
fn abstract_name(socket: &Path) -> Option<&[u8]> {
    use std::os::unix::ffi::OsStrExt;

    socket.as_os_str().as_bytes().strip_prefix(b"@")
}
