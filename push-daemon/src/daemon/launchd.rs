use super::{run_command, DaemonError, ServiceManager, ServiceSpec};
use async_trait::async_trait;
use std::path::PathBuf;

/// A per-user launchd agent (`~/Library/LaunchAgents`).
pub struct LaunchAgent {
    spec: ServiceSpec,
    agents_dir: PathBuf,
    launchctl: String,
}

impl LaunchAgent {
    pub fn new(spec: ServiceSpec) -> Result<Self, DaemonError> {
        let home = dirs::home_dir().ok_or_else(|| {
            DaemonError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no home directory",
            ))
        })?;
        Ok(Self::with_agents_dir(
            spec,
            home.join("Library").join("LaunchAgents"),
        ))
    }

    pub fn with_agents_dir(spec: ServiceSpec, agents_dir: PathBuf) -> Self {
        Self {
            spec,
            agents_dir,
            launchctl: "launchctl".to_string(),
        }
    }

    /// Override the `launchctl` binary.
    pub fn with_launchctl(mut self, program: impl Into<String>) -> Self {
        self.launchctl = program.into();
        self
    }

    pub fn plist_path(&self) -> PathBuf {
        self.agents_dir.join(format!("{}.plist", self.spec.name))
    }

    async fn launchctl(&self, args: &[&str]) -> Result<String, DaemonError> {
        run_command(&self.launchctl, args).await
    }

    /// PID of the loaded agent, if launchd reports one.
    async fn loaded_pid(&self) -> Result<Option<Option<u32>>, DaemonError> {
        match self.launchctl(&["list", &self.spec.name]).await {
            Ok(output) => Ok(Some(parse_pid(&output))),
            // `launchctl list <label>` exits non-zero when the label is not loaded.
            Err(DaemonError::Command { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_plist(spec: &ServiceSpec) -> String {
    let mut arguments = format!(
        "        <string>{}</string>\n",
        xml_escape(&spec.executable.display().to_string())
    );
    for arg in &spec.args {
        arguments.push_str(&format!("        <string>{}</string>\n", xml_escape(arg)));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
{arguments}    </array>
    <key>WorkingDirectory</key>
    <string>{working_dir}</string>
    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <dict>
        <key>SuccessfulExit</key>
        <false/>
    </dict>
</dict>
</plist>
"#,
        label = xml_escape(&spec.name),
        arguments = arguments,
        working_dir = xml_escape(&spec.working_dir.display().to_string()),
    )
}

/// Extract `"PID" = 123;` from `launchctl list <label>` output.
fn parse_pid(output: &str) -> Option<u32> {
    output.lines().find_map(|line| {
        let line = line.trim();
        let rest = line.strip_prefix("\"PID\"")?;
        rest.trim_start_matches([' ', '='])
            .trim_end_matches(';')
            .trim()
            .parse()
            .ok()
    })
}

#[async_trait]
impl ServiceManager for LaunchAgent {
    async fn install(&self) -> Result<String, DaemonError> {
        let action = format!("Install {}:", self.spec.description);
        if self.is_installed() {
            return Err(DaemonError::AlreadyInstalled);
        }

        tokio::fs::create_dir_all(&self.agents_dir).await?;
        tokio::fs::write(self.plist_path(), render_plist(&self.spec)).await?;

        tracing::info!(plist = %self.plist_path().display(), "Installed launchd agent");
        Ok(format!("{} [OK]", action))
    }

    async fn remove(&self) -> Result<String, DaemonError> {
        let action = format!("Removing {}:", self.spec.description);
        if !self.is_installed() {
            return Err(DaemonError::NotInstalled);
        }

        if self.loaded_pid().await?.is_some() {
            let plist = self.plist_path().display().to_string();
            self.launchctl(&["unload", &plist]).await?;
        }
        tokio::fs::remove_file(self.plist_path()).await?;

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

        let plist = self.plist_path().display().to_string();
        self.launchctl(&["load", &plist]).await?;
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

        let plist = self.plist_path().display().to_string();
        self.launchctl(&["unload", &plist]).await?;
        Ok(format!("{} [OK]", action))
    }

    async fn status(&self) -> Result<String, DaemonError> {
        if !self.is_installed() {
            return Err(DaemonError::NotInstalled);
        }

        Ok(match self.loaded_pid().await? {
            Some(Some(pid)) => format!("Service (pid {}) is running...", pid),
            _ => "Service is stopped".to_string(),
        })
    }

    async fn is_running(&self) -> Result<bool, DaemonError> {
        if !self.is_installed() {
            return Ok(false);
        }
        Ok(matches!(self.loaded_pid().await?, Some(Some(_))))
    }

    fn is_installed(&self) -> bool {
        self.plist_path().exists()
    }

    async fn is_managed_process(&self) -> Result<bool, DaemonError> {
        if !self.is_installed() {
            return Ok(false);
        }
        Ok(self.loaded_pid().await? == Some(Some(std::process::id())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ServiceSpec {
        ServiceSpec {
            name: "push-daemon".to_string(),
            description: "Push notification relay daemon".to_string(),
            executable: PathBuf::from("/usr/local/bin/push-daemon"),
            args: vec!["start".to_string()],
            working_dir: PathBuf::from("/Users/ops/push & relay"),
        }
    }

    #[test]
    fn plist_lists_program_arguments_in_order() {
        let plist = render_plist(&spec());

        let exe = plist.find("<string>/usr/local/bin/push-daemon</string>").unwrap();
        let arg = plist.find("<string>start</string>").unwrap();
        assert!(exe < arg);
        assert!(plist.contains("<string>/Users/ops/push &amp; relay</string>"));
        assert!(plist.contains("<key>Label</key>\n    <string>push-daemon</string>"));
    }

    #[test]
    fn parses_pid_from_launchctl_list() {
        let output = "{\n\t\"LimitLoadToSessionType\" = \"Aqua\";\n\t\"Label\" = \"push-daemon\";\n\t\"PID\" = 811;\n};\n";
        assert_eq!(parse_pid(output), Some(811));
    }

    #[test]
    fn loaded_agent_without_pid_is_not_running() {
        let output = "{\n\t\"Label\" = \"push-daemon\";\n\t\"LastExitStatus\" = 0;\n};\n";
        assert_eq!(parse_pid(output), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn install_writes_plist_once() {
        let dir = tempfile::tempdir().unwrap();
        let agent = LaunchAgent::with_agents_dir(spec(), dir.path().to_path_buf())
            .with_launchctl("false");

        agent.install().await.unwrap();
        assert!(agent.plist_path().exists());
        assert!(matches!(
            agent.install().await,
            Err(DaemonError::AlreadyInstalled)
        ));

        // `false` makes every label look unloaded.
        assert_eq!(agent.status().await.unwrap(), "Service is stopped");
        agent.remove().await.unwrap();
        assert!(!agent.is_installed());
    }
}
