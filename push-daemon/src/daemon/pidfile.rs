//! PID file for the serving process, so `stop` from another invocation can
//! find and signal it.

use super::DaemonError;
use std::path::{Path, PathBuf};

/// Owns the PID file while the listener runs; removed on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Record the current process. Fails if the file names a live process.
    pub fn create(path: &Path) -> Result<Self, DaemonError> {
        if let Some(pid) = read_pid(path)? {
            if is_alive(pid) {
                return Err(DaemonError::AlreadyRunning);
            }
            tracing::warn!(pid, path = %path.display(), "Replacing stale PID file");
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, format!("{}\n", std::process::id()))?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), "Failed to remove PID file: {}", e);
        }
    }
}

/// PID recorded at `path`, or `None` if there is no readable PID file.
pub fn read_pid(path: &Path) -> Result<Option<i32>, DaemonError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents.trim().parse().ok().filter(|pid| *pid > 0)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
pub fn is_alive(pid: i32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid), None).is_ok()
}

#[cfg(not(unix))]
pub fn is_alive(_pid: i32) -> bool {
    false
}

/// Ask the process recorded in the PID file to shut down gracefully.
///
/// Returns the signalled PID, or `None` when no live process is recorded.
#[cfg(unix)]
pub fn terminate(path: &Path) -> Result<Option<i32>, DaemonError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = read_pid(path)? else {
        return Ok(None);
    };
    if !is_alive(pid) {
        tracing::info!(pid, "PID file names a process that is no longer running");
        return Ok(None);
    }

    kill(Pid::from_raw(pid), Signal::SIGTERM)
        .map_err(|errno| DaemonError::Io(std::io::Error::from(errno)))?;
    Ok(Some(pid))
}

#[cfg(not(unix))]
pub fn terminate(_path: &Path) -> Result<Option<i32>, DaemonError> {
    Err(DaemonError::Unsupported)
}
