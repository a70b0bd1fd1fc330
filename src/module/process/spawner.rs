//! Child host process spawning
//!
//! A child host runs the same binary in child mode. It receives the parent's
//! reconstructable manager options on the command line and talks to the
//! parent over its stdin/stdout, while stderr is inherited for logs.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::ipc::channel::RawChannel;
use crate::module::traits::ModuleError;
use crate::utils::timeout::{with_timeout, DEFAULT_HOST_EXIT_TIMEOUT};

/// Command-line flag carrying the manager options of a child host
pub const CONSTRUCTOR_OPTIONS_FLAG: &str = "--module-manager-constructor-options";

/// Spawns child host processes
#[derive(Debug, Clone)]
pub struct HostProcessSpawner {
    executable: PathBuf,
}

impl HostProcessSpawner {
    pub fn new<P: AsRef<Path>>(executable: P) -> Self {
        Self {
            executable: executable.as_ref().to_path_buf(),
        }
    }

    /// Spawner re-running the current executable
    pub fn current_exe() -> Result<Self, ModuleError> {
        let executable = std::env::current_exe().map_err(|e| {
            ModuleError::ProcessError(format!("Failed to locate current executable: {}", e))
        })?;
        Ok(Self::new(executable))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Spawn a child host; returns its handle and the pipes to talk to it
    pub fn spawn(
        &self,
        host_name: &str,
        constructor_options: &str,
    ) -> Result<(HostProcess, RawChannel), ModuleError> {
        info!("Spawning host process: {}", host_name);

        if !self.executable.exists() {
            return Err(ModuleError::ProcessError(format!(
                "Host executable not found: {:?}",
                self.executable
            )));
        }

        let mut command = Command::new(&self.executable);
        command
            .arg(CONSTRUCTOR_OPTIONS_FLAG)
            .arg(constructor_options)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .env("MODULE_HOST_NAME", host_name)
            .kill_on_drop(true);

        debug!("Spawning process: {:?}", command);

        let mut child = command.spawn().map_err(|e| {
            ModuleError::ProcessError(format!("Failed to spawn host process: {}", e))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            ModuleError::ProcessError("Host process stdin is not piped".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ModuleError::ProcessError("Host process stdout is not piped".to_string())
        })?;

        Ok((
            HostProcess {
                host_name: host_name.to_string(),
                process: child,
            },
            RawChannel::ChildProcess { stdin, stdout },
        ))
    }
}

/// Running child host
#[derive(Debug)]
pub struct HostProcess {
    pub host_name: String,
    process: Child,
}

impl HostProcess {
    pub fn id(&self) -> Option<u32> {
        self.process.id()
    }

    /// Check if process is still running
    pub fn is_running(&mut self) -> bool {
        !matches!(self.process.try_wait(), Ok(Some(_)))
    }

    /// Wait briefly for a voluntary exit, then kill
    pub async fn terminate(&mut self) -> Result<(), ModuleError> {
        if let Ok(Ok(status)) = with_timeout(self.process.wait(), DEFAULT_HOST_EXIT_TIMEOUT).await {
            debug!("Host process {} exited: {}", self.host_name, status);
            return Ok(());
        }

        debug!("Killing host process: {}", self.host_name);
        if let Err(e) = self.process.kill().await {
            warn!("Failed to kill host process {}: {}", self.host_name, e);
            return Err(ModuleError::ProcessError(e.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_executable() {
        let spawner = HostProcessSpawner::new("/nonexistent/module-host");
        assert!(matches!(
            spawner.spawn("child", "{}"),
            Err(ModuleError::ProcessError(_))
        ));
    }
}
