//! Process management module
//!
//! Handles PID file creation/management for a single-instance guard.
//! Operates based on home directory for non-root user support.

use anyhow::{bail, Result};
use nix::sys::signal;
use nix::unistd::Pid;
use std::fs;
use std::io::Write;
use std::process;

use crate::constants::{get_pid_file_path, get_runtime_dir};
use crate::error::ResultExt;

/// Process manager
///
/// Identifies duplicate runs via PID file.
pub struct ProcessManager;

impl ProcessManager {
    /// Write current process PID to file
    ///
    /// If PID file already exists and names a live process, considers it
    /// a duplicate execution and returns an error. A stale file (naming a
    /// process that is no longer running) is replaced.
    pub fn write_pid_file() -> Result<()> {
        let pid_path = get_pid_file_path();

        let runtime_dir = get_runtime_dir();
        std::fs::create_dir_all(&runtime_dir).context_process(&format!(
            "Failed to create runtime directory: {}",
            runtime_dir.display()
        ))?;

        if pid_path.exists() {
            if let Ok(old_pid) = Self::read_pid_file() {
                if Self::is_process_running(old_pid) {
                    bail!("bifrost is already running (PID: {}).", old_pid);
                }
            }
            let _ = fs::remove_file(&pid_path);
        }

        let pid = process::id();
        let mut file = fs::File::create(&pid_path)
            .context_process(&format!("Failed to create PID file: {}", pid_path.display()))?;

        writeln!(file, "{}", pid)
            .context_process(&format!("Failed to write PID file: {}", pid_path.display()))?;

        log::debug!("PID file created: {} (PID: {})", pid_path.display(), pid);
        Ok(())
    }

    /// Read PID from PID file
    pub fn read_pid_file() -> Result<i32> {
        let pid_path = get_pid_file_path();

        let content = fs::read_to_string(&pid_path)
            .context_process(&format!("Failed to read PID file: {}", pid_path.display()))?;

        let pid: i32 = content
            .trim()
            .parse::<i32>()
            .map_err(|e| anyhow::anyhow!("Invalid PID file content: {}", e))?;

        Ok(pid)
    }

    /// Remove PID file
    pub fn remove_pid_file() -> Result<()> {
        let pid_path = get_pid_file_path();

        if pid_path.exists() {
            fs::remove_file(&pid_path)
                .context_process(&format!("Failed to remove PID file: {}", pid_path.display()))?;
            log::debug!("PID file removed: {}", pid_path.display());
        }

        Ok(())
    }

    /// Check if a process is running.
    ///
    /// Signal 0 doesn't actually send a signal, only checks existence.
    fn is_process_running(pid: i32) -> bool {
        let pid = Pid::from_raw(pid);
        signal::kill(pid, None).is_ok()
    }
}

/// Cleanup guard - PID file auto-cleanup using RAII pattern
///
/// Automatically cleans up PID file on normal/abnormal process termination.
pub struct PidFileGuard;

impl PidFileGuard {
    pub fn new() -> Result<Self> {
        ProcessManager::write_pid_file()?;
        Ok(Self)
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if let Err(e) = ProcessManager::remove_pid_file() {
            log::error!("Failed to clean up PID file: {}", e);
        }
    }
}
