//! Lifecycle owner of the external capture process.
//!
//! The supervisor never blocks on the child directly; liveness is judged
//! solely by the mtime of the export artifact, so a wedged child cannot hang
//! the acquisition loop.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use gasrec_foundation::{CaptureError, CaptureState, Liveness, SharedClock, StateManager};

use crate::device::DevicePort;

/// Vendor export artifacts, written by the capture process into the repo
/// directory and snapshotted each tick.
pub const EXPORT_CSV: &str = "AS3DataExport.csv";
pub const EXPORT_RAW: &str = "AS3Rawoutput1.raw";

/// Age of the export artifact beyond which the capture process is presumed
/// wedged and restarted.
pub const STALE_AFTER: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub port: DevicePort,
    /// Runtime used to host the vendor capture binary.
    pub runtime: PathBuf,
    /// Path to the vendor capture binary.
    pub capture_exe: PathBuf,
    /// Sampling interval handed to the capture process, in seconds.
    pub sample_interval_secs: u32,
    pub stale_after: Duration,
    /// Combined stdout+stderr of the capture process, appended here.
    pub monitor_log: PathBuf,
}

impl SupervisorConfig {
    pub fn new(repodir: &Path, monitor_log: PathBuf) -> Self {
        Self {
            port: DevicePort::default(),
            runtime: PathBuf::from("/usr/bin/mono"),
            capture_exe: repodir.join("VSCapture.exe"),
            sample_interval_secs: 5,
            stale_after: STALE_AFTER,
            monitor_log,
        }
    }
}

pub struct ProcessSupervisor {
    config: SupervisorConfig,
    state: StateManager,
    child: Option<Child>,
    clock: SharedClock,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig, clock: SharedClock) -> Self {
        Self {
            config,
            state: StateManager::new(),
            child: None,
            clock,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state.current()
    }

    pub fn subscribe_states(&self) -> crossbeam_channel::Receiver<CaptureState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Remove leftover export artifacts from a previous run so the first
    /// liveness check cannot see a stale file from another session.
    pub fn clear_stale_exports(&self, repodir: &Path) {
        for name in [EXPORT_CSV, EXPORT_RAW] {
            let path = repodir.join(name);
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::info!("Removed leftover export {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }

    /// Launch the capture process. Fails with `DeviceNotFound` when the
    /// serial interface is absent; that is fatal to the whole session.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if !self.config.port.is_present() {
            return Err(CaptureError::DeviceNotFound {
                port: self.config.port.path().to_path_buf(),
            });
        }
        self.spawn_child()?;
        self.state.transition(CaptureState::Running)?;
        tracing::info!("Monitor found at {}", self.config.port.path().display());
        Ok(())
    }

    /// Classify the export artifact by mtime age. `Missing` is tolerated as
    /// warm-up and never forces a restart; `Stale` does.
    pub fn check_liveness(&self, artifact: &Path) -> Liveness {
        let Ok(meta) = std::fs::metadata(artifact) else {
            return Liveness::Missing;
        };
        let Ok(mtime) = meta.modified() else {
            return Liveness::Missing;
        };
        let age = self
            .clock
            .system_now()
            .duration_since(mtime)
            .unwrap_or(Duration::ZERO);
        if age < self.config.stale_after {
            Liveness::Fresh
        } else {
            Liveness::Stale { age }
        }
    }

    /// Kill the current child and relaunch, re-probing the hardware first.
    /// A failed probe here means the monitor was physically disconnected;
    /// there is no recovery path without reconnection, so it is fatal.
    pub fn restart(&mut self) -> Result<(), CaptureError> {
        tracing::warn!("Monitor crash detected, killing process and restarting...");
        self.kill_child();
        self.state.transition(CaptureState::Dead)?;

        if !self.config.port.is_present() {
            let port = self.config.port.path().to_path_buf();
            self.state.transition(CaptureState::Fatal {
                reason: format!("{} not found, monitor disconnected?", port.display()),
            })?;
            return Err(CaptureError::DeviceDisconnected { port });
        }

        self.state.transition(CaptureState::Starting)?;
        self.spawn_child()?;
        self.state.transition(CaptureState::Running)?;
        Ok(())
    }

    /// Terminate the child unconditionally. Idempotent.
    pub fn shutdown(&mut self) {
        self.kill_child();
        // State may already be terminal; the transition is best-effort.
        let _ = self.state.transition(CaptureState::Dead);
    }

    fn spawn_child(&mut self) -> Result<(), CaptureError> {
        debug_assert!(self.child.is_none(), "previous handle must be reaped first");
        let log = self.open_monitor_log()?;
        let log_err = log.try_clone().map_err(CaptureError::Spawn)?;

        let child = Command::new(&self.config.runtime)
            .arg(&self.config.capture_exe)
            .arg("-port")
            .arg(self.config.port.path())
            .arg("-interval")
            .arg(self.config.sample_interval_secs.to_string())
            .arg("-export")
            .arg("1")
            .arg("-waveset")
            .arg("0")
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(CaptureError::Spawn)?;

        tracing::debug!("Capture process spawned, pid {}", child.id());
        self.child = Some(child);
        Ok(())
    }

    fn kill_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                tracing::warn!("Failed to kill capture process: {}", e);
            }
            // Reap so the pid is released before any respawn.
            if let Err(e) = child.wait() {
                tracing::warn!("Failed to reap capture process: {}", e);
            }
        }
    }

    fn open_monitor_log(&self) -> Result<File, CaptureError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.monitor_log)
            .map_err(CaptureError::Spawn)
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        self.kill_child();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasrec_foundation::{test_clock, TestClock};
    use std::sync::Arc;

    fn test_config(dir: &Path) -> SupervisorConfig {
        let dev = dir.join("ttyUSB0");
        std::fs::write(&dev, b"").unwrap();
        SupervisorConfig {
            port: DevicePort::new(dev),
            // Spawn a no-op in place of the vendor runtime; it accepts and
            // ignores the fixed argument list.
            runtime: PathBuf::from("/bin/true"),
            capture_exe: dir.join("VSCapture.exe"),
            sample_interval_secs: 5,
            stale_after: STALE_AFTER,
            monitor_log: dir.join("log-monitor.txt"),
        }
    }

    #[test]
    fn start_fails_without_device() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.port = DevicePort::new(dir.path().join("no-such-port"));
        let mut sup = ProcessSupervisor::new(config, test_clock());
        assert!(matches!(
            sup.start(),
            Err(CaptureError::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn start_transitions_to_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut sup = ProcessSupervisor::new(test_config(dir.path()), test_clock());
        sup.start().unwrap();
        assert_eq!(sup.state(), CaptureState::Running);
    }

    #[test]
    fn missing_artifact_is_missing_not_stale() {
        let dir = tempfile::tempdir().unwrap();
        let sup = ProcessSupervisor::new(test_config(dir.path()), test_clock());
        assert_eq!(
            sup.check_liveness(&dir.path().join(EXPORT_CSV)),
            Liveness::Missing
        );
    }

    #[test]
    fn fresh_artifact_within_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join(EXPORT_CSV);
        std::fs::write(&artifact, b"header\n").unwrap();
        let sup = ProcessSupervisor::new(test_config(dir.path()), test_clock());
        assert_eq!(sup.check_liveness(&artifact), Liveness::Fresh);
    }

    #[test]
    fn artifact_goes_stale_after_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join(EXPORT_CSV);
        std::fs::write(&artifact, b"header\n").unwrap();
        let clock = Arc::new(TestClock::new());
        let sup = ProcessSupervisor::new(test_config(dir.path()), clock.clone());
        clock.advance(Duration::from_secs(25));
        assert!(matches!(
            sup.check_liveness(&artifact),
            Liveness::Stale { age } if age >= STALE_AFTER
        ));
    }

    #[test]
    fn restart_replaces_handle_through_dead_and_starting() {
        let dir = tempfile::tempdir().unwrap();
        let mut sup = ProcessSupervisor::new(test_config(dir.path()), test_clock());
        sup.start().unwrap();
        let states = sup.state.subscribe();
        let _ = states.try_iter().count();
        sup.restart().unwrap();
        let seen: Vec<_> = states.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                CaptureState::Dead,
                CaptureState::Starting,
                CaptureState::Running
            ]
        );
    }

    #[test]
    fn restart_without_device_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let dev = config.port.path().to_path_buf();
        let mut sup = ProcessSupervisor::new(config, test_clock());
        sup.start().unwrap();
        std::fs::remove_file(&dev).unwrap();
        assert!(matches!(
            sup.restart(),
            Err(CaptureError::DeviceDisconnected { .. })
        ));
        assert!(matches!(sup.state(), CaptureState::Fatal { .. }));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut sup = ProcessSupervisor::new(test_config(dir.path()), test_clock());
        sup.start().unwrap();
        sup.shutdown();
        sup.shutdown();
    }

    #[test]
    fn clear_stale_exports_removes_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(EXPORT_CSV), b"old").unwrap();
        let sup = ProcessSupervisor::new(test_config(dir.path()), test_clock());
        sup.clear_stale_exports(dir.path());
        assert!(!dir.path().join(EXPORT_CSV).exists());
        // And again with nothing to remove.
        sup.clear_stale_exports(dir.path());
    }
}
