use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Capture subsystem error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Session subsystem error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No connected device found at {port}")]
    DeviceNotFound { port: PathBuf },

    #[error("Monitor not responding and {port} absent, monitor disconnected?")]
    DeviceDisconnected { port: PathBuf },

    #[error("Failed to spawn capture process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Export artifact unreadable: {0}")]
    ArtifactRead(#[source] std::io::Error),

    #[error("Export artifact has no usable data row")]
    ArtifactParse,

    #[error("Invalid capture state transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Recording directory already exists: {path}")]
    SessionDirectoryExists { path: PathBuf },

    #[error("Failed to create recording directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy artifact {path}: {source}")]
    ArtifactCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move artifact {path}: {source}")]
    ArtifactMove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append to channel log {channel}: {source}")]
    ChannelWrite {
        channel: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Conversion failed for channels: {channels:?}")]
    Conversion { channels: Vec<&'static str> },
}

/// Liveness classification of the vendor export artifact, by mtime age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Artifact updated within the staleness threshold.
    Fresh,
    /// Artifact present but older than the threshold; the capture process
    /// is presumed wedged.
    Stale { age: Duration },
    /// Artifact not written yet. Treated as warm-up, never forces a restart.
    Missing,
}

#[derive(Debug, Clone)]
pub enum RecoveryStrategy {
    /// Kill the capture process and relaunch it.
    Restart,
    /// Log and continue with the sample state we have.
    Ignore,
    /// End the session; raw logs stay on disk for inspection.
    Fatal,
}

impl AppError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            AppError::Capture(CaptureError::DeviceNotFound { .. })
            | AppError::Capture(CaptureError::DeviceDisconnected { .. }) => {
                RecoveryStrategy::Fatal
            }
            AppError::Capture(CaptureError::ArtifactRead(_))
            | AppError::Capture(CaptureError::ArtifactParse) => RecoveryStrategy::Ignore,
            AppError::Session(SessionError::SessionDirectoryExists { .. }) => {
                RecoveryStrategy::Fatal
            }
            AppError::Session(SessionError::ArtifactCopy { .. }) => RecoveryStrategy::Ignore,
            AppError::Fatal(_) | AppError::ShutdownRequested => RecoveryStrategy::Fatal,
            _ => RecoveryStrategy::Restart,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_not_found_is_fatal() {
        let err = AppError::Capture(CaptureError::DeviceNotFound {
            port: PathBuf::from("/dev/ttyUSB0"),
        });
        assert!(matches!(err.recovery_strategy(), RecoveryStrategy::Fatal));
    }

    #[test]
    fn artifact_copy_failure_is_ignored() {
        let err = AppError::Session(SessionError::ArtifactCopy {
            path: PathBuf::from("AS3DataExport.csv"),
            source: std::io::Error::other("locked"),
        });
        assert!(matches!(err.recovery_strategy(), RecoveryStrategy::Ignore));
    }
}
