use std::path::{Path, PathBuf};

/// The serial interface the monitor hardware is expected on.
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Presence probe for the monitor's serial interface. Pure query, consulted
/// before every start or restart of the capture process.
#[derive(Debug, Clone)]
pub struct DevicePort {
    path: PathBuf,
}

impl Default for DevicePort {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

impl DevicePort {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_present(&self) -> bool {
        self.path.exists()
    }
}
