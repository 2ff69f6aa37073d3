pub mod convert;
pub mod recorder;

pub use recorder::{SessionDir, CHANNELS, MONITOR_LOG};
