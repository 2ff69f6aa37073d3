pub mod artifact;
pub mod device;
pub mod supervisor;

pub use artifact::read_latest_sample;
pub use device::DevicePort;
pub use supervisor::{ProcessSupervisor, SupervisorConfig};
