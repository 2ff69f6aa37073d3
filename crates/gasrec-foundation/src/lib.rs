pub mod clock;
pub mod error;
pub mod sample;
pub mod shutdown;
pub mod state;

pub use clock::*;
pub use error::*;
pub use sample::*;
pub use shutdown::*;
pub use state::*;
