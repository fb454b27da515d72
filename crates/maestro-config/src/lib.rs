//! System configuration, deployment-parameter defaults, and user-data
//! assembly for the Maestro deployment orchestrator.

pub mod defaults;
pub mod error;
pub mod system;
pub mod userdata;

pub use error::{ConfigError, ConfigResult};
pub use system::SystemConfig;
