pub mod config;
pub mod error;
pub mod models;
pub mod tracing;

pub use config::ControlPlaneConfig;
pub use error::{Error, ErrorKind};
