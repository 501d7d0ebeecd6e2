pub mod distribution;
pub mod probe;
pub mod tag;

pub use distribution::{ImageRef, Name, Reference};
pub use probe::RegistryClient;
pub use tag::derive_tag;
