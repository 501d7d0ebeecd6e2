//! Durable-workflow steps (§4.1). Each `Task<ActivityCtx>` impl here is one named activity;
//! the `workflows` module composes them into the five workflow bodies.

pub mod build;
pub mod build_context;
pub mod custom_domain;
pub mod deploy;
pub mod image;
pub mod service_record;
pub mod source;
pub mod teardown;

pub use build::BuildImage;
pub use build_context::ResolveBuildContext;
pub use custom_domain::{ApplyCustomDomainIngress, CustomDomainStatus, DeleteCustomDomainIngress, UpdateCustomDomainDbStatus};
pub use deploy::{Deploy, WaitForRollout};
pub use image::ImageExists;
pub use service_record::{CreateServiceRecord, MarkServiceBuilding, MarkServiceFailed, MarkServiceRunning, SoftDeleteServiceRow};
pub use source::{CleanupSource, CloneRepository};
pub use teardown::{DeleteDns, DeleteFromOrchestrator};
