//! Workflow bodies (§4.1): each function composes activities from [`crate::activities`]
//! into the exact step sequence, retry budget, and timeout named by the spec, and returns
//! a `BoxedTask<ActivityCtx, ()>` ready to hand to `mlg_workflow::WorkflowEngine::start`.

pub mod create_service;
pub mod custom_domain;
pub mod delete_service;
pub mod ids;
pub mod redeploy_service;
mod shared;

pub use create_service::{create_service_workflow, CreateServiceInput};
pub use custom_domain::{
    attach_custom_domain_workflow, detach_custom_domain_workflow, AttachCustomDomainInput, DetachCustomDomainInput,
};
pub use delete_service::{delete_service_workflow, DeleteServiceInput};
pub use ids::{create_service_workflow_id, delete_service_workflow_id, redeploy_workflow_id};
pub use redeploy_service::{redeploy_service_workflow, RedeployServiceInput};
