//! The deployment service facade (§4.4). The facade itself is built in `mlg_deployer`,
//! alongside the workflow definitions and `ActivityCtx` it starts runs against; this
//! module is the seam `spec.md` calls `gateway::service` — webhook handlers and the
//! (out-of-scope) MCP/GraphQL resolvers would all go through this re-export rather than
//! reaching into `mlg_deployer` directly.
pub use mlg_deployer::{CreateAppInput, CreateAppResult, DeleteAppInput, DeploymentFacade as Service};
