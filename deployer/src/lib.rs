pub mod activities;
pub mod clients;
pub mod ctx;
pub mod dal;
pub mod facade;
pub mod port;
pub mod workflows;

pub use facade::{CreateAppInput, CreateAppResult, DeleteAppInput, DeploymentFacade};
