pub mod auth;
pub mod deploy;
pub mod http_trigger;
pub mod pktline;
pub mod repo;
pub mod server;

pub use auth::{GitTokenStore, SqliteGitTokenStore};
pub use deploy::RedeployTrigger;
pub use http_trigger::HttpRedeployTrigger;
pub use server::{router, GitServerState};
