//! Effect handlers behind the action executor

pub mod filesystem;
pub mod sandbox;
pub mod shell;
pub mod spawn;
pub mod web;

pub use sandbox::{Sandbox, SandboxError};
pub use shell::{CommandError, CommandOutput};
pub use spawn::{ProcessSpawner, Spawner, SubAgentSpec};
pub use web::WebFetcher;
