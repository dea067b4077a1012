//! Autonomous operations agent core
//!
//! The [`GoalRunner`] asks a [`DecisionService`] for one action per cycle,
//! hands it to the [`ActionExecutor`] and records the outcome in a durable
//! [`History`] until the goal is finished or a stop signal appears.
//!
//! [`DecisionService`]: autoops_provider::DecisionService
//! [`History`]: autoops_history::History

use thiserror::Error;

pub mod action;
pub mod executor;
pub mod prompts;
pub mod relevance;
pub mod runner;
pub mod search;
pub mod stop;
pub mod tools;

pub use action::{action_schema, Action, ActionError};
pub use autoops_history::{ActionStep, History, HistoryEntry, HistoryStore, ResultEnvelope};
pub use executor::ActionExecutor;
pub use prompts::PromptStrategy;
pub use relevance::{RelevanceFilter, ScoredResult};
pub use runner::{GoalRunner, RunOutcome};
pub use search::{GoogleSearch, SearchError, SearchHit, SearchProvider, WebSearch};
pub use stop::StopSignal;
pub use tools::spawn::{ProcessSpawner, Spawner, SubAgentSpec};

/// Errors that end a run
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("decision service failed: {0}")]
    Decision(#[from] autoops_provider::ProviderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history persistence failed: {0}")]
    Persistence(#[from] autoops_history::HistoryError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
