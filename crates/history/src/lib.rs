//! Durable decision/result history
//!
//! A [`History`] is the append-only record one agent keeps of what it
//! decided and what happened. It is persisted in full after every cycle and
//! reloaded at startup to resume an interrupted run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod envelope;
pub mod step;
pub mod store;

pub use envelope::ResultEnvelope;
pub use step::ActionStep;
pub use store::HistoryStore;

/// History errors
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no result slot open: the last entry already has a result")]
    NoPendingDecision,
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// One decided action and, once executed, its result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step: ActionStep,
    #[serde(default)]
    pub result: Option<ResultEnvelope>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn failed(&self) -> bool {
        matches!(&self.result, Some(result) if !result.is_success())
    }
}

/// Ordered, append-only sequence of entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decision with an empty result slot
    pub fn record_decision(&mut self, step: ActionStep) {
        self.entries.push(HistoryEntry {
            step,
            result: None,
            recorded_at: Utc::now(),
        });
    }

    /// Fill the result slot of the latest decision
    pub fn record_result(&mut self, result: ResultEnvelope) -> Result<()> {
        match self.entries.last_mut() {
            Some(entry) if entry.result.is_none() => {
                entry.result = Some(result);
                Ok(())
            }
            _ => Err(HistoryError::NoPendingDecision),
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Whether the most recent completed action failed
    pub fn last_failed(&self) -> bool {
        self.consecutive_failures() > 0
    }

    /// Number of failed results at the tail, ignoring a pending decision
    pub fn consecutive_failures(&self) -> u32 {
        self.entries
            .iter()
            .rev()
            .filter(|entry| entry.result.is_some())
            .take_while(|entry| entry.failed())
            .count() as u32
    }
}
