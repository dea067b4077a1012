//! Goal runner: the decide, execute, persist loop

use std::sync::Arc;
use std::time::Duration;

use autoops_config::{DecisionPolicy, Settings};
use autoops_history::{ActionStep, History, HistoryStore};
use autoops_provider::{DecisionService, ProviderError, StructuredRequest};
use tracing::{debug, info, warn};

use crate::action::{self, action_schema};
use crate::executor::ActionExecutor;
use crate::prompts::{decision_context, PromptStrategy};
use crate::stop::StopSignal;
use crate::Result;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The stop signal was consumed
    Stopped,
    /// The agent chose `finish`
    Finished,
}

/// Owns the goal and history of one agent for the life of the process
pub struct GoalRunner {
    settings: Arc<Settings>,
    decision: Arc<dyn DecisionService>,
    executor: ActionExecutor,
    store: HistoryStore,
    stop: StopSignal,
    history: History,
}

impl GoalRunner {
    /// Build a runner, resuming any stored history for the configured id
    pub async fn new(
        settings: Arc<Settings>,
        decision: Arc<dyn DecisionService>,
        executor: ActionExecutor,
    ) -> Result<Self> {
        let store = HistoryStore::new(&settings.history_dir);
        let history = store.load(&settings.history_id).await?;
        if !history.is_empty() {
            info!(
                "◆ resuming history '{}' with {} entries",
                settings.history_id,
                history.len()
            );
        }

        Ok(Self {
            stop: StopSignal::new(&settings.stop_signal),
            settings,
            decision,
            executor,
            store,
            history,
        })
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Loop until `finish` or the stop signal.
    ///
    /// Only decision failures end the run with an error; failed actions are
    /// fed back as context.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        info!("◆ starting agent with goal: \"{}\"", self.settings.goal);

        loop {
            match self.stop.poll_and_consume().await {
                Ok(true) => {
                    info!("◆ stop signal received, shutting down");
                    return Ok(RunOutcome::Stopped);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("◆ could not remove stop signal: {}", e);
                    return Ok(RunOutcome::Stopped);
                }
            }

            if let Some(outcome) = self.cycle().await? {
                return Ok(outcome);
            }

            if !self.settings.cycle_delay.is_zero() {
                tokio::time::sleep(self.settings.cycle_delay).await;
            }
        }
    }

    async fn cycle(&mut self) -> Result<Option<RunOutcome>> {
        let strategy = PromptStrategy::choose(
            self.history.consecutive_failures(),
            self.settings.escalate_after,
        );
        debug!("◆ prompt strategy: {}", strategy.name());

        let step = self.decide(strategy).await?;
        info!("→ next action:\n{}", pretty(&step));

        self.history.record_decision(step.clone());
        let result = self.executor.execute(&step).await;
        info!("← result:\n{}", pretty(&result));
        self.history.record_result(result)?;

        if let Err(e) = self
            .store
            .save(&self.settings.history_id, &self.history)
            .await
        {
            warn!("◆ failed to persist history: {}", e);
        }

        if action::is_terminal(&step) {
            info!("◆ goal finished");
            return Ok(Some(RunOutcome::Finished));
        }
        Ok(None)
    }

    /// Ask for the next step, applying the configured retry policy
    async fn decide(&self, strategy: PromptStrategy) -> Result<ActionStep> {
        let request = StructuredRequest::new(
            strategy.instruction(),
            decision_context(&self.settings.goal, &self.history),
            action_schema(),
        );

        let (max_attempts, backoff_ms) = match self.settings.decision_policy {
            DecisionPolicy::FailFast => (1, 0),
            DecisionPolicy::Retry {
                max_attempts,
                backoff_ms,
            } => (max_attempts.max(1), backoff_ms),
        };

        let mut attempt = 1;
        loop {
            let outcome = self
                .decision
                .generate(request.clone())
                .await
                .and_then(|value| {
                    ActionStep::from_value(value).map_err(|e| {
                        ProviderError::ModelOutput(format!("decision is not an action step: {}", e))
                    })
                });

            match outcome {
                Ok(step) => return Ok(step),
                Err(e) if attempt < max_attempts => {
                    let delay = Duration::from_millis(backoff_ms.saturating_mul(attempt as u64));
                    warn!(
                        "◆ decision attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "<unserializable>".to_string())
}
