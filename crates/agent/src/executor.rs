//! Action executor
//!
//! Turns one decided step into its real-world effect and reports the outcome
//! as a [`ResultEnvelope`]. Every failure, including an unknown action or a
//! refused security check, comes back as an error envelope; nothing here
//! panics or returns `Err` to the runner.

use std::sync::Arc;

use autoops_config::Settings;
use autoops_history::{ActionStep, ResultEnvelope};
use autoops_provider::DecisionService;
use tracing::{debug, warn};

use crate::action::Action;
use crate::relevance::{RelevanceFilter, ScoredResult};
use crate::search::{SearchProvider, WebSearch};
use crate::tools::spawn::{Spawner, SubAgentSpec};
use crate::tools::{filesystem, shell, web, Sandbox, WebFetcher};

pub struct ActionExecutor {
    settings: Arc<Settings>,
    sandbox: Sandbox,
    fetcher: WebFetcher,
    search: WebSearch,
    relevance: RelevanceFilter,
    spawner: Arc<dyn Spawner>,
}

impl ActionExecutor {
    pub fn new(
        settings: Arc<Settings>,
        decision: Arc<dyn DecisionService>,
        search: Arc<dyn SearchProvider>,
        spawner: Arc<dyn Spawner>,
    ) -> Self {
        let sandbox = Sandbox::new(&settings.sandbox_root, &settings.script_interpreter)
            .with_timeout(settings.command_timeout);
        let fetcher = WebFetcher::new(settings.fetch_timeout, settings.fetch_max_chars);
        Self {
            sandbox,
            fetcher,
            search: WebSearch::new(search),
            relevance: RelevanceFilter::new(decision),
            spawner,
            settings,
        }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub async fn execute(&self, step: &ActionStep) -> ResultEnvelope {
        match Action::try_from(step) {
            Ok(action) => self.dispatch(action).await,
            Err(e) => {
                warn!("◆ rejected step '{}': {}", step.action, e);
                ResultEnvelope::error(e.to_string())
            }
        }
    }

    async fn dispatch(&self, action: Action) -> ResultEnvelope {
        debug!("◆ dispatching {}", action.name());
        let elevation = &self.settings.elevation;
        let timeout = self.settings.command_timeout;

        match action {
            Action::UpdateSystem => {
                shell::run_sequence(&shell::update_system_argvs(elevation), timeout).await
            }
            Action::InstallPackage { packages } => {
                shell::run_to_envelope(
                    &shell::install_package_argv(elevation, &packages),
                    None,
                    timeout,
                )
                .await
            }
            Action::CreateUser { user, home } => {
                shell::run_to_envelope(
                    &shell::create_user_argv(elevation, &user, &home),
                    None,
                    timeout,
                )
                .await
            }
            Action::EnableService { service } => {
                shell::run_to_envelope(
                    &shell::enable_service_argv(elevation, &service),
                    None,
                    timeout,
                )
                .await
            }
            Action::OpenPort { port } => {
                shell::run_to_envelope(&shell::open_port_argv(elevation, port), None, timeout)
                    .await
            }
            Action::RunCmd { cmd } => {
                shell::run_to_envelope(&shell::shell_argv(&cmd), None, timeout).await
            }
            Action::GetSystemStats => shell::system_stats(timeout).await,
            Action::ConfigureFile { path, content } => {
                filesystem::configure_file(&path, &content).await
            }
            Action::ReadFile { path } => filesystem::read_file(&path).await,
            Action::BrowseWeb { url } => self.fetcher.browse(&url).await,
            Action::SearchWeb {
                query,
                topic,
                sub_topic,
            } => self.search_web(&query, topic, sub_topic).await,
            Action::CreateScript { filename, content } => {
                self.sandbox
                    .create_script(filename.as_deref(), &content)
                    .await
            }
            Action::ExecuteScript { filename } => self.sandbox.execute_script(&filename).await,
            Action::SpawnAgent { goal, history_id } => self.spawn_agent(goal, history_id),
            Action::Finish { summary } => {
                let envelope = ResultEnvelope::success().with("message", "Goal complete");
                match summary {
                    Some(summary) => envelope.with("summary", summary),
                    None => envelope,
                }
            }
        }
    }

    /// Raw results, ranked when possible.
    ///
    /// Falls back to unranked provider order with a note, and to a plain
    /// "no results" message when the provider has nothing.
    async fn search_web(
        &self,
        query: &str,
        topic: Option<String>,
        sub_topic: Option<String>,
    ) -> ResultEnvelope {
        let max_results = self.settings.search_max_results;
        let raw = self.search.search(query, max_results).await;
        if raw.is_empty() {
            return ResultEnvelope::success()
                .with("message", format!("No search results found for '{}'", query))
                .with("content", "");
        }

        let topic = topic.unwrap_or_else(|| query.to_string());
        let sub_topic = sub_topic.unwrap_or_else(|| topic.clone());
        let ranked = self
            .relevance
            .filter_by_relevance(&topic, &sub_topic, &raw, max_results)
            .await;

        let ranked_any = ranked.iter().any(|r| r.relevance_score.is_some());
        if ranked.is_empty() || !ranked_any {
            let unranked: Vec<ScoredResult> =
                raw.iter().take(max_results).map(ScoredResult::from).collect();
            return ResultEnvelope::success()
                .with("content", web::format_results(&unranked))
                .with(
                    "note",
                    "Relevance ranking was unavailable; results are in search provider order.",
                );
        }

        ResultEnvelope::success().with("content", web::format_results(&ranked))
    }

    fn spawn_agent(&self, goal: String, history_id: Option<String>) -> ResultEnvelope {
        if goal.trim() == self.settings.goal.trim() {
            warn!("◆ refused to spawn an agent with this agent's own goal");
            return ResultEnvelope::error(
                "Security violation: refusing to spawn an agent with the same goal as this agent",
            );
        }

        let mut spec = SubAgentSpec::new(goal.trim());
        if let Some(id) = history_id {
            spec.history_id = id;
        }
        if spec.history_id == self.settings.history_id {
            return ResultEnvelope::error(format!(
                "Sub-agent history id '{}' is this agent's own history id",
                spec.history_id
            ));
        }

        match self.spawner.spawn(&spec) {
            Ok(pid) => ResultEnvelope::success()
                .with(
                    "message",
                    format!("Spawned agent with history id {}", spec.history_id),
                )
                .with("historyId", spec.history_id)
                .with("pid", pid),
            Err(e) => ResultEnvelope::error(format!("Failed to spawn agent: {}", e)),
        }
    }
}
