//! Instruction templates for the decision service

use serde_json::json;

use autoops_history::History;

const ROUTINE: &str = r#"Given the goal and history, decide the next single system configuration step.
Before installing a package or configuring a service, first check whether it is already installed or configured. Be methodical.

Your primary tools are 'create_script' and 'execute_script'. If a command inside a script needs root privileges, prefix that command with 'sudo' inside the script content; do not run the whole script with 'sudo bash'.

To write to a system path such as '/etc/' or '/var/', do NOT use 'configure_file'. Use 'create_script' with a command like `echo '...' | sudo tee /path/to/file` instead. 'configure_file' only works for paths the agent user already owns.

'create_script' returns a 'filename' in its result. Your very next action MUST be 'execute_script' with that exact 'filename' in its details.

If you need information, use 'search_web' (give a 'topic' and 'subTopic' for best results) or 'read_file' to inspect local files.
Use 'spawn_agent' only for complex sub-tasks that differ from your own goal. Never spawn an agent with the same goal as your own.
Once you have confirmed that every part of the goal is complete, call 'finish'."#;

const RECOVERY: &str = r#"The previous action failed. You are an expert Ubuntu system administrator.
First try to solve this with your own knowledge: analyze the error in the history and formulate a new command that fixes it. For example, if a package was not found, suggest a common alternative (for 'apache', suggest 'apache2').
Your next action should be a direct attempt to solve the problem. Use 'search_web' only if your own fix fails again."#;

const ESCALATE: &str = r#"Your last attempts at this problem have failed repeatedly. You are an expert Ubuntu system administrator.
Your next action MUST be 'search_web' to find external solutions: set 'query' to the error you are seeing, 'topic' to the software involved and 'subTopic' to the failing operation.
After searching, synthesize the results into a new concrete action."#;

/// Which instruction template a cycle uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStrategy {
    /// The last action succeeded, or nothing has run yet
    Routine,
    /// The last action failed; self-diagnose first
    Recovery,
    /// Repeated failures; research is required
    Escalate,
}

impl PromptStrategy {
    pub fn choose(consecutive_failures: u32, escalate_after: u32) -> Self {
        if consecutive_failures == 0 {
            PromptStrategy::Routine
        } else if consecutive_failures >= escalate_after.max(1) {
            PromptStrategy::Escalate
        } else {
            PromptStrategy::Recovery
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            PromptStrategy::Routine => ROUTINE,
            PromptStrategy::Recovery => RECOVERY,
            PromptStrategy::Escalate => ESCALATE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PromptStrategy::Routine => "routine",
            PromptStrategy::Recovery => "recovery",
            PromptStrategy::Escalate => "escalate",
        }
    }
}

/// Serialized `{goal, history}` sent as decision context
pub fn decision_context(goal: &str, history: &History) -> String {
    json!({ "goal": goal, "history": history }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoops_history::{ActionStep, ResultEnvelope};

    #[test]
    fn test_choose() {
        assert_eq!(PromptStrategy::choose(0, 2), PromptStrategy::Routine);
        assert_eq!(PromptStrategy::choose(1, 2), PromptStrategy::Recovery);
        assert_eq!(PromptStrategy::choose(2, 2), PromptStrategy::Escalate);
        assert_eq!(PromptStrategy::choose(5, 2), PromptStrategy::Escalate);
        assert_eq!(PromptStrategy::choose(1, 0), PromptStrategy::Escalate);
    }

    #[test]
    fn test_instructions_differ() {
        assert!(PromptStrategy::Routine.instruction().contains("'finish'"));
        assert!(PromptStrategy::Recovery.instruction().starts_with("The previous action failed"));
        assert!(PromptStrategy::Escalate.instruction().contains("MUST be 'search_web'"));
    }

    #[test]
    fn test_decision_context() {
        let mut history = History::new();
        history.record_decision(ActionStep::new("get_system_stats"));
        history
            .record_result(ResultEnvelope::success().with("load", "0.01"))
            .unwrap();

        let context: serde_json::Value =
            serde_json::from_str(&decision_context("secure the server", &history)).unwrap();
        assert_eq!(context["goal"], "secure the server");
        assert_eq!(context["history"][0]["step"]["action"], "get_system_stats");
        assert_eq!(context["history"][0]["result"]["status"], "success");
    }
}
