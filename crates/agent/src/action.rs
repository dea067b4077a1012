//! Closed action set and its validation
//!
//! The decision service produces a loose [`ActionStep`]. Before anything
//! runs it is converted into a typed [`Action`]; an unknown name or a bad
//! detail field becomes an [`ActionError`], which the executor reports back
//! as an error envelope.

use serde_json::{json, Map, Value};
use thiserror::Error;

use autoops_history::ActionStep;

/// Wire names of every supported action
pub const ACTION_NAMES: &[&str] = &[
    "update_system",
    "install_package",
    "create_user",
    "configure_file",
    "read_file",
    "get_system_stats",
    "browse_web",
    "search_web",
    "enable_service",
    "open_port",
    "run_cmd",
    "create_script",
    "execute_script",
    "spawn_agent",
    "finish",
];

pub const FINISH: &str = "finish";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    UpdateSystem,
    InstallPackage { packages: Vec<String> },
    CreateUser { user: String, home: String },
    ConfigureFile { path: String, content: String },
    ReadFile { path: String },
    GetSystemStats,
    BrowseWeb { url: String },
    SearchWeb {
        query: String,
        topic: Option<String>,
        sub_topic: Option<String>,
    },
    EnableService { service: String },
    OpenPort { port: u16 },
    RunCmd { cmd: String },
    CreateScript {
        filename: Option<String>,
        content: String,
    },
    ExecuteScript { filename: String },
    SpawnAgent {
        goal: String,
        history_id: Option<String>,
    },
    Finish { summary: Option<String> },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("Unknown action: {0}")]
    Unknown(String),

    #[error("Action '{action}' requires field '{field}'")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    #[error("Action '{action}' has invalid field '{field}': {reason}")]
    InvalidField {
        action: &'static str,
        field: &'static str,
        reason: String,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::UpdateSystem => "update_system",
            Action::InstallPackage { .. } => "install_package",
            Action::CreateUser { .. } => "create_user",
            Action::ConfigureFile { .. } => "configure_file",
            Action::ReadFile { .. } => "read_file",
            Action::GetSystemStats => "get_system_stats",
            Action::BrowseWeb { .. } => "browse_web",
            Action::SearchWeb { .. } => "search_web",
            Action::EnableService { .. } => "enable_service",
            Action::OpenPort { .. } => "open_port",
            Action::RunCmd { .. } => "run_cmd",
            Action::CreateScript { .. } => "create_script",
            Action::ExecuteScript { .. } => "execute_script",
            Action::SpawnAgent { .. } => "spawn_agent",
            Action::Finish { .. } => FINISH,
        }
    }
}

/// Whether a step ends the run
pub fn is_terminal(step: &ActionStep) -> bool {
    step.action == FINISH
}

struct Details<'a> {
    action: &'static str,
    map: &'a Map<String, Value>,
}

impl<'a> Details<'a> {
    fn optional(&self, field: &'static str) -> Result<Option<&'a str>, ActionError> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ActionError::InvalidField {
                action: self.action,
                field,
                reason: format!("expected a string, got {}", other),
            }),
        }
    }

    /// Present, a string, and not blank
    fn required(&self, field: &'static str) -> Result<String, ActionError> {
        match self.optional(field)? {
            Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
            _ => Err(ActionError::MissingField {
                action: self.action,
                field,
            }),
        }
    }

    /// Present and a string; may be empty
    fn required_text(&self, field: &'static str) -> Result<String, ActionError> {
        self.optional(field)?
            .map(str::to_string)
            .ok_or(ActionError::MissingField {
                action: self.action,
                field,
            })
    }

    fn optional_nonblank(&self, field: &'static str) -> Result<Option<String>, ActionError> {
        Ok(self
            .optional(field)?
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string))
    }

    /// A value handed to a command as one argument; must not read as an option
    fn argument(&self, field: &'static str) -> Result<String, ActionError> {
        let value = self.required(field)?;
        reject_option_like(self.action, field, &value)?;
        Ok(value)
    }

    fn port(&self, field: &'static str) -> Result<u16, ActionError> {
        let invalid = |reason: String| ActionError::InvalidField {
            action: self.action,
            field,
            reason,
        };
        let port = match self.map.get(field) {
            None | Some(Value::Null) => {
                return Err(ActionError::MissingField {
                    action: self.action,
                    field,
                })
            }
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| invalid(format!("{} is not a port number", n)))?,
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| invalid(format!("'{}' is not a port number", s)))?,
            Some(other) => return Err(invalid(format!("expected a number, got {}", other))),
        };
        match u16::try_from(port) {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(invalid(format!("{} is outside 1-65535", port))),
        }
    }
}

fn reject_option_like(action: &'static str, field: &'static str, value: &str) -> Result<(), ActionError> {
    if value.trim_start().starts_with('-') {
        return Err(ActionError::InvalidField {
            action,
            field,
            reason: format!("'{}' must not start with '-'", value),
        });
    }
    Ok(())
}

impl TryFrom<&ActionStep> for Action {
    type Error = ActionError;

    fn try_from(step: &ActionStep) -> Result<Self, ActionError> {
        let name = ACTION_NAMES
            .iter()
            .copied()
            .find(|name| *name == step.action)
            .ok_or_else(|| ActionError::Unknown(step.action.clone()))?;
        let d = Details {
            action: name,
            map: &step.details,
        };

        let action = match name {
            "update_system" => Action::UpdateSystem,
            "install_package" => {
                let packages: Vec<String> = d
                    .required("pkg")?
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                for pkg in &packages {
                    reject_option_like(name, "pkg", pkg)?;
                }
                Action::InstallPackage { packages }
            }
            "create_user" => Action::CreateUser {
                user: d.argument("user")?,
                home: d.argument("home")?,
            },
            "configure_file" => Action::ConfigureFile {
                path: d.required("path")?,
                content: d.required_text("content")?,
            },
            "read_file" => Action::ReadFile {
                path: d.required("path")?,
            },
            "get_system_stats" => Action::GetSystemStats,
            "browse_web" => Action::BrowseWeb {
                url: d.required("url")?,
            },
            "search_web" => Action::SearchWeb {
                query: d.required("query")?,
                topic: d.optional_nonblank("topic")?,
                sub_topic: d.optional_nonblank("subTopic")?,
            },
            "enable_service" => Action::EnableService {
                service: d.argument("service")?,
            },
            "open_port" => Action::OpenPort { port: d.port("port")? },
            "run_cmd" => Action::RunCmd {
                cmd: d.required("cmd")?,
            },
            "create_script" => Action::CreateScript {
                filename: d.optional_nonblank("filename")?,
                content: d.required_text("content")?,
            },
            "execute_script" => Action::ExecuteScript {
                filename: d.required("filename")?,
            },
            "spawn_agent" => Action::SpawnAgent {
                goal: d.required("goal")?,
                history_id: d.optional_nonblank("historyId")?,
            },
            _ => Action::Finish {
                summary: d.optional_nonblank("summary")?,
            },
        };
        Ok(action)
    }
}

/// Output schema sent to the decision service with every cycle
pub fn action_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ACTION_NAMES
            },
            "details": {
                "type": "object",
                "properties": {
                    "pkg": { "type": "string" },
                    "user": { "type": "string" },
                    "home": { "type": "string" },
                    "path": { "type": "string" },
                    "content": { "type": "string" },
                    "service": { "type": "string" },
                    "port": { "type": ["number", "string"] },
                    "cmd": { "type": "string" },
                    "url": { "type": "string" },
                    "query": { "type": "string" },
                    "topic": { "type": "string" },
                    "subTopic": { "type": "string" },
                    "filename": { "type": "string" },
                    "goal": { "type": "string" },
                    "historyId": { "type": "string" },
                    "summary": { "type": "string" }
                }
            }
        },
        "required": ["action", "details"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(step: ActionStep) -> Result<Action, ActionError> {
        Action::try_from(&step)
    }

    #[test]
    fn test_unknown_action() {
        let err = parse(ActionStep::new("reboot_datacenter")).unwrap_err();
        assert_eq!(err, ActionError::Unknown("reboot_datacenter".to_string()));
        assert_eq!(err.to_string(), "Unknown action: reboot_datacenter");
    }

    #[test]
    fn test_every_name_has_a_variant() {
        for name in ACTION_NAMES {
            let step = ActionStep::new(*name)
                .with_detail("pkg", "curl")
                .with_detail("user", "ops")
                .with_detail("home", "/home/ops")
                .with_detail("path", "/tmp/x")
                .with_detail("content", "")
                .with_detail("service", "nginx")
                .with_detail("port", 80)
                .with_detail("cmd", "true")
                .with_detail("url", "https://example.com")
                .with_detail("query", "q")
                .with_detail("filename", "a.sh")
                .with_detail("goal", "g");
            let action = parse(step).unwrap();
            assert_eq!(action.name(), *name);
        }
    }

    #[test]
    fn test_install_package_splits_names() {
        let action = parse(ActionStep::new("install_package").with_detail("pkg", " ufw  fail2ban ")).unwrap();
        assert_eq!(
            action,
            Action::InstallPackage {
                packages: vec!["ufw".to_string(), "fail2ban".to_string()]
            }
        );
    }

    #[test]
    fn test_option_injection_rejected() {
        let err = parse(ActionStep::new("install_package").with_detail("pkg", "curl -oDebug::pkgProblemResolver=1"))
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidField { field: "pkg", .. }));

        let err = parse(ActionStep::new("enable_service").with_detail("service", "--all")).unwrap_err();
        assert!(matches!(err, ActionError::InvalidField { field: "service", .. }));
    }

    #[test]
    fn test_missing_field() {
        let err = parse(ActionStep::new("read_file")).unwrap_err();
        assert_eq!(
            err,
            ActionError::MissingField {
                action: "read_file",
                field: "path"
            }
        );
        assert_eq!(err.to_string(), "Action 'read_file' requires field 'path'");

        let err = parse(ActionStep::new("run_cmd").with_detail("cmd", "   ")).unwrap_err();
        assert!(matches!(err, ActionError::MissingField { field: "cmd", .. }));
    }

    #[test]
    fn test_mistyped_field() {
        let err = parse(ActionStep::new("read_file").with_detail("path", 7)).unwrap_err();
        assert!(matches!(err, ActionError::InvalidField { field: "path", .. }));
    }

    #[test]
    fn test_port_number_or_string() {
        assert_eq!(
            parse(ActionStep::new("open_port").with_detail("port", 22)).unwrap(),
            Action::OpenPort { port: 22 }
        );
        assert_eq!(
            parse(ActionStep::new("open_port").with_detail("port", "443")).unwrap(),
            Action::OpenPort { port: 443 }
        );
        for bad in [json!(0), json!(70000), json!("ssh"), json!(-1), json!(2.5)] {
            let step = ActionStep::new("open_port").with_detail("port", bad);
            assert!(matches!(parse(step), Err(ActionError::InvalidField { .. })));
        }
    }

    #[test]
    fn test_create_script_content_may_be_empty() {
        let action = parse(ActionStep::new("create_script").with_detail("content", "")).unwrap();
        assert_eq!(
            action,
            Action::CreateScript {
                filename: None,
                content: String::new()
            }
        );
    }

    #[test]
    fn test_search_optional_fields() {
        let action = parse(
            ActionStep::new("search_web")
                .with_detail("query", "harden sshd")
                .with_detail("subTopic", "ciphers")
                .with_detail("topic", Value::Null),
        )
        .unwrap();
        assert_eq!(
            action,
            Action::SearchWeb {
                query: "harden sshd".to_string(),
                topic: None,
                sub_topic: Some("ciphers".to_string()),
            }
        );
    }

    #[test]
    fn test_finish_is_terminal() {
        let step = ActionStep::new("finish");
        assert!(is_terminal(&step));
        assert_eq!(parse(step).unwrap().name(), FINISH);
        assert!(!is_terminal(&ActionStep::new("update_system")));
    }

    #[test]
    fn test_schema_lists_every_action() {
        let schema = action_schema();
        let names = schema["properties"]["action"]["enum"].as_array().unwrap();
        assert_eq!(names.len(), ACTION_NAMES.len());
        assert_eq!(schema["required"], json!(["action", "details"]));
    }
}
