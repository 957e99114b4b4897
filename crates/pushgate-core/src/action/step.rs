//! One processor's contribution to an action's decision trail

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

/// Record of a single processor execution.
///
/// The error and blocked flags are private: once raised they stay raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Random step id
    pub id: String,
    /// Processor name
    pub step_name: String,
    /// Free-form payload, e.g. diff text or pack metadata
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    blocked: bool,
    #[serde(default)]
    blocked_message: Option<String>,
    /// Human-readable trace lines
    #[serde(default)]
    pub logs: Vec<String>,
}

impl Step {
    /// Start a step for `step_name`
    pub fn new<S: Into<String>>(step_name: S) -> Self {
        Step {
            id: Uuid::new_v4().to_string(),
            step_name: step_name.into(),
            content: Value::Null,
            error: false,
            error_message: None,
            blocked: false,
            blocked_message: None,
            logs: Vec::new(),
        }
    }

    /// Whether the step failed
    pub fn error(&self) -> bool {
        self.error
    }

    /// Failure description
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Whether the step blocked the push
    pub fn blocked(&self) -> bool {
        self.blocked
    }

    /// Block reason shown to the pusher
    pub fn blocked_message(&self) -> Option<&str> {
        self.blocked_message.as_deref()
    }

    /// Append a trace line, prefixed with the step name
    pub fn log<S: AsRef<str>>(&mut self, message: S) {
        let line = format!("{} - {}", self.step_name, message.as_ref());
        info!(target: "pushgate::step", step = %self.step_name, "{}", message.as_ref());
        self.logs.push(line);
    }

    /// Mark the step as failed
    pub fn set_error<S: Into<String>>(&mut self, message: S) {
        let message = message.into();
        error!(target: "pushgate::step", step = %self.step_name, error = %message, "Step failed");
        self.error = true;
        self.error_message = Some(message);
    }

    /// Mark the step as blocking the push
    pub fn block<S: Into<String>>(&mut self, message: S) {
        let message = message.into();
        info!(target: "pushgate::step", step = %self.step_name, "Step blocked push");
        self.blocked = true;
        self.blocked_message = Some(message);
    }

    /// Replace the step payload
    pub fn set_content<V: Into<Value>>(&mut self, content: V) {
        self.content = content.into();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_log_prefixes_step_name() {
        let mut step = Step::new("checkAuthorEmails");
        step.log("all emails legal");
        assert_eq!(step.logs, vec!["checkAuthorEmails - all emails legal"]);
    }

    #[test]
    fn test_flags_stay_raised() {
        let mut step = Step::new("diff");
        step.set_error("fatal: bad revision");
        step.block("blocked");
        step.log("after");

        assert!(step.error());
        assert!(step.blocked());
        assert_eq!(step.error_message(), Some("fatal: bad revision"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut step = Step::new("parsePush");
        step.set_content(serde_json::json!({"entries": 3}));
        let json = serde_json::to_value(&step).unwrap();

        assert_eq!(json["stepName"], "parsePush");
        assert_eq!(json["content"]["entries"], 3);
        assert_eq!(json["blocked"], false);

        let back: Step = serde_json::from_value(json).unwrap();
        assert_eq!(back, step);
    }
}
