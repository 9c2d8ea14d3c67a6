use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ActionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::Failed(_) => "failed",
            ActionError::UnexpectedResponse(_) => "unexpected_response",
            ActionError::Timeout(_) => "timeout",
            ActionError::Io(_) => "io",
        }
    }
}

pub type ActionFn = Box<dyn FnOnce() -> Result<(), ActionError> + Send>;

/// A named unit of work against the bench. The closure runs at most once;
/// `FnOnce` makes re-execution unrepresentable.
pub struct Action {
    pub name: String,
    pub(crate) run: ActionFn,
    pub metadata: BTreeMap<String, Value>,
    pub negative: bool,
}

impl Action {
    pub fn new(
        name: impl Into<String>,
        run: impl FnOnce() -> Result<(), ActionError> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run: Box::new(run),
            metadata: BTreeMap::new(),
            negative: false,
        }
    }

    /// Marks the action as a negative test: a raised error counts as pass
    /// and a clean return counts as fail.
    pub fn negative(mut self) -> Self {
        self.negative = true;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn invoke(self) -> Result<(), ActionError> {
        (self.run)()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("negative", &self.negative)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_sets_negative_flag_and_metadata() {
        let action = Action::new("relay_off", || Ok(()))
            .negative()
            .with_metadata("channel", json!(3));
        assert!(action.negative);
        assert_eq!(action.metadata.get("channel"), Some(&json!(3)));
        assert_eq!(action.name, "relay_off");
    }

    #[test]
    fn invoke_runs_the_closure_once() {
        let action = Action::new("ping", || Err(ActionError::Failed("no reply".to_string())));
        let err = action.invoke().unwrap_err();
        assert_eq!(err.kind(), "failed");
        assert_eq!(err.to_string(), "no reply");
    }

    #[test]
    fn error_kinds_are_stable() {
        assert_eq!(
            ActionError::UnexpectedResponse("x".to_string()).kind(),
            "unexpected_response"
        );
        assert_eq!(
            ActionError::Timeout(Duration::from_secs(5)).kind(),
            "timeout"
        );
    }
}
