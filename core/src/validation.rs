use crate::step::{ParallelGroup, SequentialGroup, StepNode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub location: Option<String>,
    pub message: String,
}

impl Diagnostic {
    fn error(location: Option<String>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            location,
            message: message.into(),
        }
    }

    fn warning(location: Option<String>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            location,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.level, DiagnosticLevel::Error)
    }
}

/// Checks a phase's step tree before execution. Errors abort the phase,
/// warnings are only logged.
pub fn validate_steps(steps: &[StepNode]) -> Vec<Diagnostic> {
    let mut ctx = ValidationContext::new();
    validate_nodes(steps, &mut ctx);
    ctx.finish()
}

struct ValidationContext {
    stack: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl ValidationContext {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn push(&mut self, label: String) {
        self.stack.push(label);
    }

    fn pop(&mut self) {
        self.stack.pop();
    }

    fn location(&self) -> Option<String> {
        if self.stack.is_empty() {
            None
        } else {
            Some(self.stack.join(" > "))
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        let diag = Diagnostic::error(self.location(), message);
        self.diagnostics.push(diag);
    }

    fn warning(&mut self, message: impl Into<String>) {
        let diag = Diagnostic::warning(self.location(), message);
        self.diagnostics.push(diag);
    }

    fn finish(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

fn validate_nodes(steps: &[StepNode], ctx: &mut ValidationContext) {
    for step in steps {
        match step {
            StepNode::Leaf(action) => {
                if action.name.trim().is_empty() {
                    ctx.warning("action has an empty name");
                }
            }
            StepNode::Sequential(group) => {
                ctx.push(format!("sequential {}", group.name));
                validate_sequential(group, ctx);
                ctx.pop();
            }
            StepNode::Parallel(group) => {
                ctx.push(format!("parallel {}", group.name));
                validate_parallel(group, ctx);
                ctx.pop();
            }
        }
    }
}

fn validate_sequential(group: &SequentialGroup, ctx: &mut ValidationContext) {
    if group.name.trim().is_empty() {
        ctx.warning("group has an empty name");
    }
    if group.children.is_empty() {
        ctx.warning("group has no children; it will pass without doing anything");
    }
    validate_nodes(&group.children, ctx);
}

fn validate_parallel(group: &ParallelGroup, ctx: &mut ValidationContext) {
    if group.name.trim().is_empty() {
        ctx.warning("group has an empty name");
    }
    if group.children.is_empty() {
        ctx.warning("group has no children; it will pass without doing anything");
    }
    if let Some(index) = group.first_index {
        if index >= group.children.len() {
            ctx.error(format!(
                "first child index {} is out of range for {} child(ren)",
                index,
                group.children.len()
            ));
        }
    } else if group.stagger != crate::step::DEFAULT_STAGGER && group.stagger != Duration::ZERO {
        ctx.warning("stagger is configured but no first child is designated; all children start together");
    }
    validate_nodes(&group.children, ctx);
}
