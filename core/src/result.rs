use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Phase {
    Prepare,
    Main,
    PostSuccess,
    Teardown,
}

impl Phase {
    pub fn label_prefix(&self) -> &'static str {
        match self {
            Phase::Prepare => "PRE-STEP",
            Phase::Main => "STEP",
            Phase::PostSuccess => "POST-STEP",
            Phase::Teardown => "TEARDOWN",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Prepare => "prepare",
            Phase::Main => "main",
            Phase::PostSuccess => "post_success",
            Phase::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepStatus {
    Pass,
    Fail,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pass => "PASS",
            StepStatus::Fail => "FAIL",
            StepStatus::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub label: String,
    pub name: String,
    pub phase: Phase,
    pub status: StepStatus,
    pub negative: bool,
    pub error: Option<ErrorInfo>,
    pub duration_ms: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub children: Vec<StepResult>,
}

impl StepResult {
    pub fn passed(label: String, name: String, phase: Phase) -> Self {
        Self {
            label,
            name,
            phase,
            status: StepStatus::Pass,
            negative: false,
            error: None,
            duration_ms: 0.0,
            metadata: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn failed(label: String, name: String, phase: Phase, error: ErrorInfo) -> Self {
        Self {
            label,
            name,
            phase,
            status: StepStatus::Fail,
            negative: false,
            error: Some(error),
            duration_ms: 0.0,
            metadata: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn skipped(label: String, name: String, phase: Phase) -> Self {
        Self {
            label,
            name,
            phase,
            status: StepStatus::Skipped,
            negative: false,
            error: None,
            duration_ms: 0.0,
            metadata: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Leaves of this subtree in document order, including self when childless.
    pub fn leaves(&self) -> Vec<&StepResult> {
        if self.children.is_empty() {
            return vec![self];
        }
        let mut out = Vec::new();
        for child in &self.children {
            out.extend(child.leaves());
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub status: StepStatus,
    pub error: Option<ErrorInfo>,
    pub steps: Vec<StepResult>,
}

impl PhaseOutcome {
    pub fn skipped(phase: Phase) -> Self {
        Self {
            phase,
            status: StepStatus::Skipped,
            error: None,
            steps: Vec::new(),
        }
    }

    pub fn from_steps(phase: Phase, steps: Vec<StepResult>) -> Self {
        let status = if steps.iter().any(|s| s.status == StepStatus::Fail) {
            StepStatus::Fail
        } else {
            StepStatus::Pass
        };
        Self {
            phase,
            status,
            error: None,
            steps,
        }
    }

    pub fn aborted(phase: Phase, error: ErrorInfo, steps: Vec<StepResult>) -> Self {
        Self {
            phase,
            status: StepStatus::Fail,
            error: Some(error),
            steps,
        }
    }

    pub fn executed(&self) -> bool {
        self.status != StepStatus::Skipped || !self.steps.is_empty()
    }
}

/// A failing teardown leaves the bench in an unknown state, so it flips
/// the exit code like any other executed phase.
pub const TEARDOWN_FAILURE_FAILS_RUN: bool = true;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRunResult {
    pub test_name: String,
    pub started_at: String,
    pub duration_ms: f64,
    pub phases: Vec<PhaseOutcome>,
    pub overall_status: StepStatus,
    pub exit_code: i32,
}

impl TestRunResult {
    pub fn from_phases(
        test_name: String,
        started_at: String,
        duration_ms: f64,
        phases: Vec<PhaseOutcome>,
    ) -> Self {
        let executed_failed = phases.iter().any(|outcome| {
            outcome.status == StepStatus::Fail
                && (TEARDOWN_FAILURE_FAILS_RUN || outcome.phase != Phase::Teardown)
        });
        let overall_status = if executed_failed {
            StepStatus::Fail
        } else {
            StepStatus::Pass
        };
        let exit_code = if executed_failed { 1 } else { 0 };
        Self {
            test_name,
            started_at,
            duration_ms,
            phases,
            overall_status,
            exit_code,
        }
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases.iter().find(|outcome| outcome.phase == phase)
    }

    pub fn has_failures(&self) -> bool {
        self.overall_status == StepStatus::Fail
    }
}

impl fmt::Display for TestRunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} ({:.0} ms)",
            self.test_name, self.overall_status, self.duration_ms
        )?;
        for outcome in &self.phases {
            writeln!(f, "  [{}] {}", outcome.status, outcome.phase)?;
            if let Some(error) = &outcome.error {
                writeln!(f, "      {error}")?;
            }
            for step in &outcome.steps {
                write_step(f, step, 2)?;
            }
        }
        Ok(())
    }
}

fn write_step(f: &mut fmt::Formatter<'_>, step: &StepResult, depth: usize) -> fmt::Result {
    writeln!(
        f,
        "{:indent$}- [{}] {} {}",
        "",
        step.status,
        step.label,
        step.name,
        indent = depth * 2
    )?;
    if let Some(error) = &step.error {
        writeln!(f, "{:indent$}  {error}", "", indent = depth * 2)?;
    }
    for child in &step.children {
        write_step(f, child, depth + 1)?;
    }
    Ok(())
}
