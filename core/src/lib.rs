pub mod action;
pub mod logger;
pub mod render;
pub mod report;
pub mod result;
pub mod runner;
pub mod step;
pub mod testcase;
pub mod validation;

pub use action::{Action, ActionError, ActionFn};
pub use logger::{LineSubscriber, RunLogger};
pub use render::{render_html, render_junit, render_summary_table, write_reports};
pub use report::{
    EventLog, Reporter, ResultAggregator, StepEvent, StepEventKind, StepListener,
};
pub use result::{
    ErrorInfo, Phase, PhaseOutcome, StepResult, StepStatus, TestRunResult,
    TEARDOWN_FAILURE_FAILS_RUN,
};
pub use runner::{run_with_reporter, run_with_teardown, FrameworkError, PhaseRunner};
pub use step::{ParallelGroup, SequentialGroup, StepNode, DEFAULT_STAGGER};
pub use testcase::{TestCase, TestCaseFactory, TestRegistry};
pub use validation::{validate_steps, Diagnostic, DiagnosticLevel};
