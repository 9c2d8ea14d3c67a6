use crate::action::Action;
use crate::logger::RunLogger;
use crate::render;
use crate::report::{Reporter, ResultAggregator};
use crate::result::{ErrorInfo, Phase, PhaseOutcome, StepResult, StepStatus, TestRunResult};
use crate::step::{ParallelGroup, SequentialGroup, StepNode};
use crate::testcase::TestCase;
use crate::validation::validate_steps;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error("{0}")]
    Setup(String),
    #[error("invalid step tree: {0}")]
    InvalidStepTree(String),
    #[error("phase panicked: {0}")]
    PhasePanicked(String),
}

/// Drives one test case through the fixed phase lifecycle. Teardown runs
/// exactly once no matter how the earlier phases end.
pub struct PhaseRunner {
    test_name: String,
    aggregator: Arc<ResultAggregator>,
}

impl PhaseRunner {
    pub fn new(test_name: impl Into<String>, aggregator: Arc<ResultAggregator>) -> Self {
        Self {
            test_name: test_name.into(),
            aggregator,
        }
    }

    pub fn run(&self, case: &mut dyn TestCase) -> TestRunResult {
        let started_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());
        let timer = Instant::now();
        self.aggregator.logger().run_start();

        let prepare = self.run_phase(case, Phase::Prepare);
        let prepare_passed = prepare.status == StepStatus::Pass;
        self.aggregator.record_phase(prepare);

        let main = if prepare_passed {
            self.run_phase(case, Phase::Main)
        } else {
            PhaseOutcome::skipped(Phase::Main)
        };
        let main_passed = main.status == StepStatus::Pass;
        self.aggregator.record_phase(main);

        let post = if prepare_passed && main_passed {
            self.run_phase(case, Phase::PostSuccess)
        } else {
            PhaseOutcome::skipped(Phase::PostSuccess)
        };
        self.aggregator.record_phase(post);

        let teardown = self.run_phase(case, Phase::Teardown);
        self.aggregator.record_phase(teardown);

        let duration_ms = timer.elapsed().as_secs_f64() * 1000.0;
        let result = self
            .aggregator
            .finish(self.test_name.clone(), started_at, duration_ms);
        self.aggregator
            .logger()
            .run_end(result.overall_status.as_str());
        result
    }

    fn run_phase(&self, case: &mut dyn TestCase, phase: Phase) -> PhaseOutcome {
        let logger = Arc::clone(self.aggregator.logger());
        let steps = match catch_unwind(AssertUnwindSafe(|| match phase {
            Phase::Prepare => case.prepare(),
            Phase::Main => case.main(),
            Phase::PostSuccess => case.post(),
            Phase::Teardown => case.teardown(),
        })) {
            Ok(Ok(steps)) => steps,
            Ok(Err(err)) => {
                logger.error(&format!("{phase}: failed to build steps: {err}"));
                return PhaseOutcome::aborted(
                    phase,
                    ErrorInfo::new("framework", err.to_string()),
                    Vec::new(),
                );
            }
            Err(panic) => {
                let message = panic_message(panic);
                logger.error(&format!("{phase}: panicked while building steps: {message}"));
                return PhaseOutcome::aborted(phase, ErrorInfo::new("panic", message), Vec::new());
            }
        };

        let diagnostics = validate_steps(&steps);
        let mut errors = Vec::new();
        for diagnostic in &diagnostics {
            let location = diagnostic.location.as_deref().unwrap_or(phase.as_str());
            if diagnostic.is_error() {
                logger.error(&format!("{location}: {}", diagnostic.message));
                errors.push(format!("{location}: {}", diagnostic.message));
            } else {
                logger.warn(&format!("{location}: {}", diagnostic.message));
            }
        }
        if !errors.is_empty() {
            let err = FrameworkError::InvalidStepTree(errors.join("; "));
            return PhaseOutcome::aborted(
                phase,
                ErrorInfo::new("invalid_step_tree", err.to_string()),
                Vec::new(),
            );
        }

        let results = run_nodes(steps, phase, &self.aggregator);
        PhaseOutcome::from_steps(phase, results)
    }
}

/// Runs a phase's top-level nodes with the same fail-fast rule a
/// sequential group applies to its children.
fn run_nodes(steps: Vec<StepNode>, phase: Phase, agg: &ResultAggregator) -> Vec<StepResult> {
    let mut results = Vec::with_capacity(steps.len());
    let mut abort = false;
    for (index, node) in steps.into_iter().enumerate() {
        let label = format!("{} {}", phase.label_prefix(), index + 1);
        if abort {
            results.push(skip_node(node, label, phase, agg));
            continue;
        }
        let result = run_node(node, label, phase, agg);
        if result.status == StepStatus::Fail {
            abort = true;
        }
        results.push(result);
    }
    results
}

fn run_node(node: StepNode, label: String, phase: Phase, agg: &ResultAggregator) -> StepResult {
    match node {
        StepNode::Leaf(action) => run_leaf(action, label, phase, agg),
        StepNode::Sequential(group) => run_sequential(group, label, phase, agg),
        StepNode::Parallel(group) => run_parallel(group, label, phase, agg),
    }
}

fn run_leaf(action: Action, label: String, phase: Phase, agg: &ResultAggregator) -> StepResult {
    let Action {
        name,
        run,
        metadata,
        negative,
    } = action;
    agg.step_started(&label, &name, phase, negative, &metadata);

    let timer = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(run));
    let duration_ms = timer.elapsed().as_secs_f64() * 1000.0;

    let (status, error) = match outcome {
        Ok(Ok(())) => {
            if negative {
                (
                    StepStatus::Fail,
                    Some(ErrorInfo::new(
                        "negative",
                        "operation succeeded but a failure was expected",
                    )),
                )
            } else {
                (StepStatus::Pass, None)
            }
        }
        Ok(Err(err)) => {
            let info = ErrorInfo::new(err.kind(), err.to_string());
            if negative {
                (StepStatus::Pass, Some(info))
            } else {
                (StepStatus::Fail, Some(info))
            }
        }
        Err(panic) => {
            let info = ErrorInfo::new("panic", panic_message(panic));
            if negative {
                (StepStatus::Pass, Some(info))
            } else {
                (StepStatus::Fail, Some(info))
            }
        }
    };

    let result = StepResult {
        label,
        name,
        phase,
        status,
        negative,
        error,
        duration_ms,
        metadata,
        children: Vec::new(),
    };
    agg.step_finished(&result);
    result
}

fn run_sequential(
    group: SequentialGroup,
    label: String,
    phase: Phase,
    agg: &ResultAggregator,
) -> StepResult {
    let SequentialGroup { name, children } = group;
    agg.step_started(&label, &name, phase, false, &BTreeMap::new());

    let timer = Instant::now();
    let mut results = Vec::with_capacity(children.len());
    let mut abort = false;
    for (index, child) in children.into_iter().enumerate() {
        let child_label = format!("{label}.{}", index + 1);
        if abort {
            results.push(skip_node(child, child_label, phase, agg));
            continue;
        }
        let result = run_node(child, child_label, phase, agg);
        if result.status == StepStatus::Fail {
            abort = true;
        }
        results.push(result);
    }

    let status = if abort {
        StepStatus::Fail
    } else {
        StepStatus::Pass
    };
    let result = StepResult {
        label,
        name,
        phase,
        status,
        negative: false,
        error: None,
        duration_ms: timer.elapsed().as_secs_f64() * 1000.0,
        metadata: BTreeMap::new(),
        children: results,
    };
    agg.step_finished(&result);
    result
}

fn run_parallel(
    group: ParallelGroup,
    label: String,
    phase: Phase,
    agg: &ResultAggregator,
) -> StepResult {
    let ParallelGroup {
        name,
        children,
        first_index,
        stagger,
    } = group;
    agg.step_started(&label, &name, phase, false, &BTreeMap::new());

    let timer = Instant::now();
    let first = first_index.filter(|index| *index < children.len());
    let mut slots: Vec<Option<StepResult>> = Vec::new();
    slots.resize_with(children.len(), || None);

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(children.len());
        let mut deferred = Vec::new();

        for (index, child) in children.into_iter().enumerate() {
            let child_label = format!("{label}.{}", index + 1);
            match first {
                Some(first_index) if index != first_index => {
                    deferred.push((index, child_label, child));
                }
                _ => {
                    let child_name = child.name().to_string();
                    let spawned_label = child_label.clone();
                    let handle =
                        scope.spawn(move || run_node(child, spawned_label, phase, agg));
                    handles.push((index, child_label, child_name, handle));
                }
            }
        }

        // The designated first child gets a head start; the rest of the
        // wave is released once the stagger delay has elapsed.
        if first.is_some() && !deferred.is_empty() && !stagger.is_zero() {
            thread::sleep(stagger);
        }

        for (index, child_label, child) in deferred {
            let child_name = child.name().to_string();
            let spawned_label = child_label.clone();
            let handle = scope.spawn(move || run_node(child, spawned_label, phase, agg));
            handles.push((index, child_label, child_name, handle));
        }

        for (index, child_label, child_name, handle) in handles {
            let result = match handle.join() {
                Ok(result) => result,
                Err(panic) => {
                    let failed = StepResult::failed(
                        child_label,
                        child_name,
                        phase,
                        ErrorInfo::new("panic", panic_message(panic)),
                    );
                    agg.step_finished(&failed);
                    failed
                }
            };
            slots[index] = Some(result);
        }
    });

    let results: Vec<StepResult> = slots.into_iter().flatten().collect();
    let status = if results.iter().any(|r| r.status == StepStatus::Fail) {
        StepStatus::Fail
    } else {
        StepStatus::Pass
    };
    let result = StepResult {
        label,
        name,
        phase,
        status,
        negative: false,
        error: None,
        duration_ms: timer.elapsed().as_secs_f64() * 1000.0,
        metadata: BTreeMap::new(),
        children: results,
    };
    agg.step_finished(&result);
    result
}

/// Marks a node the fail-fast rule reached as skipped, recursively. The
/// action is never invoked, so only a completion event is emitted.
fn skip_node(node: StepNode, label: String, phase: Phase, agg: &ResultAggregator) -> StepResult {
    match node {
        StepNode::Leaf(action) => {
            let mut result = StepResult::skipped(label, action.name, phase);
            result.negative = action.negative;
            result.metadata = action.metadata;
            agg.step_finished(&result);
            result
        }
        StepNode::Sequential(group) => skip_group(group.name, group.children, label, phase, agg),
        StepNode::Parallel(group) => skip_group(group.name, group.children, label, phase, agg),
    }
}

fn skip_group(
    name: String,
    children: Vec<StepNode>,
    label: String,
    phase: Phase,
    agg: &ResultAggregator,
) -> StepResult {
    let mut results = Vec::with_capacity(children.len());
    for (index, child) in children.into_iter().enumerate() {
        results.push(skip_node(child, format!("{label}.{}", index + 1), phase, agg));
    }
    let mut result = StepResult::skipped(label, name, phase);
    result.children = results;
    agg.step_finished(&result);
    result
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

/// Runs a case end to end with a caller-supplied reporter, writing the
/// run log and report artifacts under `reports_dir` (default
/// `report_<test_name>`).
pub fn run_with_reporter(
    case: &mut dyn TestCase,
    test_name: &str,
    reports_dir: Option<&Path>,
    reporter: Arc<Reporter>,
) -> TestRunResult {
    let dir: PathBuf = reports_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("report_{test_name}")));
    let logger = Arc::new(RunLogger::with_log_dir(test_name, &dir));
    let aggregator = Arc::new(ResultAggregator::new(reporter, Arc::clone(&logger)));
    let runner = PhaseRunner::new(test_name, aggregator);

    let result = runner.run(case);
    for path in render::write_reports(&result, &dir).values() {
        logger.info(&format!("report written to {}", path.display()));
    }
    logger.close();
    result
}

/// Classic entry point: run every phase, always tear down, report the
/// exit code the process should end with.
pub fn run_with_teardown(
    case: &mut dyn TestCase,
    test_name: &str,
    reports_dir: Option<&Path>,
) -> i32 {
    run_with_reporter(case, test_name, reports_dir, Arc::new(Reporter::new())).exit_code
}
