use crate::logger::RunLogger;
use crate::result::{Phase, PhaseOutcome, StepResult, StepStatus, TestRunResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepEventKind {
    Started,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub kind: StepEventKind,
    pub label: String,
    pub name: String,
    pub phase: Phase,
    pub status: Option<StepStatus>,
    pub negative: bool,
    pub duration_ms: Option<f64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

pub type StepListener = Box<dyn Fn(&StepEvent) + Send>;

/// Fans step events out to the listeners registered at construction time.
/// Emission is serialized under one lock, so every listener sees every
/// event exactly once and in the order it was emitted, including events
/// produced by parallel workers.
pub struct Reporter {
    listeners: Mutex<Vec<StepListener>>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn with_listeners(listeners: Vec<StepListener>) -> Self {
        Self {
            listeners: Mutex::new(listeners),
        }
    }

    pub fn add_listener(&self, listener: StepListener) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    // A listener that panicked mid-emission poisons the lock; later
    // events must still reach every listener, so the guard is recovered.
    pub fn emit(&self, event: &StepEvent) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(event);
        }
    }
}

/// Listener that records every event, mostly for assertions and exports.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<StepEvent>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn listener(self: &Arc<Self>) -> StepListener {
        let log = Arc::clone(self);
        Box::new(move |event: &StepEvent| {
            log.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        })
    }

    pub fn snapshot(&self) -> Vec<StepEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Accumulates phase outcomes while the run is in flight and forwards
/// lifecycle events to the reporter and the logger.
pub struct ResultAggregator {
    reporter: Arc<Reporter>,
    logger: Arc<RunLogger>,
    phases: Mutex<Vec<PhaseOutcome>>,
}

impl ResultAggregator {
    pub fn new(reporter: Arc<Reporter>, logger: Arc<RunLogger>) -> Self {
        Self {
            reporter,
            logger,
            phases: Mutex::new(Vec::new()),
        }
    }

    pub fn reporter(&self) -> &Arc<Reporter> {
        &self.reporter
    }

    pub fn logger(&self) -> &Arc<RunLogger> {
        &self.logger
    }

    pub fn step_started(
        &self,
        label: &str,
        name: &str,
        phase: Phase,
        negative: bool,
        metadata: &BTreeMap<String, Value>,
    ) {
        self.logger.step_start(label, name, negative);
        self.reporter.emit(&StepEvent {
            kind: StepEventKind::Started,
            label: label.to_string(),
            name: name.to_string(),
            phase,
            status: None,
            negative,
            duration_ms: None,
            metadata: metadata.clone(),
        });
    }

    pub fn step_finished(&self, result: &StepResult) {
        match result.status {
            StepStatus::Pass => self.logger.pass(&result.label, &result.name),
            StepStatus::Skipped => self.logger.skip(&result.label, &result.name),
            StepStatus::Fail => {
                let detail = result
                    .error
                    .as_ref()
                    .map(|error| error.to_string())
                    .unwrap_or_else(|| "failed".to_string());
                self.logger.fail(&result.label, &result.name, &detail);
            }
        }
        self.reporter.emit(&StepEvent {
            kind: StepEventKind::Completed,
            label: result.label.clone(),
            name: result.name.clone(),
            phase: result.phase,
            status: Some(result.status),
            negative: result.negative,
            duration_ms: Some(result.duration_ms),
            metadata: result.metadata.clone(),
        });
    }

    pub fn record_phase(&self, outcome: PhaseOutcome) {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome);
    }

    pub fn finish(
        &self,
        test_name: String,
        started_at: String,
        duration_ms: f64,
    ) -> TestRunResult {
        let phases = self
            .phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        TestRunResult::from_phases(test_name, started_at, duration_ms, phases)
    }
}
