use crate::runner::FrameworkError;
use crate::step::StepNode;
use std::collections::BTreeMap;

/// A test case contributes one list of steps per lifecycle phase. Only
/// the main phase is mandatory; the other phases default to no steps.
pub trait TestCase: Send {
    fn prepare(&mut self) -> Result<Vec<StepNode>, FrameworkError> {
        Ok(Vec::new())
    }

    fn main(&mut self) -> Result<Vec<StepNode>, FrameworkError>;

    fn post(&mut self) -> Result<Vec<StepNode>, FrameworkError> {
        Ok(Vec::new())
    }

    fn teardown(&mut self) -> Result<Vec<StepNode>, FrameworkError> {
        Ok(Vec::new())
    }
}

pub type TestCaseFactory = fn() -> Box<dyn TestCase>;

/// Explicit name-to-factory registry. Hosts register every case up front;
/// there is no directory scanning or import-time discovery.
#[derive(Default)]
pub struct TestRegistry {
    entries: BTreeMap<String, TestCaseFactory>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: TestCaseFactory) {
        self.entries.insert(name.into(), factory);
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn TestCase>> {
        self.entries.get(name).map(|factory| factory())
    }
}
