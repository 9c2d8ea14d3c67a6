use crate::shell::shell_action;
use benchrun_core::{
    Action, ActionError, FrameworkError, ParallelGroup, SequentialGroup, StepNode, TestCase,
    TestRegistry,
};
use serde_json::json;
use std::time::Duration;

pub fn builtin_cases() -> TestRegistry {
    let mut registry = TestRegistry::new();
    registry.register("tc_selfcheck", || Box::new(SelfCheck));
    registry.register("tc_shell_smoke", || Box::new(ShellSmoke));
    registry
}

/// Exercises the executor itself: sequential and parallel groups, a
/// staggered start and a negative step, without touching any hardware.
struct SelfCheck;

impl TestCase for SelfCheck {
    fn prepare(&mut self) -> Result<Vec<StepNode>, FrameworkError> {
        Ok(vec![Action::new("reserve virtual bench", || Ok(())).into()])
    }

    fn main(&mut self) -> Result<Vec<StepNode>, FrameworkError> {
        Ok(vec![
            SequentialGroup::new("bring up")
                .step(Action::new("power on", || Ok(())))
                .step(Action::new("wait for prompt", || Ok(())))
                .into(),
            ParallelGroup::new("dual traffic")
                .step(Action::new("uplink burst", || {
                    std::thread::sleep(Duration::from_millis(20));
                    Ok(())
                }))
                .step(Action::new("downlink burst", || {
                    std::thread::sleep(Duration::from_millis(20));
                    Ok(())
                }))
                .start_first(0)
                .stagger(Duration::from_millis(50))
                .into(),
            Action::new("query missing endpoint", || {
                Err(ActionError::UnexpectedResponse(
                    "endpoint answered although it is disabled".to_string(),
                ))
            })
            .negative()
            .with_metadata("endpoint", json!("diag/0"))
            .into(),
        ])
    }

    fn post(&mut self) -> Result<Vec<StepNode>, FrameworkError> {
        Ok(vec![Action::new("collect counters", || Ok(())).into()])
    }

    fn teardown(&mut self) -> Result<Vec<StepNode>, FrameworkError> {
        Ok(vec![Action::new("release virtual bench", || Ok(())).into()])
    }
}

/// Minimal end-to-end case built from shell commands.
struct ShellSmoke;

impl TestCase for ShellSmoke {
    fn main(&mut self) -> Result<Vec<StepNode>, FrameworkError> {
        Ok(vec![
            shell_action("report kernel", "uname -s").into(),
            shell_action("touch nothing", "true").into(),
        ])
    }

    fn teardown(&mut self) -> Result<Vec<StepNode>, FrameworkError> {
        Ok(vec![shell_action("sync state", "true").into()])
    }
}
