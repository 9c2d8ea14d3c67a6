use benchrun_core::{Action, ActionError};
use std::process::Command;

/// Wraps a shell command line as a bench action. The command is
/// tokenized and executed when the step runs; a non-zero exit status
/// fails the step.
pub fn shell_action(name: impl Into<String>, command: impl Into<String>) -> Action {
    let command = command.into();
    Action::new(name, move || {
        let mut parts = shell_words::split(&command)
            .map_err(|err| ActionError::Failed(format!("failed to parse command: {err}")))?;
        if parts.is_empty() {
            return Err(ActionError::Failed(
                "command produced no executable".to_string(),
            ));
        }
        let program = parts.remove(0);
        let output = Command::new(&program).args(&parts).output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ActionError::UnexpectedResponse(format!(
                "'{program}' exited with code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_command_passes() {
        assert!(shell_action("noop", "true").invoke().is_ok());
    }

    #[test]
    fn failing_command_reports_the_exit_code() {
        let err = shell_action("always fails", "false").invoke().unwrap_err();
        assert_eq!(err.kind(), "unexpected_response");
        assert!(err.to_string().contains("exited with code"));
    }

    #[test]
    fn unparseable_command_fails_cleanly() {
        let err = shell_action("broken", "echo 'unterminated").invoke().unwrap_err();
        assert_eq!(err.kind(), "failed");
    }

    #[test]
    fn missing_program_maps_to_io_error() {
        let err = shell_action("ghost", "definitely-not-a-real-binary-3141")
            .invoke()
            .unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
