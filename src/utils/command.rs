use itertools::Itertools;
use log::{debug, info};
use std::process::{Command, Output};

/// Renders a command the way it would be typed in a shell, for log transcripts.
pub fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| part.to_string_lossy())
        .join(" ")
}

/// Runs a command to completion, capturing its output.
///
/// Returns a human-readable reason when the program cannot be started or
/// exits unsuccessfully; callers wrap it in the error for their stage.
pub fn run(cmd: &mut Command) -> Result<Output, String> {
    let description = describe(cmd);
    info!("Running: {}", description);

    let output = cmd
        .output()
        .map_err(|e| format!("failed to start '{}': {}", description, e))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        debug!("{}", line);
    }

    if !output.status.success() {
        let tail = stderr.lines().rev().take(5).collect::<Vec<_>>();
        return Err(format!(
            "'{}' exited with {}: {}",
            description,
            output.status,
            tail.into_iter().rev().join(" | ")
        ));
    }
    Ok(output)
}
