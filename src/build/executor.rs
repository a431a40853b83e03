use crate::error::{RelgateError, Result};
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs a build script once for one target
pub struct ScriptExecutor;

impl ScriptExecutor {
    /// Execute `bash ./<script> <output_file>` inside `work_dir`
    ///
    /// The child inherits stdout/stderr so build logs stream to the CI log.
    /// A child still running at `timeout` is killed and the run fails.
    ///
    /// # Returns
    /// * `Ok(())` if the script exits with code 0
    /// * `Err` naming the script and `target` otherwise
    pub fn execute(
        work_dir: &Path,
        script: &str,
        output_file: &Path,
        env: &[(String, String)],
        target: &str,
        timeout: Duration,
    ) -> Result<()> {
        let script_path = work_dir.join(script);
        if !script_path.is_file() {
            return Err(RelgateError::build(
                script,
                target,
                format!("script not found at {}", script_path.display()),
            ));
        }

        let mut cmd = Command::new("bash");
        cmd.arg(format!("./{}", script))
            .arg(output_file)
            .current_dir(work_dir);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| RelgateError::build(script, target, format!("cannot start bash: {}", e)))?;
        debug!(script, target, pid = child.id(), "started build script");

        let deadline = Instant::now() + timeout;
        let status: ExitStatus = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    warn!(script, target, ?timeout, "build script timed out, killing");
                    // Already-exited races are fine; wait() reaps either way
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RelgateError::build(
                        script,
                        target,
                        format!("timed out after {}s", timeout.as_secs()),
                    ));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(RelgateError::build(
                        script,
                        target,
                        format!("cannot wait for script: {}", e),
                    ))
                }
            }
        };

        if !status.success() {
            return Err(RelgateError::build(
                script,
                target,
                format!("exited with code {}", status.code().unwrap_or(-1)),
            ));
        }

        Ok(())
    }
}
