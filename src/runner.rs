//! Sandboxed runner: executes one invocation inside a Docker container
//! with a fixed locale and working directory.
use crate::schema::{CommandInvocation, ExecutionEnvironment, ExecutionResult};
use anyhow::{anyhow, Context, Result};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Exit code recorded when a scenario hits the execution timeout or is
/// killed by a signal; fixtures still get written.
const EXIT_CODE_UNKNOWN: i32 = -1;

pub struct DockerRunner {
    env: ExecutionEnvironment,
}

impl DockerRunner {
    pub fn new(env: ExecutionEnvironment) -> DockerRunner {
        DockerRunner { env }
    }

    pub fn environment(&self) -> &ExecutionEnvironment {
        &self.env
    }

    /// Builds the image when missing, or unconditionally on `rebuild`.
    /// Docker is only required once scenarios will actually execute.
    pub fn ensure_image(&self, rebuild: bool) -> Result<()> {
        which::which("docker").context("docker binary not found on PATH")?;
        if !rebuild && self.image_exists()? {
            tracing::debug!(image = %self.env.image_tag, "image already present");
            return Ok(());
        }
        self.build_image()
    }

    /// Executes one invocation and captures its outcome. Any exit code is
    /// a valid result; only infrastructure failures are errors.
    pub fn run(
        &self,
        invocation: &CommandInvocation,
        working_dir: Option<&str>,
    ) -> Result<ExecutionResult> {
        let working_dir = working_dir.unwrap_or(&self.env.run_workdir);
        let mut parts = Vec::with_capacity(1 + invocation.options.len() + invocation.args.len());
        parts.push(invocation.command.clone());
        parts.extend(invocation.options.iter().cloned());
        parts.extend(invocation.args.iter().cloned());
        // Tokens are joined with shell quoting so the container shell
        // never reinterprets option values or file names. `=` counts as
        // special here, so fixtures record `'--color=auto'` quoted; the
        // quoted and bare forms are shell-equivalent.
        let command_str = shell_words::join(&parts);
        let bash_command = format!(
            "cd {} && {}",
            shell_words::quote(working_dir),
            command_str
        );

        let mut cmd = Command::new("docker");
        cmd.args(["run", "--rm", "--env"])
            .arg(format!("LC_ALL={}", self.env.locale))
            .arg(&self.env.image_tag)
            .args(["/bin/bash", "-c"])
            .arg(&bash_command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn docker run for {}", invocation.scenario_id))?;
        let timeout = Duration::from_secs(self.env.timeout_seconds);
        let mut timed_out = false;

        loop {
            if child
                .try_wait()
                .with_context(|| format!("poll docker run for {}", invocation.scenario_id))?
                .is_some()
            {
                break;
            }
            if start.elapsed() > timeout {
                timed_out = true;
                let _ = child.kill();
                break;
            }
            std::thread::sleep(Duration::from_millis(25));
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("collect docker output for {}", invocation.scenario_id))?;
        let duration_ms = start.elapsed().as_millis();

        let exit_code = output.status.code().unwrap_or(EXIT_CODE_UNKNOWN);
        let mut stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if timed_out {
            stderr.push_str(&format!(
                "\n[fixgen] execution timed out after {}s\n",
                self.env.timeout_seconds
            ));
        }

        Ok(ExecutionResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr,
            exit_code: if timed_out { EXIT_CODE_UNKNOWN } else { exit_code },
            duration_ms,
            full_command: command_str,
            environment: self.env.name.clone(),
        })
    }

    fn image_exists(&self) -> Result<bool> {
        let status = Command::new("docker")
            .args(["image", "inspect", &self.env.image_tag])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .context("spawn docker image inspect")?;
        Ok(status.success())
    }

    fn build_image(&self) -> Result<()> {
        let dockerfile = &self.env.dockerfile_path;
        let context_dir = dockerfile
            .parent()
            .ok_or_else(|| anyhow!("dockerfile {} has no parent directory", dockerfile.display()))?;
        tracing::info!(image = %self.env.image_tag, "building container image");
        let output = Command::new("docker")
            .args(["build", "-t", &self.env.image_tag, "-f"])
            .arg(dockerfile)
            .arg(context_dir)
            .output()
            .context("spawn docker build")?;
        if !output.status.success() {
            return Err(anyhow!(
                "failed to build image {}:\n{}",
                self.env.image_tag,
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn command_line_is_shell_quoted() {
        let parts = vec![
            "grep".to_string(),
            "--color=auto".to_string(),
            "hello world".to_string(),
        ];
        // Tokens containing `=` or spaces come back single-quoted.
        assert_eq!(
            shell_words::join(&parts),
            "grep '--color=auto' 'hello world'"
        );
        assert_eq!(shell_words::join(["ls", "-l", "alpha.txt"]), "ls -l alpha.txt");
    }
}
