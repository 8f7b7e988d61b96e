//! Builder for executing external tool commands with timeout support.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// Children are always spawned with `kill_on_drop`, so abandoning an
/// execution (timeout, cancellation, dropped stream) terminates the process.
///
/// # Example
///
/// ```no_run
/// use ts_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> ts_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-print_format", "json"])
///     .args(["-show_format", "-show_streams", "-i", "pipe:0"])
///     .stdin(std::fs::read("/path/to/video.mkv")?)
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    stdin_data: Option<Vec<u8>>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            stdin_data: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Provide data to be written to the process's stdin.
    pub fn stdin(&mut self, data: Vec<u8>) -> &mut Self {
        self.stdin_data = Some(data);
        self
    }

    /// Arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// File name of the program, for error messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.kill_on_drop(true);
        cmd
    }

    /// Spawn the process with all three standard streams piped, for callers
    /// that stream data through it.
    ///
    /// The configured timeout does not apply; the caller owns the child.
    pub fn spawn_piped(&self) -> ts_core::Result<Child> {
        tracing::debug!(tool = %self.program_name(), args = ?self.args, "spawning");

        let mut cmd = self.command();
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        cmd.spawn()
            .map_err(|e| ts_core::Error::tool(self.program_name(), format!("failed to spawn: {e}")))
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - Returns [`ts_core::Error::Tool`] if the process times out (message
    ///   includes the timeout duration).
    /// - Returns [`ts_core::Error::Tool`] if the process exits with a non-zero
    ///   status (message includes stderr).
    /// - Returns [`ts_core::Error::Tool`] if spawning the process fails.
    pub async fn execute(&self) -> ts_core::Result<ToolOutput> {
        let program_name = self.program_name();
        tracing::debug!(tool = %program_name, args = ?self.args, "executing");

        let mut cmd = self.command();
        if self.stdin_data.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            ts_core::Error::tool(program_name.clone(), format!("failed to spawn: {e}"))
        })?;

        let run = async {
            // Feed stdin concurrently with collecting output so a tool that
            // produces a lot of output before draining its input cannot
            // deadlock us.
            let stdin = child.stdin.take();
            let data = self.stdin_data.as_deref();
            let feed = async move {
                if let (Some(mut stdin), Some(data)) = (stdin, data) {
                    match stdin.write_all(data).await {
                        // Tools like ffprobe stop reading once they have seen
                        // enough; a closed pipe is not an error.
                        Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                        _ => {}
                    }
                }
                Ok(())
            };
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            let output = output?;
            fed?;
            Ok::<_, std::io::Error>(output)
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(ts_core::Error::tool(
                        program_name,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(ts_core::Error::tool(
                program_name,
                format!("I/O error talking to process: {e}"),
            )),
            // The child was moved into `run`; dropping it kills the process.
            Err(_elapsed) => Err(ts_core::Error::tool(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}
