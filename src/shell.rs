use anyhow::{Context as _, Result, anyhow};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::context::Context;

/// How often a running child is checked for exit and cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A builder for executing external commands that are killed when a
/// [`Context`] is cancelled
pub struct ShellCommand<'a> {
    program: &'a str,
    args: Vec<&'a str>,
    workdir: Option<&'a Path>,
}

impl<'a> ShellCommand<'a> {
    /// Create a new command builder
    pub fn new(program: &'a str) -> Self {
        Self {
            program,
            args: Vec::new(),
            workdir: None,
        }
    }

    /// Run a command line through `sh -c`
    pub fn shell(command_line: &'a str) -> Self {
        Self::new("sh").args(&["-c", command_line])
    }

    /// Add a single argument
    pub fn arg(mut self, arg: &'a str) -> Self {
        self.args.push(arg);
        self
    }

    /// Add multiple arguments
    pub fn args(mut self, args: &[&'a str]) -> Self {
        self.args.extend_from_slice(args);
        self
    }

    /// Set the working directory for the command
    pub fn workdir(mut self, path: &'a Path) -> Self {
        self.workdir = Some(path);
        self
    }

    fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.to_string()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Execute the command and return its captured output.
    /// Returns an error if the command fails (non-zero exit code) or if `ctx`
    /// is cancelled first, in which case the child is killed.
    pub fn run(self, ctx: &Context) -> Result<Output> {
        let mut cmd = Command::new(self.program);
        if let Some(dir) = self.workdir {
            cmd.current_dir(dir);
        }
        // Own process group, so cancellation reaches whatever the command spawns.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let mut child = cmd
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute command: {}", self.display()))?;
        debug!(command = %self.display(), pid = child.id(), "shell:spawned");

        // Drain both pipes on their own threads so a chatty child cannot block
        // on a full pipe while we poll it.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("Failed to wait for command: {}", self.display()))?
            {
                break status;
            }
            if let Some(reason) = ctx.err() {
                kill(&mut child);
                debug!(command = %self.display(), %reason, "shell:killed");
                return Err(anyhow!("Command cancelled: {} ({})", self.display(), reason));
            }
            trace!(pid = child.id(), "shell:waiting");
            thread::sleep(POLL_INTERVAL);
        };

        let output = Output {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "Command failed: {}\n{}",
                self.display(),
                stderr.trim()
            ));
        }
        Ok(output)
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            warn!(error = %e, read = buf.len(), "shell:failed to read output");
        }
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[cfg(unix)]
fn kill(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let group = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(group, Signal::SIGKILL) {
        warn!(pid = child.id(), error = %e, "shell:failed to kill process group");
        let _ = child.kill();
    }
    let _ = child.wait(); // Ensure process is reaped
}

#[cfg(not(unix))]
fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait(); // Ensure process is reaped
}
