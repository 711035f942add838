//! Shell execution for quality commands: bounded time, bounded output.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Bytes kept from one output stream, plus how many were dropped past the limit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamCapture {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

impl StreamCapture {
    fn append_to(&self, text: &mut String, label: &str, stream: &str) {
        text.push_str(&String::from_utf8_lossy(&self.bytes));
        if self.dropped > 0 {
            text.push_str(&format!(
                "\n[{label} {stream} truncated {} bytes]\n",
                self.dropped
            ));
        }
    }
}

/// Result of one shell invocation.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: StreamCapture,
    pub stderr: StreamCapture,
    pub timed_out: bool,
}

impl CommandOutput {
    /// A killed command never counts as passing, whatever its exit status.
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    /// Stdout then stderr, lossily decoded, with truncation and timeout notes.
    pub fn combined_text(&self, label: &str) -> String {
        let mut text = String::new();
        self.stdout.append_to(&mut text, label, "stdout");
        self.stderr.append_to(&mut text, label, "stderr");
        if self.timed_out {
            text.push_str(&format!("\n[{label} timed out]\n"));
        }
        text
    }
}

/// Run `command_line` through `sh -c` in `workdir`.
///
/// Both pipes are drained on reader threads while the child runs so a chatty
/// command cannot block on a full pipe. At most `output_limit_bytes` per
/// stream are kept. The shell leads its own process group; on timeout the
/// whole group is killed so no grandchild keeps the pipes open.
#[instrument(skip_all, fields(command = command_line, timeout_secs = timeout.as_secs()))]
pub fn run_shell(
    command_line: &str,
    workdir: &Path,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(command_line)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command
        .spawn()
        .with_context(|| format!("spawn `{command_line}`"))?;

    let stdout = drain(child.stdout.take(), output_limit_bytes)?;
    let stderr = drain(child.stderr.take(), output_limit_bytes)?;

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!("command timed out, killing");
            kill_group(&mut child)?;
            (child.wait().context("reap killed command")?, true)
        }
    };

    let stdout = collect(stdout)?;
    let stderr = collect(stderr)?;
    if stdout.dropped > 0 || stderr.dropped > 0 {
        debug!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "output truncated"
        );
    }
    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

/// SIGKILL the child's process group, falling back to the child alone.
fn kill_group(child: &mut Child) -> Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let pgid = i32::try_from(child.id()).context("child pid out of range")?;
        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) => return Ok(()),
            Err(err) => debug!(err = %err, "process group kill failed, killing child"),
        }
    }
    child.kill().context("kill command")
}

type Reader = JoinHandle<Result<StreamCapture>>;

fn drain<R>(pipe: Option<R>, limit: usize) -> Result<Reader>
where
    R: Read + Send + 'static,
{
    let pipe = pipe.ok_or_else(|| anyhow!("output was not piped"))?;
    Ok(thread::spawn(move || capture(pipe, limit)))
}

fn collect(reader: Reader) -> Result<StreamCapture> {
    reader
        .join()
        .map_err(|_| anyhow!("output reader panicked"))?
}

fn capture<R: Read>(mut pipe: R, limit: usize) -> Result<StreamCapture> {
    let mut out = StreamCapture::default();
    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).context("read command output")?;
        if n == 0 {
            return Ok(out);
        }
        let keep = n.min(limit.saturating_sub(out.bytes.len()));
        out.bytes.extend_from_slice(&chunk[..keep]);
        out.dropped += n - keep;
    }
}
