//! Built-in executor that shells out to an external scanner command

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::executor::{CancelToken, ScanExecutor, ScanOutcome};
use crate::model::{Finding, Severity};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Runs a configured external program once per scan, with the target appended
/// as the final argument.
///
/// Each non-empty stdout line becomes one finding: `severity<TAB>description`,
/// with lines that do not parse kept verbatim at Info severity. The child is
/// polled at `poll_interval`; when the cancellation token is set its whole
/// process group is killed and the run returns the Cancelled outcome.
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
    poll_interval: Duration,
}

impl CommandExecutor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl ScanExecutor for CommandExecutor {
    fn kind(&self) -> &'static str {
        "command"
    }

    fn run(&self, target: &str, cancel: &CancelToken) -> Result<ScanOutcome> {
        if which::which(&self.program).is_err() {
            bail!("scanner command '{}' not found on PATH", self.program);
        }

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // The child leads its own process group so cancellation can reach
        // any helpers it forks, not just the direct child.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn '{}'", self.program))?;

        // Drain both pipes on their own threads so a chatty child never
        // blocks on a full pipe while we poll for exit.
        let stdout = child.stdout.take().context("child stdout not captured")?;
        let stderr = child.stderr.take().context("child stderr not captured")?;
        let stdout_reader = spawn_line_reader(stdout);
        let stderr_reader = spawn_tail_reader(stderr);

        let status = loop {
            if cancel.is_cancelled() {
                kill_scanner(&mut child);
                // A cancelled run has no output to report; skip the reader
                // joins so a straggler still holding the pipes cannot delay
                // the outcome.
                return Ok(ScanOutcome::Cancelled);
            }
            match child.try_wait()? {
                Some(status) => break status,
                None => std::thread::sleep(self.poll_interval),
            }
        };

        let lines = stdout_reader
            .join()
            .map_err(|_| anyhow::anyhow!("stdout reader thread panicked"))??;
        let stderr_tail = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            let diagnostic = if stderr_tail.is_empty() {
                "no diagnostic output".to_string()
            } else {
                stderr_tail
            };
            bail!("scanner command exited with {status}: {diagnostic}");
        }

        let completed_at = Utc::now();
        let findings = lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| parse_finding(line, completed_at))
            .collect();
        Ok(ScanOutcome::Completed(findings))
    }
}

/// Kill the scanner and reap it. On Unix the child leads its own process
/// group, so the signal also takes down anything it forked and the output
/// pipes close with them.
#[cfg(unix)]
fn kill_scanner(child: &mut Child) {
    unsafe {
        libc::kill(-(child.id() as libc::pid_t), libc::SIGKILL);
    }
    let _ = child.wait();
}

#[cfg(not(unix))]
fn kill_scanner(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_line_reader(stdout: ChildStdout) -> JoinHandle<std::io::Result<Vec<String>>> {
    std::thread::spawn(move || BufReader::new(stdout).lines().collect())
}

/// Collects stderr and keeps its last non-empty line as the diagnostic.
fn spawn_tail_reader(stderr: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buffer = String::new();
        let _ = BufReader::new(stderr).read_to_string(&mut buffer);
        buffer
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("")
            .trim()
            .to_string()
    })
}

fn parse_finding(line: &str, detected_at: DateTime<Utc>) -> Finding {
    if let Some((severity, description)) = line.split_once('\t') {
        if let Ok(severity) = severity.trim().to_lowercase().parse::<Severity>() {
            return Finding {
                severity,
                description: description.trim().to_string(),
                detected_at,
            };
        }
    }
    Finding {
        severity: Severity::Info,
        description: line.trim().to_string(),
        detected_at,
    }
}
