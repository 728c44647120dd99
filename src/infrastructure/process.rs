//! Shell command execution with a hard timeout.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;

/// How a shell command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellOutcome {
    /// The process exited. `code` is `None` when killed by a signal.
    Exited {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    TimedOut,
    SpawnFailed(String),
}

impl ShellOutcome {
    /// Exit code zero within the time limit.
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Exited { code: Some(0), .. })
    }
}

/// Run `command` through `sh -c` in `cwd`.
///
/// The shell leads its own process group. On timeout the whole group is
/// killed, so nothing the command started outlives the call.
pub async fn run_shell(command: &str, cwd: &Path, limit: Duration) -> ShellOutcome {
    tracing::debug!(command, cwd = %cwd.display(), timeout_secs = limit.as_secs(), "running shell command");

    let mut shell = Command::new("sh");
    shell
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    shell.process_group(0);

    let mut child = match shell.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(command, error = %e, "failed to spawn shell command");
            return ShellOutcome::SpawnFailed(e.to_string());
        }
    };

    let pid = child.id();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let finished = timeout(limit, async {
        let (status, stdout, stderr) = tokio::join!(child.wait(), drain(stdout), drain(stderr));
        status.map(|status| (status, stdout, stderr))
    })
    .await;

    match finished {
        Ok(Ok((status, stdout, stderr))) => ShellOutcome::Exited {
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        },
        Ok(Err(e)) => ShellOutcome::SpawnFailed(e.to_string()),
        Err(_) => {
            tracing::warn!(command, timeout_secs = limit.as_secs(), "shell command timed out");
            kill_process_group(pid);
            if let Err(e) = child.kill().await {
                tracing::debug!(command, error = %e, "shell already gone after group kill");
            }
            ShellOutcome::TimedOut
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            tracing::debug!(error = %e, "failed to read command output");
        }
    }
    buf
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        tracing::debug!(pid, error = %e, "process group already exited");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
