//! Running a single automation job.

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::config::SupervisorConfig;
use super::error::SupervisorError;
use super::types::{JobResult, JobSpec};
use crate::metrics::{JOBS_TOTAL, JOB_DURATION};
use crate::session::SessionEvent;

/// Run one job to completion, reporting progress on `events`.
///
/// Never fails: every problem ends up as an output event and in the
/// returned result.
pub(crate) async fn run_job(
    job: &JobSpec,
    config: &SupervisorConfig,
    events: &mpsc::Sender<SessionEvent>,
) -> JobResult {
    let start = Instant::now();
    let tag = job.tag();

    let mut result = JobResult {
        marketplace: job.marketplace,
        folder: job.folder.clone(),
        exit_code: None,
        timed_out: false,
        skipped: false,
        duration_ms: 0,
    };

    match spawn(job, config) {
        Ok(child) => {
            emit(events, format!("[*] {tag}: started in {}", job.folder.display())).await;
            supervise(child, &tag, config, events, &mut result).await;
        }
        Err(e) if e.is_skip() => {
            warn!(marketplace = %job.marketplace, folder = %job.folder.display(), reason = %e, "Job skipped");
            emit(events, format!("[!] {tag}: {e}")).await;
            result.skipped = true;
        }
        Err(e) => {
            warn!(marketplace = %job.marketplace, folder = %job.folder.display(), error = %e, "Job failed to start");
            emit(events, format!("[X] {tag}: {e}")).await;
        }
    }

    result.duration_ms = start.elapsed().as_millis() as u64;
    record(&result);
    result
}

fn spawn(job: &JobSpec, config: &SupervisorConfig) -> Result<Child, SupervisorError> {
    if config.skip_execution {
        return Err(SupervisorError::ExecutionDisabled);
    }
    let executable = job
        .executable
        .as_deref()
        .ok_or(SupervisorError::NoExecutable)?;
    let exe_path = job.folder.join(executable);
    if !exe_path.is_file() {
        return Err(SupervisorError::ExecutableNotFound { path: exe_path });
    }

    let mut command = match &job.launcher {
        Some(launcher) => {
            let mut command = Command::new(launcher);
            command.arg(&exe_path);
            command
        }
        None => Command::new(&exe_path),
    };

    debug!(folder = %job.folder.display(), executable = %exe_path.display(), launcher = ?job.launcher, "Spawning job");

    command
        .current_dir(&job.folder)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                match &job.launcher {
                    Some(launcher) => SupervisorError::LauncherNotFound {
                        launcher: launcher.clone(),
                    },
                    None => SupervisorError::ExecutableNotFound { path: exe_path },
                }
            } else {
                SupervisorError::Spawn(e)
            }
        })
}

/// How long output still buffered in the pipes is forwarded after the
/// process is gone.
const OUTPUT_DRAIN: Duration = Duration::from_millis(500);

/// Forward output until exit or timeout, escalating terminate → kill on timeout.
///
/// The timeout bounds the process lifetime only. Pipes held open by
/// background children of the job do not count against it.
async fn supervise(
    mut child: Child,
    tag: &str,
    config: &SupervisorConfig,
    events: &mpsc::Sender<SessionEvent>,
    result: &mut JobResult,
) {
    let (line_tx, mut line_rx) = mpsc::channel::<String>(256);
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, line_tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, line_tx.clone()));
    }
    drop(line_tx);

    let deadline = tokio::time::sleep(Duration::from_secs(config.timeout_secs));
    tokio::pin!(deadline);
    let mut output_open = true;

    let outcome = loop {
        tokio::select! {
            line = line_rx.recv(), if output_open => match line {
                Some(line) => emit(events, format!("[{tag}] {line}")).await,
                None => output_open = false,
            },
            status = child.wait() => break Some(status),
            _ = &mut deadline => break None,
        }
    };

    match outcome {
        Some(Ok(status)) => {
            forward_remaining(&mut line_rx, tag, events).await;
            result.exit_code = status.code();
            if status.success() {
                info!(job = %tag, "Job finished");
                emit(events, format!("[OK] {tag}: finished successfully")).await;
            } else {
                let code = status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none".to_string());
                warn!(job = %tag, exit_code = %code, "Job exited with error");
                emit(
                    events,
                    format!("[X] {tag}: finished with error (exit code: {code})"),
                )
                .await;
            }
        }
        Some(Err(e)) => {
            forward_remaining(&mut line_rx, tag, events).await;
            warn!(job = %tag, error = %e, "Failed waiting for job");
            emit(events, format!("[X] {tag}: failed waiting for process: {e}")).await;
        }
        None => {
            result.timed_out = true;
            warn!(job = %tag, timeout_secs = config.timeout_secs, "Job timed out");
            emit(
                events,
                format!(
                    "[!] {tag}: exceeded timeout of {}s, terminating",
                    config.timeout_secs
                ),
            )
            .await;
            escalate(&mut child, tag, config, events).await;
        }
    }

    // Background children may keep the pipes open after the job exits.
    for reader in readers {
        reader.abort();
    }
}

/// Forward lines still in flight, for at most [`OUTPUT_DRAIN`].
async fn forward_remaining(
    line_rx: &mut mpsc::Receiver<String>,
    tag: &str,
    events: &mpsc::Sender<SessionEvent>,
) {
    let _ = timeout(OUTPUT_DRAIN, async {
        while let Some(line) = line_rx.recv().await {
            emit(events, format!("[{tag}] {line}")).await;
        }
    })
    .await;
}

async fn escalate(
    child: &mut Child,
    tag: &str,
    config: &SupervisorConfig,
    events: &mpsc::Sender<SessionEvent>,
) {
    if request_terminate(child) {
        let grace = Duration::from_secs(config.terminate_grace_secs);
        if let Ok(Ok(_)) = timeout(grace, child.wait()).await {
            info!(job = %tag, "Job terminated");
            emit(events, format!("[OK] {tag}: process terminated")).await;
            return;
        }
    }

    warn!(job = %tag, "Terminate failed, killing job");
    emit(events, format!("[!] {tag}: terminate failed, killing")).await;
    match child.kill().await {
        Ok(()) => emit(events, format!("[X] {tag}: process killed")).await,
        Err(e) => {
            warn!(job = %tag, error = %e, "Kill failed");
            emit(events, format!("[X] {tag}: kill failed: {e}")).await;
        }
    }
}

/// Ask the process to exit. Returns whether the request was delivered.
#[cfg(unix)]
fn request_terminate(child: &mut Child) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok(),
        None => false,
    }
}

#[cfg(not(unix))]
fn request_terminate(child: &mut Child) -> bool {
    child.start_kill().is_ok()
}

fn spawn_reader<R>(stream: R, tx: mpsc::Sender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

async fn emit(events: &mpsc::Sender<SessionEvent>, content: String) {
    // The receiver only goes away when the session task is gone.
    let _ = events.send(SessionEvent::output(content)).await;
}

fn record(result: &JobResult) {
    let marketplace = result.marketplace.key();
    JOBS_TOTAL
        .with_label_values(&[marketplace, result.outcome().as_str()])
        .inc();
    JOB_DURATION
        .with_label_values(&[marketplace])
        .observe(result.duration_ms as f64 / 1000.0);
}
