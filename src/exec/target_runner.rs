// src/exec/target_runner.rs

//! Individual target process runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dag::ScheduledTarget;
use crate::engine::RuntimeEvent;
use crate::exec::prelude::build_prelude;
use crate::fs::RealFileSystem;
use crate::store::Value;
use crate::store::hash::compute_file_hash;
use crate::types::StorageFormat;
use crate::workflow::Workflow;

/// Number of stderr lines kept for error messages.
const STDERR_TAIL: usize = 20;

/// Everything a target process needs besides its own command.
#[derive(Debug, Clone)]
pub struct ExecContext {
    /// Global definitions emitted before every command.
    pub prelude: String,
    /// Working directory of every command.
    pub root_dir: PathBuf,
}

impl ExecContext {
    pub fn for_workflow(workflow: &Workflow) -> Self {
        Self {
            prelude: build_prelude(workflow.symbols()),
            root_dir: workflow.root_dir.clone(),
        }
    }
}

/// Run a single target process and emit `TargetCompleted`.
///
/// - If the cancel channel fires, the child process is killed and **no**
///   `TargetCompleted` event is sent for it.
pub async fn run_target(
    target: ScheduledTarget,
    ctx: Arc<ExecContext>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let started = Instant::now();

    let result = match execute(&target, &ctx, cancel_rx).await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => return,
        Err(err) => {
            warn!(
                target = %target.name,
                run_id = target.run_id,
                error = %format!("{err:#}"),
                "target execution failed"
            );
            Err(format!("{err:#}"))
        }
    };

    let event = RuntimeEvent::TargetCompleted {
        target: target.name.clone(),
        run_id: target.run_id,
        result,
        seconds: started.elapsed().as_secs_f64(),
    };
    if runtime_tx.send(event).await.is_err() {
        debug!(target = %target.name, "runtime is gone; dropping completion");
    }
}

/// Returns `Ok(None)` when the process was canceled.
async fn execute(
    target: &ScheduledTarget,
    ctx: &ExecContext,
    mut cancel_rx: oneshot::Receiver<()>,
) -> Result<Option<Value>> {
    info!(
        target = %target.name,
        run_id = target.run_id,
        cmd = %target.command,
        "starting target process"
    );

    let script = format!("{}{}", ctx.prelude, target.command);
    // The prelude is POSIX shell, so commands always go through `sh`.
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(&script)
        .current_dir(&ctx.root_dir)
        .envs(target.env.iter().map(|(k, v)| (k, v.to_env_string())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for target '{}'", target.name))?;

    let mut stdout = child.stdout.take().context("stdout was not captured")?;
    let stderr = child.stderr.take().context("stderr was not captured")?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).await.map(|_| buf)
    });

    // Always consume stderr so buffers don't fill; log at debug.
    let target_name = target.name.clone();
    let run_id = target.run_id;
    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut tail = VecDeque::with_capacity(STDERR_TAIL);
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target = %target_name, run_id, "stderr: {}", line);
            if tail.len() == STDERR_TAIL {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail
    });

    let status = tokio::select! {
        status_res = child.wait() => {
            status_res.with_context(|| {
                format!("waiting for process of target '{}'", target.name)
            })?
        }

        cancel = &mut cancel_rx => {
            match cancel {
                Ok(()) => {
                    info!(
                        target = %target.name,
                        run_id = target.run_id,
                        "cancellation requested; killing process"
                    );
                    if let Err(e) = child.kill().await {
                        warn!(
                            target = %target.name,
                            error = %e,
                            "failed to kill child process on cancellation"
                        );
                    }
                }
                Err(e) => {
                    debug!(
                        target = %target.name,
                        error = %e,
                        "cancel channel closed; process killed on drop"
                    );
                }
            }
            return Ok(None);
        }
    };

    let stdout = stdout_task
        .await
        .context("joining stdout reader")?
        .context("reading stdout")?;
    let tail = stderr_task.await.unwrap_or_default();

    info!(
        target = %target.name,
        run_id = target.run_id,
        exit_code = status.code().unwrap_or(-1),
        success = status.success(),
        "target process exited"
    );

    if !status.success() {
        let code = status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        if tail.is_empty() {
            bail!("command exited with status {code}");
        }
        let tail: Vec<String> = tail.into();
        bail!("command exited with status {code}: {}", tail.join("\n"));
    }

    parse_output(target.format, &stdout, &ctx.root_dir).map(Some)
}

/// Turn a successful command's stdout into a value.
pub fn parse_output(format: StorageFormat, stdout: &[u8], root: &Path) -> Result<Value> {
    match format {
        StorageFormat::Text => {
            let text = String::from_utf8_lossy(stdout);
            let text = text
                .strip_suffix("\r\n")
                .or_else(|| text.strip_suffix('\n'))
                .unwrap_or(text.as_ref());
            Ok(Value::Text(text.to_string()))
        }
        StorageFormat::Json => {
            let value = serde_json::from_slice(stdout).context("stdout is not valid JSON")?;
            Ok(Value::Json(value))
        }
        StorageFormat::File => {
            let text = String::from_utf8_lossy(stdout);
            let path = text.trim();
            if path.is_empty() {
                bail!("file target printed no path on stdout");
            }
            let hash = compute_file_hash(&RealFileSystem, &root.join(path))
                .with_context(|| format!("hashing output file '{path}'"))?;
            Ok(Value::File {
                path: path.to_string(),
                hash,
            })
        }
    }
}
