//! Cancellable subprocess execution with captured, line-logged output.
use std::{path::PathBuf, process::Stdio};

use drprune_model::ExecOutput;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    error::{ExecError, ExecResult},
    util::kill_graceful,
};

/// Process to spawn.
#[derive(Clone, Debug, Default)]
pub struct ProcConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment on top of the inherited one.
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl ProcConfig {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Run the process to completion.
///
/// stdout and stderr are read line by line, logged as they arrive and returned in the
/// [`ExecOutput`]. A non-zero exit is not an error here; callers decide what it means.
/// When `cancel` fires the child receives SIGTERM, then SIGKILL after a grace period.
pub async fn run(cfg: &ProcConfig, cancel: &CancellationToken) -> ExecResult<ExecOutput> {
    if cfg.program.is_empty() {
        return Err(ExecError::MissingProgram);
    }
    trace!(target: "drprune::exec", program = %cfg.program, args = ?cfg.args, "spawn");

    let mut cmd = Command::new(&cfg.program);
    cmd.args(&cfg.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &cfg.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in &cfg.env {
        cmd.env(k, v);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| ExecError::Spawn(format!("{}: {e}", cfg.program)))?;

    let stdout = child
        .stdout
        .take()
        .map(|out| collect_lines(out, &cfg.program, Stream::Stdout));
    let stderr = child
        .stderr
        .take()
        .map(|err| collect_lines(err, &cfg.program, Stream::Stderr));

    tokio::select! {
        status = child.wait() => {
            let status = status?;
            let output = ExecOutput {
                exit_code: status.code().ok_or(ExecError::KilledBySignal)?,
                stdout: join_output(stdout).await,
                stderr: join_output(stderr).await,
            };
            debug!(target: "drprune::exec", program = %cfg.program, exit_code = output.exit_code, "exited");
            Ok(output)
        }
        _ = cancel.cancelled() => {
            debug!(target: "drprune::exec", program = %cfg.program, "cancelled; killing child");
            if let Err(e) = kill_graceful(&mut child).await {
                warn!(target: "drprune::exec", program = %cfg.program, error = %e, "failed to kill child");
            }
            Err(ExecError::Cancelled)
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Stream {
    Stdout,
    Stderr,
}

fn collect_lines<R>(reader: R, program: &str, stream: Stream) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let program = program.to_string();
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut captured = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            match stream {
                Stream::Stdout => info!(target: "drprune::exec::out", %program, "{line}"),
                Stream::Stderr => warn!(target: "drprune::exec::out", %program, "{line}"),
            }
            captured.push_str(&line);
            captured.push('\n');
        }
        captured
    })
}

async fn join_output(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}
