//! `nomad alloc exec` front end.
use drprune_model::ExecOutput;
use tokio_util::sync::CancellationToken;

use crate::{ExecResult, ProcConfig, run};

/// Runs commands inside allocations through the `nomad` binary.
#[derive(Clone, Debug)]
pub struct NomadExec {
    binary: String,
    addr: String,
    token: Option<String>,
}

impl NomadExec {
    pub fn new(addr: impl Into<String>, token: Option<String>) -> Self {
        Self {
            binary: "nomad".into(),
            addr: addr.into(),
            token,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Process that runs `argv` inside `task` of `alloc_id`, without a terminal.
    pub fn command(&self, alloc_id: &str, task: &str, argv: &[String]) -> ProcConfig {
        let mut args = vec![
            "alloc".to_string(),
            "exec".to_string(),
            "-i=false".to_string(),
            "-t=false".to_string(),
            "-task".to_string(),
            task.to_string(),
            alloc_id.to_string(),
        ];
        args.extend(argv.iter().cloned());

        let mut cfg = ProcConfig::new(&self.binary, args).with_env("NOMAD_ADDR", &self.addr);
        if let Some(token) = &self.token {
            cfg = cfg.with_env("NOMAD_TOKEN", token);
        }
        cfg
    }

    pub async fn exec(
        &self,
        alloc_id: &str,
        task: &str,
        argv: &[String],
        cancel: &CancellationToken,
    ) -> ExecResult<ExecOutput> {
        run(&self.command(alloc_id, task, argv), cancel).await
    }
}
