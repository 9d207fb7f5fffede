use serde::{Deserialize, Serialize};

/// One row of a remote `ps -o pid,comm,args` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    /// Short command name (`comm` column).
    pub command: String,
    /// Remaining columns split on whitespace (`args` column).
    pub args: Vec<String>,
}

impl ProcessRecord {
    /// First argument ending in `suffix`, if any.
    pub fn arg_with_suffix(&self, suffix: &str) -> Option<&str> {
        self.args
            .iter()
            .map(String::as_str)
            .find(|arg| arg.ends_with(suffix))
    }

    /// Last path segment of the command (`/bin/registry` → `registry`).
    pub fn command_basename(&self) -> &str {
        self.command.rsplit('/').next().unwrap_or(&self.command)
    }
}
