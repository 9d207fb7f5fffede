use serde::{Deserialize, Serialize};

const GC_SUBCOMMAND: &str = "garbage-collect";

/// Registry binary and configuration file used to invoke the blob garbage collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcCommand {
    pub binary: String,
    pub config_path: String,
}

impl GcCommand {
    pub fn new(binary: impl Into<String>, config_path: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            config_path: config_path.into(),
        }
    }

    /// Full argv: `<binary> garbage-collect <config>`.
    pub fn argv(&self) -> Vec<String> {
        vec![
            self.binary.clone(),
            GC_SUBCOMMAND.to_string(),
            self.config_path.clone(),
        ]
    }
}
