use serde::{Deserialize, Serialize};

/// Container as listed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    /// Container names; runtimes may report them with a leading `/`.
    pub names: Vec<String>,
}

impl ContainerSummary {
    pub fn new<I, S>(id: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// First name whose last path segment starts with `prefix`.
    pub fn name_matching(&self, prefix: &str) -> Option<&str> {
        self.names
            .iter()
            .map(|name| name.rsplit('/').next().unwrap_or(name))
            .find(|base| base.starts_with(prefix))
    }
}
