use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{READ_ONLY_ENV_KEY, READ_ONLY_ENV_VALUE};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("invalid job: cannot find primary task")]
    MissingTask,
    #[error("invalid job: task environment is not an object")]
    InvalidEnv,
}

/// Job descriptor as returned by the scheduler.
///
/// The descriptor is kept opaque and treated as an immutable value: every
/// modification returns a new `ClusterJob`, the original is never touched.
/// The primary task is the first task of the first task group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterJob(Value);

impl ClusterJob {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Job identifier (`ID`, falling back to `Name`).
    pub fn id(&self) -> Option<&str> {
        self.0
            .get("ID")
            .or_else(|| self.0.get("Name"))
            .and_then(Value::as_str)
    }

    pub fn primary_task_name(&self) -> Result<&str, JobError> {
        self.primary_task()
            .and_then(|task| task.get("Name"))
            .and_then(Value::as_str)
            .ok_or(JobError::MissingTask)
    }

    /// Value of `key` in the primary task environment.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.primary_task()?.get("Env")?.get(key)?.as_str()
    }

    pub fn is_read_only(&self) -> bool {
        self.env(READ_ONLY_ENV_KEY).is_some()
    }

    /// Copy of the job with `key=value` set on the primary task.
    pub fn with_env(&self, key: &str, value: &str) -> Result<ClusterJob, JobError> {
        let mut next = self.clone();
        next.primary_env_mut()?
            .insert(key.to_string(), Value::String(value.to_string()));
        Ok(next)
    }

    /// Copy of the job with `key` removed from the primary task environment.
    pub fn without_env(&self, key: &str) -> Result<ClusterJob, JobError> {
        let mut next = self.clone();
        next.primary_env_mut()?.remove(key);
        Ok(next)
    }

    /// Copy of the job with the registry read-only marker set or cleared.
    pub fn with_read_only(&self, enabled: bool) -> Result<ClusterJob, JobError> {
        if enabled {
            self.with_env(READ_ONLY_ENV_KEY, READ_ONLY_ENV_VALUE)
        } else {
            self.without_env(READ_ONLY_ENV_KEY)
        }
    }

    fn primary_task(&self) -> Option<&Value> {
        self.0
            .get("TaskGroups")?
            .get(0)?
            .get("Tasks")?
            .get(0)
    }

    fn primary_env_mut(&mut self) -> Result<&mut Map<String, Value>, JobError> {
        let task = self
            .0
            .get_mut("TaskGroups")
            .and_then(|groups| groups.get_mut(0))
            .and_then(|group| group.get_mut("Tasks"))
            .and_then(|tasks| tasks.get_mut(0))
            .and_then(Value::as_object_mut)
            .ok_or(JobError::MissingTask)?;

        let env = task
            .entry("Env")
            .or_insert_with(|| Value::Object(Map::new()));
        if env.is_null() {
            *env = Value::Object(Map::new());
        }
        env.as_object_mut().ok_or(JobError::InvalidEnv)
    }
}
