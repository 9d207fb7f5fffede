use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Result of running the GC command against a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "status")]
pub enum GcOutcome {
    Succeeded { exit_code: i32 },
    Failed { reason: String },
}

impl GcOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GcOutcome::Succeeded { .. })
    }
}

/// Aggregate result of a garbage-collection run, keyed by target id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcReport {
    pub collector: String,
    pub outcomes: BTreeMap<String, GcOutcome>,
}

impl GcReport {
    pub fn new(collector: impl Into<String>) -> Self {
        Self {
            collector: collector.into(),
            outcomes: BTreeMap::new(),
        }
    }

    pub fn record_success(&mut self, target: impl Into<String>, exit_code: i32) {
        self.outcomes
            .insert(target.into(), GcOutcome::Succeeded { exit_code });
    }

    pub fn record_failure(&mut self, target: impl Into<String>, reason: impl Into<String>) {
        self.outcomes.insert(
            target.into(),
            GcOutcome::Failed {
                reason: reason.into(),
            },
        );
    }

    /// `true` when every recorded target succeeded (vacuously true when empty).
    pub fn is_success(&self) -> bool {
        self.outcomes.values().all(GcOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(id, outcome)| match outcome {
            GcOutcome::Failed { reason } => Some((id.as_str(), reason.as_str())),
            GcOutcome::Succeeded { .. } => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
