//! Effective retention policy per repository.
use std::sync::Arc;

use drprune_model::{PolicyDecodeError, PolicyOverride, RetentionPolicy};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    LogCtx,
    ports::{ConfigStore, PortError},
};

/// Why a stored policy could not be used.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("config store lookup failed: {0}")]
    Lookup(#[from] PortError),

    #[error(transparent)]
    Decode(#[from] PolicyDecodeError),
}

/// Config-store locations of the default policy and of per-repository overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub default_path: String,
    pub override_prefix: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_path: "apps/drprune/default".to_string(),
            override_prefix: "apps/drprune/overrides".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Override location for `repo`: `<override_prefix>/<repo>`.
    pub fn override_path(&self, repo: &str) -> String {
        format!("{}/{}", self.override_prefix.trim_end_matches('/'), repo)
    }
}

/// Resolves the policy of each repository from a shared default plus optional overrides.
///
/// The default is loaded once and shared read-only; a repository with an override gets
/// its own copy.
pub struct ConfigResolver {
    store: Arc<dyn ConfigStore>,
    cfg: ResolverConfig,
    default: Arc<RetentionPolicy>,
}

impl ConfigResolver {
    /// Load the default policy from the store.
    ///
    /// Lookup or decode failures are logged and fall back to the built-in defaults.
    pub async fn load(store: Arc<dyn ConfigStore>, cfg: ResolverConfig, log: &LogCtx) -> Self {
        let log = log.with("path", &cfg.default_path);
        let builtin = RetentionPolicy::default();

        let default = match read_override(store.as_ref(), &cfg.default_path).await {
            Ok(Some(over)) => {
                info!(target: "drprune::policy", ctx = %log, ?over, "default policy loaded");
                builtin.overlay(&over)
            }
            Ok(None) => {
                info!(target: "drprune::policy", ctx = %log, "no default policy stored, using built-in defaults");
                builtin
            }
            Err(e) => {
                error!(target: "drprune::policy", ctx = %log, error = %e, "default policy could not be read, using built-in defaults");
                builtin
            }
        };

        Self {
            store,
            cfg,
            default: Arc::new(default),
        }
    }

    /// Resolver with an already known default, without touching the store.
    pub fn with_default(store: Arc<dyn ConfigStore>, cfg: ResolverConfig, default: RetentionPolicy) -> Self {
        Self {
            store,
            cfg,
            default: Arc::new(default),
        }
    }

    pub fn default_policy(&self) -> Arc<RetentionPolicy> {
        Arc::clone(&self.default)
    }

    /// Effective policy for `repo`.
    ///
    /// Returns the shared default when no usable override exists, otherwise a new policy
    /// with the override applied field by field.
    pub async fn resolve(&self, repo: &str, log: &LogCtx) -> Arc<RetentionPolicy> {
        let path = self.cfg.override_path(repo);
        let log = log.with("path", &path);

        match read_override(self.store.as_ref(), &path).await {
            Ok(Some(over)) => {
                let policy = self.default.overlay(&over);
                debug!(target: "drprune::policy", ctx = %log, ?policy, "override applied");
                Arc::new(policy)
            }
            Ok(None) => Arc::clone(&self.default),
            Err(e) => {
                error!(target: "drprune::policy", ctx = %log, error = %e, "override ignored");
                Arc::clone(&self.default)
            }
        }
    }
}

async fn read_override(
    store: &dyn ConfigStore,
    path: &str,
) -> Result<Option<PolicyOverride>, PolicyError> {
    match store.list(path).await? {
        Some(entries) => Ok(Some(PolicyOverride::decode(path, &entries)?)),
        None => Ok(None),
    }
}
