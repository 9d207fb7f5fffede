/// Tag that is never considered for deletion, whatever the policy says.
pub const LATEST_TAG: &str = "latest";

/// Environment variable understood by the registry: while set, storage is read-only.
pub const READ_ONLY_ENV_KEY: &str = "REGISTRY_STORAGE_MAINTENANCE_READONLY";

/// Value of [`READ_ONLY_ENV_KEY`] that switches the registry into read-only mode.
pub const READ_ONLY_ENV_VALUE: &str = r#"{"enabled":true}"#;
