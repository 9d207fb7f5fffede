use std::time::Duration;

use clap::{Parser, ValueEnum};
use drprune_client::{ConsulConfig, NomadConfig, RegistryConfig};
use drprune_core::{ClusterGcConfig, PollPolicy, ResolverConfig, RuntimeGcConfig};
use drprune_model::GcCommand;
use drprune_observe::{LoggerConfig, LoggerFormat, LoggerLevel};

/// Where the registry garbage collector runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GcBackend {
    /// Redeploy the Nomad job read-only and run the collector in its allocation.
    Nomad,
    /// Run the collector in local Docker containers matched by name prefix.
    Docker,
}

/// Prune old image tags from a Docker registry and optionally run its garbage collector.
#[derive(Debug, Parser)]
#[command(name = "drprune")]
#[command(version)]
pub struct Cli {
    /// Registry base URL.
    #[arg(long, env = "DOCKER_REGISTRY_URL")]
    pub docker_registry_url: String,

    #[arg(long, env = "DOCKER_REGISTRY_USER")]
    pub docker_registry_user: Option<String>,

    #[arg(long, env = "DOCKER_REGISTRY_PASS", hide_env_values = true)]
    pub docker_registry_pass: Option<String>,

    /// Ignore TLS certificate errors (self-signed registries).
    #[arg(long)]
    pub https_skip_verify: bool,

    #[arg(long, env = "CONSUL_HTTP_ADDR", default_value = "http://127.0.0.1:8500")]
    pub consul_addr: String,

    #[arg(long, env = "CONSUL_HTTP_TOKEN", hide_env_values = true)]
    pub consul_token: Option<String>,

    /// Config-store folder holding the default retention policy.
    #[arg(long, default_value = "apps/drprune/default")]
    pub consul_default_path: String,

    /// Config-store prefix of per-repository overrides.
    #[arg(long, default_value = "apps/drprune/overrides")]
    pub consul_prefix: String,

    /// Skip pruning; useful to only trigger garbage collection.
    #[arg(long)]
    pub skip_deletes: bool,

    /// Run the registry garbage collector after pruning.
    #[arg(long)]
    pub run_gc: bool,

    #[arg(long, value_enum, default_value_t = GcBackend::Nomad)]
    pub gc_backend: GcBackend,

    #[arg(long, env = "NOMAD_ADDR", default_value = "http://127.0.0.1:4646")]
    pub nomad_addr: String,

    #[arg(long, env = "NOMAD_TOKEN", hide_env_values = true)]
    pub nomad_token: Option<String>,

    /// Nomad job running the registry.
    #[arg(long, default_value = "docker-registry")]
    pub nomad_job: String,

    #[arg(long, default_value = "docker-registry")]
    pub docker_registry_container_name_prefix: String,

    /// Registry config file inside the container.
    #[arg(long, default_value = "/etc/docker/registry/config.yml")]
    pub docker_registry_config_file_path: String,

    /// Registry binary inside the container.
    #[arg(long, default_value = "registry")]
    pub gc_binary: String,

    #[arg(long, default_value_t = 100_000)]
    pub catalog_page_size: u32,

    /// Attempts per scheduler long-poll loop.
    #[arg(long, default_value_t = 10)]
    pub poll_attempts: u32,

    /// Server-side wait of one long-poll attempt, in seconds.
    #[arg(long, default_value_t = 60)]
    pub poll_wait_secs: u64,

    #[arg(long, env = "DRPRUNE_LOG_LEVEL", default_value = "info")]
    pub log_level: LoggerLevel,

    /// text, json or journald.
    #[arg(long, env = "DRPRUNE_LOG_FORMAT", default_value = "text")]
    pub log_format: LoggerFormat,
}

impl Cli {
    pub fn logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            format: self.log_format,
            level: self.log_level.clone(),
            ..LoggerConfig::default()
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            username: self.docker_registry_user.clone().filter(|u| !u.is_empty()),
            password: self.docker_registry_pass.clone(),
            skip_verify: self.https_skip_verify,
            page_size: self.catalog_page_size,
            ..RegistryConfig::new(&self.docker_registry_url)
        }
    }

    pub fn consul_config(&self) -> ConsulConfig {
        ConsulConfig {
            addr: self.consul_addr.clone(),
            token: self.consul_token.clone().filter(|t| !t.is_empty()),
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            default_path: self.consul_default_path.clone(),
            override_prefix: self.consul_prefix.clone(),
        }
    }

    pub fn nomad_config(&self) -> NomadConfig {
        NomadConfig {
            addr: self.nomad_addr.clone(),
            token: self.nomad_token.clone().filter(|t| !t.is_empty()),
            ..NomadConfig::default()
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_attempts, Duration::from_secs(self.poll_wait_secs))
    }

    pub fn cluster_gc_config(&self) -> ClusterGcConfig {
        ClusterGcConfig::new(&self.nomad_job).with_poll(self.poll_policy())
    }

    pub fn runtime_gc_config(&self) -> RuntimeGcConfig {
        RuntimeGcConfig::new(
            &self.docker_registry_container_name_prefix,
            GcCommand::new(&self.gc_binary, &self.docker_registry_config_file_path),
        )
    }
}
