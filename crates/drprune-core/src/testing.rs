//! In-memory collaborators used by the unit tests of this crate.
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use drprune_model::{
    AllocationHandle, ClientStatus, ClusterJob, ContainerSummary, ExecOutput, KeyValue, TagRecord,
};
use tokio_util::sync::CancellationToken;

use crate::ports::{
    ConfigStore, ContainerRuntime, Indexed, PortError, QueryOptions, RegistryApi, SchedulerApi,
};

#[derive(Default)]
pub struct FakeStore {
    pub entries: HashMap<String, Result<Option<Vec<KeyValue>>, PortError>>,
    pub lookups: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn with(mut self, path: &str, pairs: &[(&str, &str)]) -> Self {
        let kvs = pairs
            .iter()
            .map(|(k, v)| KeyValue::new(format!("{path}/{k}"), *v))
            .collect();
        self.entries.insert(path.to_string(), Ok(Some(kvs)));
        self
    }

    pub fn failing(mut self, path: &str) -> Self {
        self.entries
            .insert(path.to_string(), Err(PortError::Transport("connection refused".into())));
        self
    }
}

#[async_trait]
impl ConfigStore for FakeStore {
    async fn list(&self, path: &str) -> Result<Option<Vec<KeyValue>>, PortError> {
        self.lookups.lock().unwrap().push(path.to_string());
        self.entries.get(path).cloned().unwrap_or(Ok(None))
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    pub repos: Option<Vec<String>>,
    pub tags: HashMap<String, Vec<String>>,
    pub records: HashMap<(String, String), TagRecord>,
    pub failing_deletes: HashSet<String>,
    pub deleted: Mutex<Vec<(String, String)>>,
    pub metadata_calls: Mutex<Vec<(String, String)>>,
    pub digest_calls: Mutex<Vec<(String, String)>>,
}

impl FakeRegistry {
    pub fn add(&mut self, rec: TagRecord) {
        if !self.repos.get_or_insert_with(Vec::new).contains(&rec.repo) {
            self.repos.get_or_insert_with(Vec::new).push(rec.repo.clone());
        }
        self.tags
            .entry(rec.repo.clone())
            .or_default()
            .push(rec.tag.clone());
        self.records
            .insert((rec.repo.clone(), rec.tag.clone()), rec);
    }

    pub fn deleted_digests(&self) -> Vec<String> {
        self.deleted
            .lock()
            .unwrap()
            .iter()
            .map(|(_, d)| d.clone())
            .collect()
    }
}

#[async_trait]
impl RegistryApi for FakeRegistry {
    async fn repositories(&self) -> Result<Vec<String>, PortError> {
        self.repos
            .clone()
            .ok_or_else(|| PortError::Status { status: 401, body: "unauthorized".into() })
    }

    async fn tags(&self, repo: &str) -> Result<Vec<String>, PortError> {
        self.tags
            .get(repo)
            .cloned()
            .ok_or_else(|| PortError::Status { status: 404, body: repo.to_string() })
    }

    async fn tag_record(&self, repo: &str, tag: &str) -> Result<TagRecord, PortError> {
        self.metadata_calls
            .lock()
            .unwrap()
            .push((repo.to_string(), tag.to_string()));
        self.records
            .get(&(repo.to_string(), tag.to_string()))
            .cloned()
            .ok_or_else(|| PortError::Decode(format!("no manifest for {repo}:{tag}")))
    }

    async fn tag_digest(&self, repo: &str, tag: &str) -> Result<String, PortError> {
        self.digest_calls
            .lock()
            .unwrap()
            .push((repo.to_string(), tag.to_string()));
        self.records
            .get(&(repo.to_string(), tag.to_string()))
            .map(|r| r.digest.clone())
            .ok_or_else(|| PortError::Decode(format!("no manifest for {repo}:{tag}")))
    }

    async fn delete_manifest(&self, repo: &str, digest: &str) -> Result<(), PortError> {
        self.deleted
            .lock()
            .unwrap()
            .push((repo.to_string(), digest.to_string()));
        if self.failing_deletes.contains(digest) {
            return Err(PortError::Status { status: 405, body: "deletes disabled".into() });
        }
        Ok(())
    }
}

/// Scheduler fake recording every call in order.
pub struct FakeScheduler {
    pub job: Option<ClusterJob>,
    pub eval_allocs: Mutex<VecDeque<Vec<AllocationHandle>>>,
    pub alloc_status: ClientStatus,
    pub ps_output: String,
    pub ps_exit: i32,
    pub gc_exit: i32,
    pub fail_deregister: bool,
    pub fail_register_after: Option<usize>,
    pub calls: Mutex<Vec<String>>,
    pub registered: Mutex<Vec<ClusterJob>>,
    pub execs: Mutex<Vec<Vec<String>>>,
}

impl FakeScheduler {
    pub fn new(job: ClusterJob) -> Self {
        Self {
            job: Some(job),
            eval_allocs: Mutex::new(VecDeque::from(vec![vec![AllocationHandle::new(
                "alloc-1",
                ClientStatus::Running,
            )]])),
            alloc_status: ClientStatus::Running,
            ps_output: "PID   COMMAND          COMMAND\n    1 registry         registry serve /etc/docker/registry/config.yml\n   42 sh               sh\n".into(),
            ps_exit: 0,
            gc_exit: 0,
            fail_deregister: false,
            fail_register_after: None,
            calls: Mutex::new(Vec::new()),
            registered: Mutex::new(Vec::new()),
            execs: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn registered(&self) -> Vec<ClusterJob> {
        self.registered.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl SchedulerApi for FakeScheduler {
    async fn job(&self, name: &str) -> Result<Option<ClusterJob>, PortError> {
        self.record(format!("job {name}"));
        Ok(self.job.clone())
    }

    async fn deregister(&self, name: &str, purge: bool) -> Result<(), PortError> {
        self.record(format!("deregister {name} purge={purge}"));
        if self.fail_deregister {
            return Err(PortError::Status { status: 500, body: "rpc error: no leader".into() });
        }
        Ok(())
    }

    async fn register(&self, job: &ClusterJob) -> Result<String, PortError> {
        let mut registered = self.registered.lock().unwrap();
        if self.fail_register_after == Some(registered.len()) {
            return Err(PortError::Status { status: 500, body: "no leader".into() });
        }
        registered.push(job.clone());
        let n = registered.len();
        drop(registered);
        self.record(format!("register read_only={}", job.is_read_only()));
        Ok(format!("eval-{n}"))
    }

    async fn eval_allocations(
        &self,
        eval_id: &str,
        query: QueryOptions,
    ) -> Result<Indexed<Vec<AllocationHandle>>, PortError> {
        self.record(format!("eval_allocations {eval_id} index={}", query.wait_index));
        let mut queue = self.eval_allocs.lock().unwrap();
        let allocs = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(Indexed::new(allocs, query.wait_index + 1))
    }

    async fn allocation(
        &self,
        alloc_id: &str,
        query: QueryOptions,
    ) -> Result<Indexed<Option<AllocationHandle>>, PortError> {
        self.record(format!("allocation {alloc_id}"));
        Ok(Indexed::new(
            Some(AllocationHandle::new(alloc_id, self.alloc_status)),
            query.wait_index + 1,
        ))
    }

    async fn exec(
        &self,
        alloc_id: &str,
        task: &str,
        argv: &[String],
        _cancel: &CancellationToken,
    ) -> Result<ExecOutput, PortError> {
        self.record(format!("exec {alloc_id}/{task} {}", argv.join(" ")));
        self.execs.lock().unwrap().push(argv.to_vec());
        if argv.first().map(String::as_str) == Some("ps") {
            return Ok(ExecOutput {
                exit_code: self.ps_exit,
                stdout: self.ps_output.clone(),
                stderr: String::new(),
            });
        }
        Ok(ExecOutput {
            exit_code: self.gc_exit,
            stdout: "marking blobs\n".into(),
            stderr: String::new(),
        })
    }
}

#[derive(Default)]
pub struct FakeRuntime {
    pub containers: Option<Vec<ContainerSummary>>,
    pub results: HashMap<String, Result<ExecOutput, PortError>>,
    pub execs: Mutex<Vec<(String, Vec<String>)>>,
    /// Fire the caller's token from inside `exec`, as a Ctrl-C during a run would.
    pub cancel_on_exec: bool,
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn containers(&self) -> Result<Vec<ContainerSummary>, PortError> {
        self.containers
            .clone()
            .ok_or_else(|| PortError::Exec("cannot connect to the docker daemon".into()))
    }

    async fn exec(
        &self,
        container_id: &str,
        argv: &[String],
        cancel: &CancellationToken,
    ) -> Result<ExecOutput, PortError> {
        if self.cancel_on_exec {
            cancel.cancel();
        }
        self.execs
            .lock()
            .unwrap()
            .push((container_id.to_string(), argv.to_vec()));
        self.results
            .get(container_id)
            .cloned()
            .unwrap_or_else(|| Ok(ExecOutput::default()))
    }
}
