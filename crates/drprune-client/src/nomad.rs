//! Nomad HTTP API with blocking queries; `alloc exec` goes through the CLI.
use async_trait::async_trait;
use drprune_core::{Indexed, PortError, QueryOptions, SchedulerApi};
use drprune_exec::NomadExec;
use drprune_model::{AllocationHandle, ClusterJob, ExecOutput, WaitIndex};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use crate::{
    ClientError, NomadConfig,
    http::{base_url, check},
};

const TOKEN_HEADER: &str = "X-Nomad-Token";
const INDEX_HEADER: &str = "X-Nomad-Index";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RegisterRequest<'a> {
    job: &'a ClusterJob,
}

#[derive(Deserialize)]
struct RegisterResponse {
    #[serde(rename = "EvalID")]
    eval_id: String,
}

pub struct NomadClient {
    client: Client,
    base: Url,
    token: Option<String>,
    exec: NomadExec,
}

impl NomadClient {
    pub fn new(cfg: NomadConfig) -> Result<Self, ClientError> {
        let exec = NomadExec::new(&cfg.addr, cfg.token.clone()).with_binary(&cfg.binary);
        Ok(Self {
            client: Client::new(),
            base: base_url(&cfg.addr)?,
            token: cfg.token,
            exec,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path)?)
    }

    fn with_token(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.header(TOKEN_HEADER, token),
            None => req,
        }
    }

    /// Blocking query: `index` and `wait` are only sent once an index is known.
    async fn blocking_get(&self, mut url: Url, q: QueryOptions) -> Result<Response, ClientError> {
        if q.wait_index > 0 {
            url.query_pairs_mut()
                .append_pair("index", &q.wait_index.to_string())
                .append_pair("wait", &format!("{}ms", q.wait_time.as_millis()));
        }
        trace!(target: "drprune::client::nomad", %url, "blocking query");
        Ok(self.with_token(self.client.get(url)).send().await?)
    }

    pub async fn read_job(&self, name: &str) -> Result<Option<ClusterJob>, ClientError> {
        let resp = self
            .with_token(self.client.get(self.url(&format!("v1/job/{name}"))?))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(resp).await?.json().await?))
    }

    pub async fn stop_job(&self, name: &str, purge: bool) -> Result<(), ClientError> {
        let mut url = self.url(&format!("v1/job/{name}"))?;
        url.query_pairs_mut().append_pair("purge", &purge.to_string());
        check(self.with_token(self.client.delete(url)).send().await?).await?;
        debug!(target: "drprune::client::nomad", job = name, purge, "job deregistered");
        Ok(())
    }

    pub async fn submit_job(&self, job: &ClusterJob) -> Result<String, ClientError> {
        let resp = self
            .with_token(self.client.post(self.url("v1/jobs")?))
            .json(&RegisterRequest { job })
            .send()
            .await?;
        let registered: RegisterResponse = check(resp).await?.json().await?;
        debug!(target: "drprune::client::nomad", eval = %registered.eval_id, "job registered");
        Ok(registered.eval_id)
    }

    pub async fn allocations_of(
        &self,
        eval_id: &str,
        q: QueryOptions,
    ) -> Result<Indexed<Vec<AllocationHandle>>, ClientError> {
        let url = self.url(&format!("v1/evaluation/{eval_id}/allocations"))?;
        let resp = check(self.blocking_get(url, q).await?).await?;
        let index = last_index(&resp, q.wait_index);
        Ok(Indexed::new(resp.json().await?, index))
    }

    pub async fn read_allocation(
        &self,
        alloc_id: &str,
        q: QueryOptions,
    ) -> Result<Indexed<Option<AllocationHandle>>, ClientError> {
        let url = self.url(&format!("v1/allocation/{alloc_id}"))?;
        let resp = self.blocking_get(url, q).await?;
        let index = last_index(&resp, q.wait_index);
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Indexed::new(None, index));
        }
        Ok(Indexed::new(Some(check(resp).await?.json().await?), index))
    }
}

/// `X-Nomad-Index` of the response, `fallback` when absent or unparsable.
fn last_index(resp: &Response, fallback: WaitIndex) -> WaitIndex {
    resp.headers()
        .get(INDEX_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

#[async_trait]
impl SchedulerApi for NomadClient {
    async fn job(&self, name: &str) -> Result<Option<ClusterJob>, PortError> {
        Ok(self.read_job(name).await?)
    }

    async fn deregister(&self, name: &str, purge: bool) -> Result<(), PortError> {
        Ok(self.stop_job(name, purge).await?)
    }

    async fn register(&self, job: &ClusterJob) -> Result<String, PortError> {
        Ok(self.submit_job(job).await?)
    }

    async fn eval_allocations(
        &self,
        eval_id: &str,
        query: QueryOptions,
    ) -> Result<Indexed<Vec<AllocationHandle>>, PortError> {
        Ok(self.allocations_of(eval_id, query).await?)
    }

    async fn allocation(
        &self,
        alloc_id: &str,
        query: QueryOptions,
    ) -> Result<Indexed<Option<AllocationHandle>>, PortError> {
        Ok(self.read_allocation(alloc_id, query).await?)
    }

    async fn exec(
        &self,
        alloc_id: &str,
        task: &str,
        argv: &[String],
        cancel: &CancellationToken,
    ) -> Result<ExecOutput, PortError> {
        Ok(self.exec.exec(alloc_id, task, argv, cancel).await?)
    }
}
