//! Docker Registry HTTP API v2.
use async_trait::async_trait;
use drprune_core::{PortError, RegistryApi};
use drprune_model::TagRecord;
use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, trace};
use url::Url;

use crate::{
    ClientError, RegistryConfig,
    http::{base_url, check, status_error},
};

const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.oci.image.manifest.v1+json, \
     application/vnd.docker.distribution.manifest.v1+prettyjws;q=0.5";
const DIGEST_HEADER: &str = "Docker-Content-Digest";

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    repositories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ImageConfig {
    created: String,
}

pub struct RegistryClient {
    client: Client,
    base: Url,
    cfg: RegistryConfig,
}

impl RegistryClient {
    pub fn new(cfg: RegistryConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(cfg.connect_timeout)
            .danger_accept_invalid_certs(cfg.skip_verify)
            .build()?;

        Ok(Self {
            client,
            base: base_url(&cfg.url)?,
            cfg,
        })
    }

    fn get(&self, url: Url) -> RequestBuilder {
        self.auth(self.client.get(url))
    }

    fn auth(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.cfg.username {
            Some(user) => req.basic_auth(user, self.cfg.password.as_deref()),
            None => req,
        }
    }

    /// Walk the catalog following `Link: <...>; rel="next"` headers.
    pub async fn catalog(&self) -> Result<Vec<String>, ClientError> {
        let mut url = self.base.join("v2/_catalog")?;
        url.query_pairs_mut()
            .append_pair("n", &self.cfg.page_size.to_string());

        let mut repos = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            trace!(target: "drprune::client::registry", %url, "catalog page");
            let resp = check(self.get(url.clone()).send().await?).await?;
            next = match resp.headers().get(header::LINK).and_then(|v| v.to_str().ok()) {
                Some(link) => next_link(link).map(|l| url.join(l)).transpose()?,
                None => None,
            };
            let page: Catalog = resp.json().await?;
            repos.extend(page.repositories);
        }

        debug!(target: "drprune::client::registry", count = repos.len(), "catalog listed");
        Ok(repos)
    }

    pub async fn list_tags(&self, repo: &str) -> Result<Vec<String>, ClientError> {
        let url = self.base.join(&format!("v2/{repo}/tags/list"))?;
        let resp = check(self.get(url).send().await?).await?;
        let list: TagList = resp.json().await?;
        Ok(list.tags.unwrap_or_default())
    }

    /// Digest and creation time of `repo:tag`.
    pub async fn manifest_record(&self, repo: &str, tag: &str) -> Result<TagRecord, ClientError> {
        let (digest, body) = self.manifest(repo, tag).await?;

        let manifest: Value = serde_json::from_slice(&body)?;
        let created = match manifest.pointer("/config/digest").and_then(Value::as_str) {
            Some(config_digest) => self.config_created(repo, config_digest).await?,
            None => schema1_created(&manifest)?,
        };

        Ok(TagRecord::new(repo, tag, digest, parse_created(&created)?))
    }

    /// Digest of the manifest `repo:tag` points to.
    pub async fn manifest_digest(&self, repo: &str, tag: &str) -> Result<String, ClientError> {
        let (digest, _) = self.manifest(repo, tag).await?;
        Ok(digest)
    }

    async fn manifest(&self, repo: &str, tag: &str) -> Result<(String, Vec<u8>), ClientError> {
        let url = self.base.join(&format!("v2/{repo}/manifests/{tag}"))?;
        let resp = check(
            self.get(url)
                .header(header::ACCEPT, MANIFEST_ACCEPT)
                .send()
                .await?,
        )
        .await?;

        let header_digest = resp
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await?;
        let digest = header_digest.unwrap_or_else(|| content_digest(&body));
        Ok((digest, body.to_vec()))
    }

    async fn config_created(&self, repo: &str, digest: &str) -> Result<String, ClientError> {
        let url = self.base.join(&format!("v2/{repo}/blobs/{digest}"))?;
        let resp = check(self.get(url).send().await?).await?;
        let config: ImageConfig = resp.json().await?;
        Ok(config.created)
    }

    pub async fn delete(&self, repo: &str, digest: &str) -> Result<(), ClientError> {
        let url = self.base.join(&format!("v2/{repo}/manifests/{digest}"))?;
        let resp = self.auth(self.client.delete(url)).send().await?;
        let status = resp.status();
        if status != StatusCode::ACCEPTED {
            return Err(status_error(status, resp).await);
        }
        Ok(())
    }
}

/// `sha256:<hex>` of the manifest bytes, for registries that omit the digest header.
fn content_digest(body: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(body))
}

/// Target of the `rel="next"` entry of a `Link` header.
fn next_link(header: &str) -> Option<&str> {
    header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.trim().trim_start_matches("rel=").trim_matches('"') == "next");
        if !is_next {
            return None;
        }
        let target = target.trim();
        target.strip_prefix('<')?.strip_suffix('>')
    })
}

/// Creation time from the newest `v1Compatibility` entry of a schema 1 manifest.
fn schema1_created(manifest: &Value) -> Result<String, ClientError> {
    let compat = manifest
        .pointer("/history/0/v1Compatibility")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::InvalidResponse("manifest has neither config nor history".into()))?;
    let config: ImageConfig = serde_json::from_str(compat)?;
    Ok(config.created)
}

fn parse_created(created: &str) -> Result<OffsetDateTime, ClientError> {
    OffsetDateTime::parse(created, &Rfc3339)
        .map_err(|e| ClientError::InvalidResponse(format!("invalid created time {created:?}: {e}")))
}

#[async_trait]
impl RegistryApi for RegistryClient {
    async fn repositories(&self) -> Result<Vec<String>, PortError> {
        Ok(self.catalog().await?)
    }

    async fn tags(&self, repo: &str) -> Result<Vec<String>, PortError> {
        Ok(self.list_tags(repo).await?)
    }

    async fn tag_record(&self, repo: &str, tag: &str) -> Result<TagRecord, PortError> {
        Ok(self.manifest_record(repo, tag).await?)
    }

    async fn tag_digest(&self, repo: &str, tag: &str) -> Result<String, PortError> {
        Ok(self.manifest_digest(repo, tag).await?)
    }

    async fn delete_manifest(&self, repo: &str, digest: &str) -> Result<(), PortError> {
        Ok(self.delete(repo, digest).await?)
    }
}
