//! Consul KV reads.
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use drprune_core::{ConfigStore, PortError};
use drprune_model::KeyValue;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::trace;
use url::Url;

use crate::{
    ClientError, ConsulConfig,
    http::{base_url, check},
};

const TOKEN_HEADER: &str = "X-Consul-Token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KvEntry {
    key: String,
    /// Base64, `null` for folder keys.
    value: Option<String>,
}

pub struct ConsulKv {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl ConsulKv {
    pub fn new(cfg: ConsulConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: Client::new(),
            base: base_url(&cfg.addr)?,
            token: cfg.token,
        })
    }

    /// Every key under the folder `path`; `None` when nothing exists there.
    pub async fn list_folder(&self, path: &str) -> Result<Option<Vec<KeyValue>>, ClientError> {
        let folder = format!("{}/", path.trim_matches('/'));
        let mut url = self.base.join("v1/kv/")?.join(&folder)?;
        url.query_pairs_mut().append_pair("recurse", "true");
        trace!(target: "drprune::client::consul", %url, "kv list");

        let mut req = self.client.get(url);
        if let Some(token) = &self.token {
            req = req.header(TOKEN_HEADER, token);
        }
        let resp = req.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let entries: Vec<KvEntry> = check(resp).await?.json().await?;
        entries
            .into_iter()
            .map(|entry| {
                let value = match entry.value {
                    Some(encoded) => STANDARD.decode(encoded.as_bytes()).map_err(|e| {
                        ClientError::InvalidResponse(format!("{}: invalid base64 value: {e}", entry.key))
                    })?,
                    None => Vec::new(),
                };
                Ok(KeyValue::new(entry.key, value))
            })
            .collect::<Result<Vec<_>, ClientError>>()
            .map(Some)
    }
}

#[async_trait]
impl ConfigStore for ConsulKv {
    async fn list(&self, path: &str) -> Result<Option<Vec<KeyValue>>, PortError> {
        Ok(self.list_folder(path).await?)
    }
}
