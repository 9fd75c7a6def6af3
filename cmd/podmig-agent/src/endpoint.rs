use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use pkg_constants::timing::{
    CHECKPOINT_RETRY_ATTEMPTS, CHECKPOINT_RETRY_FACTOR, CHECKPOINT_RETRY_INITIAL_SECS,
};

/// Response body of the host's checkpoint endpoint.
#[derive(Debug, Deserialize)]
struct CheckpointItems {
    #[serde(default)]
    items: Vec<String>,
}

/// First archive path out of a checkpoint response body. An empty `items`
/// array counts as a failure so the retry loop runs again.
fn parse_archive_response(body: &[u8]) -> Result<String> {
    let parsed: CheckpointItems =
        serde_json::from_slice(body).context("malformed checkpoint endpoint response")?;
    match parsed.items.into_iter().next() {
        Some(archive) => Ok(archive),
        None => bail!("checkpoint endpoint returned no archive"),
    }
}

/// HTTPS client for the host runtime's per-node checkpoint endpoint,
/// authenticated with the node's kubelet-style client credential.
pub struct CheckpointEndpointClient {
    http: reqwest::Client,
    base: String,
}

impl CheckpointEndpointClient {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let tls = crate::tls::client_config()?;
        let http = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base: format!("https://{}:{}", host, port),
        })
    }

    /// POST the checkpoint request, retrying with bounded exponential
    /// backoff. Returns the host-local path of the produced archive.
    pub async fn checkpoint(&self, namespace: &str, pod: &str, container: &str) -> Result<String> {
        let url = format!("{}/checkpoint/{}/{}/{}", self.base, namespace, pod, container);
        let mut delay = Duration::from_secs(CHECKPOINT_RETRY_INITIAL_SECS);
        let mut last_error = String::new();

        for attempt in 1..=CHECKPOINT_RETRY_ATTEMPTS {
            if attempt > 1 {
                tokio::time::sleep(delay).await;
                delay *= CHECKPOINT_RETRY_FACTOR;
            }
            match self.try_checkpoint(&url).await {
                Ok(archive) => {
                    info!(%url, attempt, %archive, "host checkpoint complete");
                    return Ok(archive);
                }
                Err(e) => {
                    warn!(%url, attempt, error = %e, "host checkpoint attempt failed");
                    last_error = e.to_string();
                }
            }
        }
        bail!(
            "checkpoint endpoint failed after {} attempts: {}",
            CHECKPOINT_RETRY_ATTEMPTS,
            last_error
        )
    }

    async fn try_checkpoint(&self, url: &str) -> Result<String> {
        let response = self.http.post(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("checkpoint endpoint returned {}", status);
        }
        let body = response.bytes().await?;
        parse_archive_response(&body)
    }
}
