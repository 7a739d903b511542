//! HTTP implementation of [`Upstream`] on top of a blocking `ureq` agent.

use std::time::Duration;

use async_trait::async_trait;
use mirra_utils::name;
use tracing::{debug, trace};
use ureq::{http::header::ACCEPT, Agent};
use url::Url;

use crate::{
    error::{RegistryError, Result},
    upstream::{classify_document, Upstream, UpstreamPackage},
    user::UpstreamUser,
};

const USER_AGENT: &str = "mirra";

/// Package documents of popular packages run to tens of megabytes.
const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// Upstream registry reached over HTTP.
#[derive(Clone)]
pub struct HttpUpstream {
    base: String,
    agent: Agent,
}

impl HttpUpstream {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base).map_err(|err| RegistryError::InvalidUrl(err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RegistryError::InvalidUrl(base.to_string()));
        }

        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .user_agent(USER_AGENT)
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            agent,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `@scope/name` travels as a single path segment.
    fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.base, name.replace('/', "%2f"))
    }

    fn user_url(&self, name: &str) -> String {
        format!(
            "{}/-/user/org.couchdb.user:{}",
            self.base,
            name::encode_segment(name)
        )
    }

    async fn request(&self, method: &'static str, url: String) -> Result<(u16, Vec<u8>)> {
        let agent = self.agent.clone();
        trace!(method, url = %url, "upstream request");

        tokio::task::spawn_blocking(move || -> Result<(u16, Vec<u8>)> {
            let mut resp = match method {
                "PUT" => agent.put(&url).header(ACCEPT, "application/json").send_empty()?,
                _ => agent.get(&url).header(ACCEPT, "application/json").call()?,
            };
            let status = resp.status().as_u16();
            let body = resp
                .body_mut()
                .with_config()
                .limit(MAX_BODY_BYTES)
                .read_to_vec()?;
            Ok((status, body))
        })
        .await
        .map_err(|err| RegistryError::TaskFailed(err.to_string()))?
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch_package(&self, name: &str) -> Result<UpstreamPackage> {
        name::validate(name)?;
        let url = self.package_url(name);
        debug!("fetching package document from {}", url);

        let (status, body) = self.request("GET", url).await?;
        classify_document(name, status, &body)
    }

    async fn fetch_user(&self, name: &str) -> Result<Option<UpstreamUser>> {
        let url = self.user_url(name);
        let (status, body) = self.request("GET", url).await?;

        match status {
            200..=299 => Ok(Some(serde_json::from_slice(&body)?)),
            404 => Ok(None),
            status => {
                Err(RegistryError::FailedToFetchRemote(format!(
                    "user {name} [{status}]"
                )))
            }
        }
    }

    async fn fetch_tarball(&self, url: &str) -> Result<Vec<u8>> {
        Url::parse(url).map_err(|err| RegistryError::InvalidUrl(format!("{url}: {err}")))?;
        let (status, body) = self.request("GET", url.to_string()).await?;

        if !(200..300).contains(&status) {
            return Err(RegistryError::FailedToFetchRemote(format!(
                "{url} [{status}]"
            )));
        }
        Ok(body)
    }

    async fn request_sync(&self, name: &str) -> Result<()> {
        let url = format!("{}/sync?publish=true&nodeps=true", self.package_url(name));
        let (status, _) = self.request("PUT", url).await?;

        if !(200..300).contains(&status) {
            return Err(RegistryError::FailedToFetchRemote(format!(
                "sync {name} [{status}]"
            )));
        }
        Ok(())
    }
}
