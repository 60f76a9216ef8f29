//! HTTP blob fragment source.
//!
//! Fetches `GET {base_url}/{scope}/{key}` when a scope is given, falling back
//! to `GET {base_url}/{key}`. Works with any blob container that serves
//! objects over plain HTTP(S), including SAS-signed URLs supplied as the base.

use async_trait::async_trait;
use planlens_core::error::{Error, Result};
use planlens_core::fragment::FragmentSource;
use tracing::{debug, warn};

pub struct HttpBlobSource {
    base_url: String,
    /// Query string appended to every object URL (e.g. a SAS token)
    query: Option<String>,
    client: reqwest::Client,
}

impl HttpBlobSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        let (base, query) = match base_url.split_once('?') {
            Some((base, query)) => (base.to_string(), Some(query.to_string())),
            None => (base_url, None),
        };
        Self {
            base_url: base.trim_end_matches('/').to_string(),
            query,
            client: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn object_url(&self, scope: Option<&str>, key: &str) -> String {
        let path = match scope {
            Some(scope) => format!("{}/{}/{}", self.base_url, scope, key),
            None => format!("{}/{}", self.base_url, key),
        };
        match &self.query {
            Some(query) => format!("{path}?{query}"),
            None => path,
        }
    }

    async fn get(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("GET {url}: {e}")))?;

        let status = response.status().as_u16();
        if status == 404 {
            return Ok(None);
        }
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Prompt storage returned error");
            return Err(Error::Storage(format!("GET {url}: status {status}")));
        }

        response
            .text()
            .await
            .map(Some)
            .map_err(|e| Error::Storage(format!("GET {url}: {e}")))
    }
}

#[async_trait]
impl FragmentSource for HttpBlobSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, scope: Option<&str>, key: &str) -> Result<String> {
        if let Some(scope) = scope {
            if let Some(text) = self.get(&self.object_url(Some(scope), key)).await? {
                return Ok(text);
            }
            debug!(key, scope, "No scoped fragment, trying root");
        }

        self.get(&self.object_url(None, key))
            .await?
            .ok_or_else(|| Error::fragment_not_found(key))
    }
}
