use crate::connection::Connector;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

/// Opens one HTTP session per worker against a base URL
#[derive(Debug, Clone)]
pub struct HttpConnector {
    base_url: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl HttpConnector {
    pub fn new(base_url: &str, connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            connect_timeout,
            request_timeout,
        }
    }
}

impl Connector for HttpConnector {
    type Connection = HttpSession;

    fn endpoint(&self) -> &str {
        &self.base_url
    }

    /// Builds a dedicated client and probes the endpoint. Any HTTP response
    /// counts as reachable; transport errors fail the connection.
    fn connect(&self, worker_id: usize) -> Result<HttpSession> {
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .pool_max_idle_per_host(1)
            .build()
            .context("Failed to build HTTP client")?;

        let resp = client
            .get(&self.base_url)
            .send()
            .with_context(|| format!("Probe of {} failed", self.base_url))?;

        tracing::debug!(worker_id, status = %resp.status(), "Connected");

        Ok(HttpSession {
            client,
            base_url: self.base_url.clone(),
        })
    }
}

/// An established session owned by a single worker
#[derive(Debug)]
pub struct HttpSession {
    client: Client,
    base_url: String,
}

impl HttpSession {
    /// Session that skips the connect probe, for tests that never send requests
    #[cfg(test)]
    pub(crate) fn offline(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET a resource and read the whole body
    pub fn get(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("GET {} failed", url))?;
        let body = resp
            .bytes()
            .with_context(|| format!("Reading body of {} failed", url))?;
        Ok(body.to_vec())
    }

    /// POST a JSON body and read the whole response
    pub fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Vec<u8>> {
        let url = self.url(path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("POST {} failed", url))?;
        let body = resp
            .bytes()
            .with_context(|| format!("Reading body of {} failed", url))?;
        Ok(body.to_vec())
    }

    pub fn put_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<()> {
        let url = self.url(path);
        self.client
            .put(&url)
            .json(body)
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("PUT {} failed", url))?;
        Ok(())
    }

    /// DELETE a resource; a missing resource is not an error
    pub fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        let resp = self
            .client
            .delete(&url)
            .send()
            .with_context(|| format!("DELETE {} failed", url))?;

        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            anyhow::bail!("DELETE {} returned {}", url, resp.status());
        }
    }
}
