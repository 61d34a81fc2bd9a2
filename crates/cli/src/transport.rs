//! Blocking HTTP transport backed by reqwest

use accessgate_core::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use std::time::Duration;
use tracing::debug;

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    token: Option<String>,
    timeout_secs: u64,
}

impl HttpTransport {
    /// Builds a client that attaches `token` as a bearer credential.
    pub fn new(timeout_secs: u64, token: Option<String>) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            token,
            timeout_secs,
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Patch => self.client.patch(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };
        if let Some(ref token) = self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout_secs)
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        debug!(method = %request.method, url = %request.url, status, "http response");

        Ok(HttpResponse::new(status, body))
    }
}
