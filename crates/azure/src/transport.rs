use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as Json;

use crate::error::ArmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Patch,
    Delete,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Post => "POST",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ArmRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Json>,
}

#[derive(Debug, Clone, Default)]
pub struct ArmResponse {
    pub status: u16,
    /// Lowercased header names.
    pub headers: BTreeMap<String, String>,
    /// `Null` for empty bodies, a JSON string for non-JSON bodies.
    pub body: Json,
}

impl ArmResponse {
    pub fn new(status: u16, body: Json) -> Self {
        Self { status, headers: BTreeMap::new(), body }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }

    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")?.trim().parse().ok().map(Duration::from_secs)
    }
}

/// Sends one request to Resource Manager. Implementations do not retry or poll.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ArmRequest) -> Result<ArmResponse, ArmError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ArmError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("azrm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ArmError::Transport { method: Method::Get, url: String::new(), message: e.to_string() })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ArmRequest) -> Result<ArmResponse, ArmError> {
        let ArmRequest { method, url, headers, body } = request;
        let transport_err = |e: reqwest::Error| ArmError::Transport { method, url: url.clone(), message: e.to_string() };

        let verb = match method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(verb, &url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &body {
            Some(b) => builder.json(b),
            None if method == Method::Post => builder.header("content-length", "0"),
            None => builder,
        };

        let resp = builder.send().await.map_err(transport_err)?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_ascii_lowercase(), v.to_string())))
            .collect();
        let bytes = resp.bytes().await.map_err(transport_err)?;
        let body = if bytes.is_empty() {
            Json::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Json::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok(ArmResponse { status, headers, body })
    }
}
