use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde_json::Value as Json;
use tracing::{debug, instrument};

use crate::auth::TokenSource;
use crate::error::{error_details, ArmError};
use crate::transport::{ArmRequest, ArmResponse, Method, Transport};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Resource Manager client shared by every service.
///
/// Write methods block until the long-running operation they start reaches a
/// terminal state; the caller bounds the whole call with its own timeout.
#[derive(Clone)]
pub struct ArmClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenSource>,
    endpoint: String,
    poll_interval: Duration,
}

impl ArmClient {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<dyn TokenSource>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            tokens,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Used when the service sends no `Retry-After`.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn endpoint(&self) -> &str { &self.endpoint }

    /// Binds this client to one API version.
    pub fn service(&self, api_version: &'static str) -> ServiceClient {
        ServiceClient { arm: self.clone(), api_version }
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        let sep = if path.contains('?') { '&' } else { '?' };
        format!("{}{}{}api-version={}", self.endpoint, path, sep, api_version)
    }

    async fn send(&self, method: Method, url: &str, body: Option<Json>) -> Result<ArmResponse, ArmError> {
        let token = self.tokens.token().await?;
        let request = ArmRequest {
            method,
            url: url.to_string(),
            headers: vec![("authorization".to_string(), format!("Bearer {}", token.expose_secret()))],
            body,
        };
        let resp = self.transport.send(request).await?;
        debug!(%method, url, status = resp.status, "resource manager call");
        Ok(resp)
    }

    async fn send_checked(&self, method: Method, url: &str, body: Option<Json>) -> Result<ArmResponse, ArmError> {
        let resp = self.send(method, url, body).await?;
        if resp.is_success() {
            Ok(resp)
        } else {
            Err(ArmError::from_response(method, url, resp.status, &resp.body))
        }
    }

    pub async fn get(&self, path: &str, api_version: &str) -> Result<Json, ArmError> {
        Ok(self.send_checked(Method::Get, &self.url(path, api_version), None).await?.body)
    }

    /// Collects `value` across `nextLink` pages.
    pub async fn list(&self, path: &str, api_version: &str) -> Result<Vec<Json>, ArmError> {
        let mut items = Vec::new();
        let mut next = Some(self.url(path, api_version));
        while let Some(url) = next.take() {
            let mut body = expect_object(&url, self.send_checked(Method::Get, &url, None).await?.body)?;
            if let Some(Json::Array(page)) = body.get_mut("value").map(Json::take) {
                items.extend(page);
            }
            next = body.get("nextLink").and_then(Json::as_str).filter(|s| !s.is_empty()).map(str::to_string);
        }
        Ok(items)
    }

    #[instrument(skip(self, body))]
    pub async fn put_then_poll(&self, path: &str, api_version: &str, body: Json) -> Result<Json, ArmError> {
        self.write_then_poll(Method::Put, path, api_version, Some(body)).await
    }

    #[instrument(skip(self, body))]
    pub async fn patch_then_poll(&self, path: &str, api_version: &str, body: Json) -> Result<Json, ArmError> {
        self.write_then_poll(Method::Patch, path, api_version, Some(body)).await
    }

    /// A 404 on the initial request is returned as an error; callers decide
    /// whether an already-missing object counts as deleted.
    #[instrument(skip(self))]
    pub async fn delete_then_poll(&self, path: &str, api_version: &str) -> Result<(), ArmError> {
        self.write_then_poll(Method::Delete, path, api_version, None).await.map(|_| ())
    }

    /// A single POST action such as `listKeys`.
    pub async fn post(&self, path: &str, api_version: &str, body: Option<Json>) -> Result<Json, ArmError> {
        Ok(self.send_checked(Method::Post, &self.url(path, api_version), body).await?.body)
    }

    /// A POST action that may run as a long-running operation, such as `purge`.
    #[instrument(skip(self, body))]
    pub async fn post_then_poll(&self, path: &str, api_version: &str, body: Option<Json>) -> Result<Json, ArmError> {
        self.write_then_poll(Method::Post, path, api_version, body).await
    }

    async fn write_then_poll(&self, method: Method, path: &str, api_version: &str, body: Option<Json>) -> Result<Json, ArmError> {
        let url = self.url(path, api_version);
        let initial = self.send_checked(method, &url, body).await?;
        self.poll(method, &url, initial).await
    }

    /// Follows `Azure-AsyncOperation`, then `Location`, then the resource's own
    /// `provisioningState` until the operation is terminal.
    async fn poll(&self, method: Method, resource_url: &str, initial: ArmResponse) -> Result<Json, ArmError> {
        if let Some(op_url) = initial.header("azure-asyncoperation").map(str::to_string) {
            let status_body = self.poll_operation(&op_url, &initial).await?;
            return match method {
                Method::Put | Method::Patch => Ok(self.send_checked(Method::Get, resource_url, None).await?.body),
                Method::Delete => Ok(Json::Null),
                Method::Post => match initial.header("location") {
                    Some(loc) => Ok(self.send_checked(Method::Get, loc, None).await?.body),
                    None => Ok(status_body.get("properties").cloned().unwrap_or(Json::Null)),
                },
                Method::Get => Ok(initial.body),
            };
        }

        if initial.status == 202 {
            if let Some(loc) = initial.header("location").map(str::to_string) {
                return self.poll_location(method, &loc, &initial).await;
            }
            return Ok(initial.body);
        }

        if matches!(method, Method::Put | Method::Patch) && !is_terminal(provisioning_state(&initial.body)) {
            return self.poll_provisioning_state(resource_url, &initial).await;
        }
        Ok(initial.body)
    }

    async fn poll_operation(&self, op_url: &str, initial: &ArmResponse) -> Result<Json, ArmError> {
        let mut wait = initial.retry_after().unwrap_or(self.poll_interval);
        loop {
            tokio::time::sleep(wait).await;
            let mut resp = self.send_checked(Method::Get, op_url, None).await?;
            resp.body = expect_object(op_url, resp.body)?;
            let status = resp.body.get("status").and_then(Json::as_str).unwrap_or("InProgress").to_string();
            match status.to_ascii_lowercase().as_str() {
                "succeeded" => return Ok(resp.body),
                "failed" | "canceled" | "cancelled" => {
                    let (code, message) = error_details(&resp.body);
                    return Err(ArmError::OperationFailed { url: op_url.to_string(), status, code, message });
                }
                _ => wait = resp.retry_after().unwrap_or(self.poll_interval),
            }
        }
    }

    async fn poll_location(&self, method: Method, location: &str, initial: &ArmResponse) -> Result<Json, ArmError> {
        let mut wait = initial.retry_after().unwrap_or(self.poll_interval);
        loop {
            tokio::time::sleep(wait).await;
            let resp = self.send(Method::Get, location, None).await?;
            match resp.status {
                202 => wait = resp.retry_after().unwrap_or(self.poll_interval),
                204 => return Ok(Json::Null),
                404 if method == Method::Delete => return Ok(Json::Null),
                s if (200..300).contains(&s) => return Ok(resp.body),
                s => return Err(ArmError::from_response(Method::Get, location, s, &resp.body)),
            }
        }
    }

    async fn poll_provisioning_state(&self, resource_url: &str, initial: &ArmResponse) -> Result<Json, ArmError> {
        let mut wait = initial.retry_after().unwrap_or(self.poll_interval);
        loop {
            tokio::time::sleep(wait).await;
            let resp = self.send_checked(Method::Get, resource_url, None).await?;
            let state = provisioning_state(&resp.body);
            if !is_terminal(state) {
                wait = resp.retry_after().unwrap_or(self.poll_interval);
                continue;
            }
            if state.eq_ignore_ascii_case("succeeded") {
                return Ok(resp.body);
            }
            let (code, message) = error_details(&resp.body);
            return Err(ArmError::OperationFailed { url: resource_url.to_string(), status: state.to_string(), code, message });
        }
    }
}

/// Pages and operation statuses are always objects; a proxy's HTML page is not.
fn expect_object(url: &str, body: Json) -> Result<Json, ArmError> {
    match body {
        Json::Object(_) => Ok(body),
        Json::String(text) => {
            let preview: String = text.chars().take(80).collect();
            Err(ArmError::Decode { url: url.to_string(), message: format!("expected a JSON object, got {preview:?}") })
        }
        other => Err(ArmError::Decode { url: url.to_string(), message: format!("expected a JSON object, got {other}") }),
    }
}

fn provisioning_state(body: &Json) -> &str {
    body.pointer("/properties/provisioningState").and_then(Json::as_str).unwrap_or("Succeeded")
}

fn is_terminal(state: &str) -> bool {
    ["succeeded", "failed", "canceled", "cancelled"].iter().any(|s| s.eq_ignore_ascii_case(state))
}

/// [`ArmClient`] pinned to one service's API version.
#[derive(Clone)]
pub struct ServiceClient {
    arm: ArmClient,
    api_version: &'static str,
}

impl ServiceClient {
    pub fn api_version(&self) -> &'static str { self.api_version }

    pub async fn get(&self, path: &str) -> Result<Json, ArmError> { self.arm.get(path, self.api_version).await }
    pub async fn list(&self, path: &str) -> Result<Vec<Json>, ArmError> { self.arm.list(path, self.api_version).await }
    pub async fn put_then_poll(&self, path: &str, body: Json) -> Result<Json, ArmError> { self.arm.put_then_poll(path, self.api_version, body).await }
    pub async fn patch_then_poll(&self, path: &str, body: Json) -> Result<Json, ArmError> { self.arm.patch_then_poll(path, self.api_version, body).await }
    pub async fn delete_then_poll(&self, path: &str) -> Result<(), ArmError> { self.arm.delete_then_poll(path, self.api_version).await }
    pub async fn post(&self, path: &str, body: Option<Json>) -> Result<Json, ArmError> { self.arm.post(path, self.api_version, body).await }
    pub async fn post_then_poll(&self, path: &str, body: Option<Json>) -> Result<Json, ArmError> { self.arm.post_then_poll(path, self.api_version, body).await }
}
