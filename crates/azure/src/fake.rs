//! An in-memory Resource Manager for exercising handlers without Azure.
//!
//! PUT creates or replaces, PATCH merges (tags are replaced), DELETE cascades to child IDs and
//! GET answers 404 for anything unknown. Creates and deletes complete through
//! `Azure-AsyncOperation` / `Location` polling with `Retry-After: 0` so the
//! client's poller runs on every write.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as Json};

use crate::auth::StaticToken;
use crate::client::ArmClient;
use crate::error::ArmError;
use crate::transport::{ArmRequest, ArmResponse, Method, Transport};

pub const FAKE_ENDPOINT: &str = "https://management.fake.local";
const OPERATIONS: &str = "/fake/operations/";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub body: Option<Json>,
}

#[derive(Default)]
struct State {
    resources: BTreeMap<String, Json>,
    canned: HashMap<(Method, String), Json>,
    failures: Vec<(Method, String, ArmResponse)>,
    failing_operations: Vec<(Method, String, Json)>,
    operations: HashMap<u64, ArmResponse>,
    next_operation: u64,
    requests: Vec<Recorded>,
}

#[derive(Default)]
pub struct FakeArm {
    state: Mutex<State>,
}

impl FakeArm {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// A client wired to this fake with a static token and no polling delay.
    pub fn client(self: &Arc<Self>) -> ArmClient {
        ArmClient::new(self.clone(), Arc::new(StaticToken::new("fake-token")), FAKE_ENDPOINT).with_poll_interval(Duration::ZERO)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores an object as if it had been created out of band.
    pub fn seed(&self, path: &str, body: Json) {
        self.lock().resources.insert(path.to_ascii_lowercase(), stored(path, body));
    }

    pub fn resource(&self, path: &str) -> Option<Json> {
        self.lock().resources.get(&path.to_ascii_lowercase()).cloned()
    }

    /// Answers every `method` on `path` with `200` and `body`.
    pub fn respond(&self, method: Method, path: &str, body: Json) {
        self.lock().canned.insert((method, path.to_ascii_lowercase()), body);
    }

    /// Fails the next `method` on `path` with an ARM error body.
    pub fn fail_next(&self, method: Method, path: &str, status: u16, code: &str, message: &str) {
        let resp = ArmResponse::new(status, json!({ "error": { "code": code, "message": message } }));
        self.lock().failures.push((method, path.to_ascii_lowercase(), resp));
    }

    /// Accepts the next `method` on `path` but reports its operation as `Failed`.
    pub fn fail_operation_next(&self, method: Method, path: &str, code: &str, message: &str) {
        let error = json!({ "code": code, "message": message });
        self.lock().failing_operations.push((method, path.to_ascii_lowercase(), error));
    }

    pub fn requests(&self) -> Vec<Recorded> { self.lock().requests.clone() }

    /// Requests with this method whose path ends with `suffix` (case-insensitive).
    pub fn count(&self, method: Method, suffix: &str) -> usize {
        let suffix = suffix.to_ascii_lowercase();
        self.lock().requests.iter().filter(|r| r.method == method && r.path.to_ascii_lowercase().ends_with(&suffix)).count()
    }
}

fn stored(path: &str, mut body: Json) -> Json {
    if !body.is_object() {
        body = json!({});
    }
    body["id"] = json!(path);
    body["name"] = json!(path.rsplit('/').next().unwrap_or_default());
    if !body["properties"].is_object() {
        body["properties"] = json!({});
    }
    body["properties"]["provisioningState"] = json!("Succeeded");
    body
}

fn merge(target: &mut Json, patch: Json) {
    match (target, patch) {
        (Json::Object(t), Json::Object(p)) => {
            for (k, v) in p {
                merge(t.entry(k).or_insert(Json::Null), v);
            }
        }
        (t, p) => *t = p,
    }
}

fn not_found(path: &str) -> ArmResponse {
    ArmResponse::new(404, json!({ "error": { "code": "ResourceNotFound", "message": format!("The Resource '{path}' was not found.") } }))
}

impl State {
    fn operation(&mut self, resp: ArmResponse) -> String {
        self.next_operation += 1;
        self.operations.insert(self.next_operation, resp);
        format!("{FAKE_ENDPOINT}{OPERATIONS}{}", self.next_operation)
    }

    fn take_failing_operation(&mut self, method: Method, lower: &str) -> Option<Json> {
        let i = self.failing_operations.iter().position(|(m, p, _)| *m == method && p == lower)?;
        Some(self.failing_operations.remove(i).2)
    }

    /// Top-level resources inside a resource group.
    fn list_group(&self, group: &str) -> ArmResponse {
        let prefix = format!("{group}/providers/");
        let value: Vec<Json> = self
            .resources
            .iter()
            .filter(|(k, _)| k.strip_prefix(&prefix).is_some_and(|rest| rest.split('/').count() == 3))
            .map(|(_, v)| json!({ "id": v["id"], "name": v["name"], "type": v["type"] }))
            .collect();
        ArmResponse::new(200, json!({ "value": value }))
    }

    fn handle(&mut self, method: Method, path: &str, body: Option<Json>) -> ArmResponse {
        let lower = path.to_ascii_lowercase();

        if let Some(i) = self.failures.iter().position(|(m, p, _)| *m == method && *p == lower) {
            return self.failures.remove(i).2;
        }
        if let Some(id) = lower.strip_prefix(OPERATIONS) {
            return id.parse().ok().and_then(|n: u64| self.operations.get(&n).cloned()).unwrap_or_else(|| not_found(path));
        }
        if let Some(canned) = self.canned.get(&(method, lower.clone())) {
            return ArmResponse::new(200, canned.clone());
        }

        match method {
            Method::Get => {
                if let Some(group) = lower.strip_suffix("/resources").filter(|g| g.contains("/resourcegroups/")) {
                    return self.list_group(group);
                }
                match self.resources.get(&lower) {
                    Some(v) => ArmResponse::new(200, v.clone()),
                    None => not_found(path),
                }
            }
            Method::Put => {
                if let Some(error) = self.take_failing_operation(method, &lower) {
                    let op = self.operation(ArmResponse::new(200, json!({ "status": "Failed", "error": error })));
                    return ArmResponse::new(201, Json::Null).with_header("azure-asyncoperation", op).with_header("retry-after", "0");
                }
                let existed = self.resources.contains_key(&lower);
                let value = stored(path, body.unwrap_or(Json::Null));
                self.resources.insert(lower, value.clone());
                if existed {
                    return ArmResponse::new(200, value);
                }
                let op = self.operation(ArmResponse::new(200, json!({ "status": "Succeeded" })));
                ArmResponse::new(201, value).with_header("azure-asyncoperation", op).with_header("retry-after", "0")
            }
            Method::Patch => {
                let Some(current) = self.resources.get_mut(&lower) else { return not_found(path) };
                let patch = body.unwrap_or(Json::Null);
                // tags are replaced as a whole, never merged
                if let Some(tags) = patch.get("tags") {
                    current["tags"] = tags.clone();
                }
                merge(current, patch);
                let result = current.clone();
                let op = self.operation(ArmResponse::new(200, result));
                ArmResponse::new(202, Json::Null).with_header("location", op).with_header("retry-after", "0")
            }
            Method::Delete => {
                if self.resources.remove(&lower).is_none() {
                    return ArmResponse::new(204, Json::Null);
                }
                let children = format!("{lower}/");
                self.resources.retain(|k, _| !k.starts_with(&children));
                let op = self.operation(ArmResponse::new(204, Json::Null));
                ArmResponse::new(202, Json::Null).with_header("location", op).with_header("retry-after", "0")
            }
            Method::Post => ArmResponse::new(200, Json::Null),
        }
    }
}

#[async_trait]
impl Transport for FakeArm {
    async fn send(&self, request: ArmRequest) -> Result<ArmResponse, ArmError> {
        let url = request.url.strip_prefix(FAKE_ENDPOINT).unwrap_or(&request.url);
        let path = url.split('?').next().unwrap_or_default().to_string();
        let mut state = self.lock();
        state.requests.push(Recorded { method: request.method, path: path.clone(), body: request.body.clone() });
        Ok(state.handle(request.method, &path, request.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RG: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg1";
    const API: &str = "2022-09-01";

    #[tokio::test]
    async fn put_polls_the_async_operation_then_reads() {
        let fake = FakeArm::new();
        let client = fake.client();
        let body = client.put_then_poll(RG, API, json!({ "location": "westeurope" })).await.unwrap();
        assert_eq!(body["name"], json!("rg1"));
        assert_eq!(fake.count(Method::Get, "/fake/operations/1"), 1);
        assert_eq!(fake.count(Method::Get, "/resourceGroups/rg1"), 1);
    }

    #[tokio::test]
    async fn missing_objects_are_not_found() {
        let client = FakeArm::new().client();
        let err = client.get(RG, API).await.unwrap_err();
        assert!(err.was_not_found());
    }

    #[tokio::test]
    async fn delete_cascades_to_children() {
        let fake = FakeArm::new();
        let child = format!("{RG}/providers/Microsoft.AppConfiguration/configurationStores/cfg1");
        fake.seed(RG, json!({ "location": "westeurope" }));
        fake.seed(&child, json!({}));
        let client = fake.client();
        assert_eq!(client.list(&format!("{RG}/resources"), API).await.unwrap().len(), 1);
        client.delete_then_poll(RG, API).await.unwrap();
        assert!(fake.resource(&child).is_none());
    }

    #[tokio::test]
    async fn patch_merges_and_follows_location() {
        let fake = FakeArm::new();
        fake.seed(RG, json!({ "location": "westeurope", "tags": { "a": "1" } }));
        let body = fake.client().patch_then_poll(RG, API, json!({ "tags": { "b": "2" }, "properties": { "x": true } })).await.unwrap();
        assert_eq!(body["tags"], json!({ "b": "2" }));
        assert_eq!(body["properties"]["x"], json!(true));
        assert_eq!(body["properties"]["provisioningState"], json!("Succeeded"));
        assert_eq!(body["location"], json!("westeurope"));
    }

    #[tokio::test]
    async fn failed_operations_surface_their_error() {
        let fake = FakeArm::new();
        fake.fail_operation_next(Method::Put, RG, "QuotaExceeded", "no capacity");
        let err = fake.client().put_then_poll(RG, API, json!({})).await.unwrap_err();
        match err {
            ArmError::OperationFailed { status, code, message, .. } => {
                assert_eq!((status.as_str(), code.as_str(), message.as_str()), ("Failed", "QuotaExceeded", "no capacity"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn put_waits_for_provisioning_state() {
        let fake = FakeArm::new();
        fake.respond(Method::Put, RG, json!({ "properties": { "provisioningState": "Creating" } }));
        fake.seed(RG, json!({ "location": "westeurope" }));
        let body = fake.client().put_then_poll(RG, API, json!({})).await.unwrap();
        assert_eq!(body["properties"]["provisioningState"], json!("Succeeded"));
    }

    #[tokio::test]
    async fn list_follows_next_link() {
        let fake = FakeArm::new();
        let first = format!("{RG}/providers/Microsoft.Example/things");
        fake.respond(Method::Get, &first, json!({ "value": [1], "nextLink": format!("{FAKE_ENDPOINT}/page2?api-version={API}") }));
        fake.respond(Method::Get, "/page2", json!({ "value": [2, 3] }));
        let items = fake.client().list(&first, API).await.unwrap();
        assert_eq!(items, vec![json!(1), json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn list_pages_that_are_not_json_objects_fail_to_decode() {
        let fake = FakeArm::new();
        let things = format!("{RG}/providers/Microsoft.Example/things");
        fake.respond(Method::Get, &things, json!("<html>gateway timeout</html>"));
        match fake.client().list(&things, API).await.unwrap_err() {
            ArmError::Decode { url, message } => {
                assert!(url.ends_with(&format!("things?api-version={API}")), "{url}");
                assert!(message.contains("gateway timeout"), "{message}");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn injected_failures_are_one_shot() {
        let fake = FakeArm::new();
        fake.seed(RG, json!({}));
        fake.fail_next(Method::Get, RG, 429, "TooManyRequests", "slow down");
        let client = fake.client();
        assert!(client.get(RG, API).await.unwrap_err().was_status(429));
        assert!(client.get(RG, API).await.is_ok());
    }
}
