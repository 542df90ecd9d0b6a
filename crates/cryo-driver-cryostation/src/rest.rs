//! REST property-tree communication for the Cryostation
//!
//! This module provides an async HTTP client for the instrument's JSON
//! property tree, plus an in-memory mock with the same interface for testing
//! without hardware. The instrument serves the tree over plain HTTP on port
//! 47101 under a `/v1` root; callers pass bare tree paths
//! (e.g. `/controller/properties/platformTargetTemperature`).
//!
//! Three operations cover the whole wire protocol:
//!
//! - GET a property node, returning its single-key JSON envelope
//! - PUT `{leafName: value}` to a property node
//! - POST to a `()`-suffixed pseudo-path to invoke a controller method

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Default REST port for the Cryostation controller
pub const DEFAULT_PORT: u16 = 47101;

/// Root prefix of the instrument's property tree
pub const API_ROOT: &str = "/v1";

/// Trailing segment of a property path, used as the PUT body key.
///
/// A path with no slash is its own leaf.
pub fn leaf(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Extract a named field from a single-key response envelope.
///
/// The firmware guarantees the envelope's outer key matches the final path
/// segment; a missing key therefore means the response had an unexpected
/// shape and is surfaced as an error.
pub fn envelope_field(envelope: &Value, key: &str) -> Result<Value> {
    envelope
        .get(key)
        .cloned()
        .with_context(|| format!("response envelope is missing key '{}': {}", key, envelope))
}

// =============================================================================
// Transport Seam
// =============================================================================

/// Trait for REST transport operations (allows mock injection).
///
/// The driver holds an `Arc<dyn RestOps>` so the hardware client and the
/// in-memory mock are interchangeable behind one seam.
#[async_trait]
pub trait RestOps: Send + Sync {
    /// GET a property node; returns the decoded JSON envelope.
    async fn get_json(&self, path: &str) -> Result<Value>;

    /// PUT a JSON body to a property node; returns the decoded response.
    async fn put_json(&self, path: &str, body: Value) -> Result<Value>;

    /// POST to a `()`-suffixed pseudo-path; returns the decoded response.
    async fn post_json(&self, path: &str) -> Result<Value>;
}

// =============================================================================
// RestClient
// =============================================================================

/// Async REST client for the Cryostation property tree.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    /// Create a client for the instrument at the given host and port.
    ///
    /// No connection is opened here; each call is an independent HTTP
    /// request against `http://{host}:{port}/v1{path}`.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: format!("http://{}:{}{}", host, port, API_ROOT),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decode a response body, tolerating empty bodies from action endpoints.
    async fn decode(response: reqwest::Response, path: &str) -> Result<Value> {
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", path))?;

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .with_context(|| format!("Malformed JSON in response from {}", path))
    }
}

#[async_trait]
impl RestOps for RestClient {
    async fn get_json(&self, path: &str) -> Result<Value> {
        tracing::debug!("GET {}", path);
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("GET {} failed", path))?
            .error_for_status()
            .with_context(|| format!("GET {} returned error status", path))?;
        Self::decode(response, path).await
    }

    async fn put_json(&self, path: &str, body: Value) -> Result<Value> {
        tracing::debug!("PUT {} {}", path, body);
        let response = self
            .http
            .put(self.url(path))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("PUT {} failed", path))?
            .error_for_status()
            .with_context(|| format!("PUT {} returned error status", path))?;
        Self::decode(response, path).await
    }

    async fn post_json(&self, path: &str) -> Result<Value> {
        tracing::debug!("POST {}", path);
        let response = self
            .http
            .post(self.url(path))
            .send()
            .await
            .with_context(|| format!("POST {} failed", path))?
            .error_for_status()
            .with_context(|| format!("POST {} returned error status", path))?;
        Self::decode(response, path).await
    }
}

// =============================================================================
// MockRestClient
// =============================================================================

/// HTTP verb of a recorded mock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestMethod {
    Get,
    Put,
    Post,
}

/// One request seen by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: RestMethod,
    pub path: String,
    /// PUT body, if any
    pub body: Option<Value>,
}

/// Mock REST transport for testing without hardware.
///
/// Holds the property tree as an in-memory JSON object. GETs return
/// single-key envelopes exactly like the firmware does; PUTs store the value
/// under the addressed leaf; POSTs to the controller pseudo-methods update
/// the simulated system goal. Every request is recorded for assertions.
pub struct MockRestClient {
    tree: Mutex<Value>,
    requests: Mutex<Vec<RecordedRequest>>,
    offline: AtomicBool,
}

impl Default for MockRestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRestClient {
    /// Create a mock with a populated default property tree.
    pub fn new() -> Self {
        Self::with_tree(default_tree())
    }

    /// Create a mock with a caller-supplied property tree.
    pub fn with_tree(tree: Value) -> Self {
        Self {
            tree: Mutex::new(tree),
            requests: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Replace the node at `path` with `value`, creating intermediate
    /// objects as needed. For seeding test fixtures.
    pub async fn seed(&self, path: &str, value: Value) -> Result<()> {
        let mut tree = self.tree.lock().await;
        insert_node(&mut tree, path, value)
    }

    /// Simulate an unreachable instrument: every subsequent call errors.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// All requests seen so far, in order.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    /// Paths of the controller pseudo-methods invoked so far, in order.
    pub async fn invoked_methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.method == RestMethod::Post)
            .map(|r| r.path.clone())
            .collect()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            anyhow::bail!("Connection refused (mock instrument is offline)");
        }
        Ok(())
    }

    async fn record(&self, method: RestMethod, path: &str, body: Option<Value>) {
        self.requests.lock().await.push(RecordedRequest {
            method,
            path: path.to_string(),
            body,
        });
    }
}

#[async_trait]
impl RestOps for MockRestClient {
    async fn get_json(&self, path: &str) -> Result<Value> {
        self.check_online()?;
        self.record(RestMethod::Get, path, None).await;
        tracing::debug!("Mock GET {}", path);

        let tree = self.tree.lock().await;
        let node = lookup_node(&tree, path)
            .with_context(|| format!("404: no property at '{}'", path))?;
        Ok(json!({ leaf(path): node }))
    }

    async fn put_json(&self, path: &str, body: Value) -> Result<Value> {
        self.check_online()?;
        self.record(RestMethod::Put, path, Some(body.clone())).await;
        tracing::debug!("Mock PUT {} {}", path, body);

        let value = envelope_field(&body, leaf(path))
            .with_context(|| format!("400: PUT body does not wrap '{}'", leaf(path)))?;

        let mut tree = self.tree.lock().await;
        insert_node(&mut tree, path, value)?;
        Ok(body)
    }

    async fn post_json(&self, path: &str) -> Result<Value> {
        self.check_online()?;
        self.record(RestMethod::Post, path, None).await;
        tracing::debug!("Mock POST {}", path);

        let goal = match path {
            "/controller/methods/cooldown()" => "Cooldown",
            "/controller/methods/warmup()" => "Warmup",
            "/controller/methods/vent()" => "Vent",
            "/controller/methods/pullVacuum()" => "PullVacuum",
            "/controller/methods/abortGoal()" => "None",
            _ => anyhow::bail!("404: no method at '{}'", path),
        };

        let mut tree = self.tree.lock().await;
        insert_node(&mut tree, "/controller/properties/systemGoal", json!(goal))?;
        Ok(json!({}))
    }
}

// =============================================================================
// Tree Helpers
// =============================================================================

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Walk the tree to the node addressed by `path`.
fn lookup_node(tree: &Value, path: &str) -> Option<Value> {
    let mut node = tree;
    for segment in segments(path) {
        node = node.get(segment)?;
    }
    Some(node.clone())
}

/// Set the node addressed by `path`, creating intermediate objects.
fn insert_node(tree: &mut Value, path: &str, value: Value) -> Result<()> {
    let segs: Vec<&str> = segments(path).collect();
    let (last, parents) = segs
        .split_last()
        .with_context(|| format!("empty property path '{}'", path))?;

    let mut node = tree;
    for segment in parents {
        let map = node
            .as_object_mut()
            .with_context(|| format!("'{}' is not an object node in '{}'", segment, path))?;
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| json!({}));
    }

    node.as_object_mut()
        .with_context(|| format!("parent of '{}' is not an object node", last))?
        .insert(last.to_string(), value);
    Ok(())
}

/// The simulated instrument's property tree at power-on: chamber at room
/// temperature, no active goal, magnet idle.
fn default_tree() -> Value {
    let room_sample = json!({
        "temperature": 295.012,
        "temperatureOK": true,
        "temperatureStable": false,
        "temperatureStabilityOK": false,
        "temperatureStability": 0.05,
        "temperatureSlope": 0.0,
    });
    let idle_heater = json!({ "power": 0.0, "current": 0.0 });

    json!({
        "controller": {
            "properties": {
                "systemGoal": "None",
                "platformTargetTemperature": 295.0,
                "pullVacuumTargetPressure": 1.0e-3,
                "platformBakeoutEnabled": false,
                "platformBakeoutTemperature": 320.0,
                "platformBakeoutTime": 0,
                "dryNitrogenPurgeEnabled": false,
                "dryNitrogenPurgeNumTimes": 0,
                "ventContinuouslyEnabled": false,
            },
        },
        "sampleChamber": {
            "temperatureControllers": {
                "platform": {
                    "thermometer": {
                        "properties": {
                            "sample": room_sample.clone(),
                            "stabilityTarget": 0.1,
                        },
                    },
                    "heater": { "properties": { "sample": idle_heater.clone() } },
                },
                "user1": {
                    "properties": { "controllerEnabled": false, "targetTemperature": 295.0 },
                    "thermometer": {
                        "properties": {
                            "sample": room_sample.clone(),
                            "stabilityTarget": 0.1,
                        },
                    },
                    "heater": { "properties": { "sample": idle_heater.clone() } },
                },
                "user2": {
                    "properties": { "controllerEnabled": false, "targetTemperature": 295.0 },
                    "thermometer": {
                        "properties": {
                            "sample": room_sample.clone(),
                            "stabilityTarget": 0.1,
                        },
                    },
                    "heater": { "properties": { "sample": idle_heater.clone() } },
                },
                "cryoOptic": {
                    "properties": { "controllerEnabled": false, "targetTemperature": 295.0 },
                    "thermometer": {
                        "properties": {
                            "sample": room_sample.clone(),
                            "stabilityTarget": 0.1,
                        },
                    },
                    "heater": { "properties": { "sample": idle_heater.clone() } },
                },
            },
        },
        "cooler": {
            "temperatureControllers": {
                "stage1": {
                    "thermometer": {
                        "properties": {
                            "sample": { "temperature": 31.5, "temperatureOK": true },
                        },
                    },
                },
                "stage2": {
                    "thermometer": {
                        "properties": {
                            "sample": { "temperature": 3.4, "temperatureOK": true },
                        },
                    },
                },
            },
        },
        "vacuumSystem": {
            "vacuumGauges": {
                "sampleChamberPressure": {
                    "properties": {
                        "pressureSample": { "pressure": 2.1e-4, "pressureOK": true },
                    },
                },
            },
        },
        "magnetoOptic": {
            "magnet": {
                "properties": {
                    "enabled": false,
                    "state": "Idle",
                    "safeMode": true,
                    "calculatedField": 0.0,
                    "measuredCurrent": 0.0,
                    "targetField": 0.0,
                },
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf() {
        assert_eq!(
            leaf("/controller/properties/platformTargetTemperature"),
            "platformTargetTemperature"
        );
        assert_eq!(leaf("/controller/methods/cooldown()"), "cooldown()");
        assert_eq!(leaf("bare"), "bare");
    }

    #[test]
    fn test_envelope_field() {
        let envelope = json!({ "sample": { "temperature": 3.1 } });
        let sample = envelope_field(&envelope, "sample").unwrap();
        assert_eq!(sample, json!({ "temperature": 3.1 }));

        assert!(envelope_field(&envelope, "missing").is_err());
    }

    #[tokio::test]
    async fn test_mock_get_wraps_envelope() {
        let mock = MockRestClient::new();

        let envelope = mock
            .get_json("/controller/properties/platformTargetTemperature")
            .await
            .unwrap();
        assert_eq!(envelope, json!({ "platformTargetTemperature": 295.0 }));
    }

    #[tokio::test]
    async fn test_mock_get_unknown_path_is_error() {
        let mock = MockRestClient::new();
        let err = mock.get_json("/no/such/node").await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_mock_put_stores_leaf_value() {
        let mock = MockRestClient::new();

        mock.put_json(
            "/controller/properties/platformTargetTemperature",
            json!({ "platformTargetTemperature": 1.7 }),
        )
        .await
        .unwrap();

        let envelope = mock
            .get_json("/controller/properties/platformTargetTemperature")
            .await
            .unwrap();
        assert_eq!(envelope, json!({ "platformTargetTemperature": 1.7 }));
    }

    #[tokio::test]
    async fn test_mock_put_rejects_mismatched_body() {
        let mock = MockRestClient::new();
        let err = mock
            .put_json(
                "/controller/properties/platformTargetTemperature",
                json!({ "wrongKey": 1.7 }),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn test_mock_post_updates_system_goal() {
        let mock = MockRestClient::new();

        mock.post_json("/controller/methods/cooldown()").await.unwrap();
        let envelope = mock
            .get_json("/controller/properties/systemGoal")
            .await
            .unwrap();
        assert_eq!(envelope, json!({ "systemGoal": "Cooldown" }));

        mock.post_json("/controller/methods/abortGoal()").await.unwrap();
        let envelope = mock
            .get_json("/controller/properties/systemGoal")
            .await
            .unwrap();
        assert_eq!(envelope, json!({ "systemGoal": "None" }));
    }

    #[tokio::test]
    async fn test_mock_offline_errors_every_call() {
        let mock = MockRestClient::new();
        mock.set_offline(true);

        assert!(mock.get_json("/controller/properties/systemGoal").await.is_err());
        assert!(mock
            .put_json("/controller/properties/systemGoal", json!({ "systemGoal": "x" }))
            .await
            .is_err());
        assert!(mock.post_json("/controller/methods/cooldown()").await.is_err());

        // Offline calls never reach the instrument, so nothing is recorded.
        assert!(mock.requests().await.is_empty());

        mock.set_offline(false);
        assert!(mock.get_json("/controller/properties/systemGoal").await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_records_requests_in_order() {
        let mock = MockRestClient::new();

        mock.get_json("/controller/properties/systemGoal").await.unwrap();
        mock.post_json("/controller/methods/vent()").await.unwrap();

        let requests = mock.requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, RestMethod::Get);
        assert_eq!(requests[1].method, RestMethod::Post);
        assert_eq!(mock.invoked_methods().await, vec!["/controller/methods/vent()"]);
    }
}
