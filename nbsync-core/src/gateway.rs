//! Gateway trait: the engine's only way of reading and mutating remote state.
//!
//! Transport concerns (auth, TLS, retries, timeouts) belong to the
//! implementation. The engine calls these methods strictly in sequence.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::GatewayError;
use crate::model::RemoteObject;

/// Ordered query parameters used to narrow a list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pairs: Vec<(String, String)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        f.write_str(&parts.join("&"))
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Access to one remote inventory.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// List objects at an endpoint matching every filter pair.
    async fn list(&self, endpoint: &str, filter: &Filter) -> GatewayResult<Vec<RemoteObject>>;

    /// Create an object. Implementations must not retry this call.
    async fn create(&self, endpoint: &str, payload: &Map<String, Value>)
    -> GatewayResult<RemoteObject>;

    /// Partially update an object.
    async fn update(
        &self,
        endpoint: &str,
        id: u64,
        payload: &Map<String, Value>,
    ) -> GatewayResult<RemoteObject>;

    /// Delete an object.
    async fn delete(&self, endpoint: &str, id: u64) -> GatewayResult<()>;
}
