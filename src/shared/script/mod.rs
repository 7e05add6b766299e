//! Execution Sandbox
//!
//! Runs script bodies stored inside documents. A script is data: the body
//! parses as JSON and is walked by a restricted interpreter whose only
//! visible names are the injected dependency bindings plus the operator
//! table. Nothing ambient leaks in, which is the dependency-injection
//! contract scripts rely on.
//!
//! The same sandbox serves both sides of the wire: UI lifecycle hooks and
//! event handlers on the client, dynamically defined API route bodies on
//! the server. Side-effecting operators (`navigate`, `notify`, `http.*`,
//! `delay`) are routed through a [`ScriptHost`] so each side installs its
//! own capabilities.
//!
//! # Shared State
//!
//! Scripts read and shallow-merge into one process-wide store. There is no
//! locking discipline beyond the store's own lock; last write wins, which
//! is the accepted consistency model under the cooperative scheduler.
//!
//! # Failure
//!
//! Any error raised during execution is a script fault. Callers catch it,
//! log it, and keep the surrounding pipeline alive: the server answers
//! with a generic internal error, the client turns it into a no-op.

mod interp;

pub use interp::evaluate;

use futures_util::future::BoxFuture;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::shared::error::{EngineError, EngineResult};

/// The process-wide mutable store consumed by scripts.
pub type SharedStore = Arc<RwLock<Map<String, Value>>>;

/// Create an empty shared store.
pub fn new_store() -> SharedStore {
    Arc::new(RwLock::new(Map::new()))
}

/// Capabilities a script may exercise beyond pure computation
///
/// The client installs navigation, toasts and a real HTTP client; the
/// server installs an HTTP client and rejects navigation.
pub trait ScriptHost: Send + Sync {
    /// Perform an HTTP request on behalf of the script.
    fn http(
        &self,
        method: String,
        url: String,
        body: Option<Value>,
    ) -> BoxFuture<'static, EngineResult<Value>>;

    /// Request navigation to another endpoint.
    fn navigate(&self, path: &str) -> EngineResult<()>;

    /// Surface a user-facing notification.
    fn notify(&self, level: &str, message: &str);

    /// Suspend the script for the given number of milliseconds.
    fn delay(&self, ms: u64) -> BoxFuture<'static, ()>;
}

/// A host with no capabilities; every effect operator fails or no-ops
///
/// Useful for middleware-style scripts that should stay pure, and for
/// tests.
pub struct NullHost;

impl ScriptHost for NullHost {
    fn http(
        &self,
        _method: String,
        url: String,
        _body: Option<Value>,
    ) -> BoxFuture<'static, EngineResult<Value>> {
        Box::pin(async move {
            Err(EngineError::script(format!(
                "http is not available in this context ({})",
                url
            )))
        })
    }

    fn navigate(&self, path: &str) -> EngineResult<()> {
        Err(EngineError::script(format!(
            "navigate is not available in this context ({})",
            path
        )))
    }

    fn notify(&self, level: &str, message: &str) {
        tracing::debug!(level, message, "notify (null host)");
    }

    fn delay(&self, ms: u64) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(std::time::Duration::from_millis(ms)))
    }
}

/// Everything a script can see while it runs
pub struct ScriptContext {
    /// Flat map of injected dependency bindings (`params`, `device_id`,
    /// `event`, and on the server `req` and `env`)
    pub bindings: Map<String, Value>,
    /// Handle to the process-wide store
    pub store: SharedStore,
    /// Capability host for side-effecting operators
    pub host: Arc<dyn ScriptHost>,
}

impl ScriptContext {
    /// Build a context over the given store and host with no bindings.
    pub fn new(store: SharedStore, host: Arc<dyn ScriptHost>) -> Self {
        Self {
            bindings: Map::new(),
            store,
            host,
        }
    }

    /// Add one named binding.
    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }
}

/// Parse and run a script body against a context.
///
/// # Errors
///
/// A script fault when the body is not valid JSON or evaluation raises.
pub async fn run_script(body: &str, ctx: &ScriptContext) -> EngineResult<Value> {
    let program: Value = serde_json::from_str(body)
        .map_err(|e| EngineError::script(format!("script body is not valid JSON: {}", e)))?;
    evaluate(&program, ctx).await
}

/// Map a server route script's return value onto an HTTP response.
///
/// A returned object carrying a three-digit numeric `statusCode` has the
/// status extracted and removed from the body; a returned string becomes
/// `{"message": ...}`; any other value becomes `{"value": ...}`.
pub fn map_server_result(value: Value) -> (Option<u16>, Value) {
    match value {
        Value::Object(mut obj) => {
            let status = obj
                .get("statusCode")
                .and_then(Value::as_u64)
                .filter(|code| (100..=999).contains(code));
            match status {
                Some(code) => {
                    obj.remove("statusCode");
                    (Some(code as u16), Value::Object(obj))
                }
                None => (None, Value::Object(obj)),
            }
        }
        Value::String(message) => (None, json!({ "message": message })),
        other => (None, json!({ "value": other })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_code_extracted() {
        let (status, body) = map_server_result(json!({"statusCode": 201, "ok": true}));
        assert_eq!(status, Some(201));
        assert_eq!(body, json!({"ok": true}));
    }

    #[test]
    fn test_non_three_digit_status_kept_in_body() {
        let (status, body) = map_server_result(json!({"statusCode": 42, "ok": true}));
        assert_eq!(status, None);
        assert_eq!(body, json!({"statusCode": 42, "ok": true}));
    }

    #[test]
    fn test_string_result_becomes_message() {
        let (status, body) = map_server_result(json!("created"));
        assert_eq!(status, None);
        assert_eq!(body, json!({"message": "created"}));
    }

    #[test]
    fn test_scalar_result_becomes_value() {
        let (status, body) = map_server_result(json!(7));
        assert_eq!(status, None);
        assert_eq!(body, json!({"value": 7}));
    }

    #[tokio::test]
    async fn test_run_script_rejects_invalid_json() {
        let ctx = ScriptContext::new(new_store(), Arc::new(NullHost));
        let result = run_script("not json at all", &ctx).await;
        assert!(matches!(result, Err(EngineError::Script { .. })));
    }

    #[tokio::test]
    async fn test_null_host_rejects_http() {
        let ctx = ScriptContext::new(new_store(), Arc::new(NullHost));
        let result = run_script(r#"["http.get", "https://example.org"]"#, &ctx).await;
        assert!(matches!(result, Err(EngineError::Script { .. })));
    }
}
