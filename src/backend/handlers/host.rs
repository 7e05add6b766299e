/**
 * Server Script Host
 *
 * The capability host installed when route scripts run on the server.
 * HTTP requests go out through a shared reqwest client; navigation is a
 * client-only capability and is rejected; notifications become log lines.
 */

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::sync::OnceLock;

use crate::shared::error::{EngineError, EngineResult};
use crate::shared::script::ScriptHost;

fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(reqwest::Client::new)
}

/// Capabilities available to server route scripts
pub struct ServerScriptHost;

impl ScriptHost for ServerScriptHost {
    fn http(
        &self,
        method: String,
        url: String,
        body: Option<Value>,
    ) -> BoxFuture<'static, EngineResult<Value>> {
        Box::pin(async move {
            let client = http_client();
            let method = reqwest::Method::from_bytes(method.as_bytes())
                .map_err(|_| EngineError::script(format!("invalid http method '{}'", method)))?;
            let mut request = client.request(method, &url);
            if let Some(body) = body {
                request = request.json(&body);
            }
            let response = request
                .send()
                .await
                .map_err(|e| EngineError::script(format!("http request failed: {}", e)))?;
            response
                .json::<Value>()
                .await
                .map_err(|e| EngineError::script(format!("http response is not JSON: {}", e)))
        })
    }

    fn navigate(&self, path: &str) -> EngineResult<()> {
        Err(EngineError::script(format!(
            "navigate is not available in server scripts ({})",
            path
        )))
    }

    fn notify(&self, level: &str, message: &str) {
        tracing::info!(target: "pagewright::script", level, "{}", message);
    }

    fn delay(&self, ms: u64) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(std::time::Duration::from_millis(ms)))
    }
}
