//! # Enveloping HTTP Client
//!
//! The client's network layer. Every request carries the device identifier
//! header; every structured body leaves sealed in the cipher envelope and
//! every enveloped response body is opened before callers see it. Bodies
//! without the envelope pass through as plaintext for compatibility with
//! the very first unauthenticated exchange.
//!
//! # Failure
//!
//! Transport problems (connection refused, DNS, timeouts) surface as
//! transport faults so the sync loop can treat them as "offline" and keep
//! retrying. A body that fails to open is a decryption fault; the response
//! is rejected rather than partially used.

use serde_json::Value;

use crate::shared::cipher::device_secret;
use crate::shared::envelope::{self, DEVICE_ID_HEADER};
use crate::shared::error::{EngineError, EngineResult};

/// A decoded response from the backend
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Whether the HTTP status was a success
    pub success: bool,
    /// The HTTP status code
    pub status: u16,
    /// The opened (decrypted if enveloped) response body
    pub data: Value,
}

/// HTTP client bound to one device identity
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    device_id: String,
    secret: String,
}

impl ApiClient {
    /// Build a client for the given server, origin and device identifier.
    pub fn new(base_url: impl Into<String>, origin: &str, device_id: impl Into<String>) -> Self {
        let device_id = device_id.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            secret: device_secret(origin, &device_id),
            device_id,
        }
    }

    /// The cipher secret in use.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// The device identifier in use.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// GET a backend path.
    pub async fn get(&self, path: &str) -> EngineResult<ApiResponse> {
        self.request(reqwest::Method::GET, path, None).await
    }

    /// POST a JSON body to a backend path; the body is always sealed.
    pub async fn post(&self, path: &str, body: &Value) -> EngineResult<ApiResponse> {
        self.request(reqwest::Method::POST, path, Some(body)).await
    }

    /// Perform a request against the backend.
    pub async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> EngineResult<ApiResponse> {
        let url = self.url_for(path);
        let mut request = self
            .http
            .request(method, &url)
            .header(DEVICE_ID_HEADER, &self.device_id)
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(body) = body {
            let sealed = envelope::seal(&self.secret, body)?;
            request = request.json(&sealed);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::transport(format!("{}: {}", url, e)))?;

        let status = response.status().as_u16();
        let success = response.status().is_success();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::transport(format!("{}: {}", url, e)))?;

        // Error bodies from proxies may not be JSON at all.
        let raw: Value =
            serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.clone()));
        let data = envelope::open(&self.secret, &raw)?;

        Ok(ApiResponse {
            success,
            status,
            data,
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        }
    }
}
