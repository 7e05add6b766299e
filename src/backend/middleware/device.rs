/**
 * Device Identity Middleware
 *
 * This module provides middleware enforcing the device identifier header
 * on every backend request. The identifier is the sole input (together
 * with the request origin) to the per-device cipher secret, so a request
 * without it cannot take part in the enveloped exchange at all.
 *
 * # Behavior
 *
 * 1. Mints a per-request id and attaches it as `X-Request-ID`
 * 2. Lets the asset-serving path through untouched
 * 3. Rejects requests without `x-device-id` with 406 Not Acceptable
 *    before any business logic runs
 * 4. Derives the device secret and attaches a `DeviceIdentity` to the
 *    request extensions for handlers to use
 */

use axum::{
    extract::Request,
    http::{header::HOST, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::shared::cipher::device_secret;
use crate::shared::envelope::{DEVICE_ID_HEADER, REQUEST_ID_HEADER};

/// Path prefix exempt from the device identifier requirement.
pub const ASSET_PREFIX: &str = "/static";

/// Identity data derived from the device identifier header
#[derive(Clone, Debug)]
pub struct DeviceIdentity {
    /// The raw device identifier sent by the client
    pub device_id: String,
    /// Cipher secret derived from the request origin and the identifier
    pub secret: String,
    /// Per-request id, also echoed in the `X-Request-ID` response header
    pub request_id: String,
}

/// Device identity middleware
///
/// Returns 406 Not Acceptable if the device identifier header is missing
/// on a non-asset path.
pub async fn device_middleware(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let request_id = Uuid::new_v4().to_string();

    if request.uri().path().starts_with(ASSET_PREFIX) {
        let mut response = next.run(request).await;
        attach_request_id(&mut response, &request_id);
        return Ok(response);
    }

    let device_id = request
        .headers()
        .get(DEVICE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| {
            tracing::warn!(path = %request.uri().path(), "missing device identifier header");
            StatusCode::NOT_ACCEPTABLE
        })?;

    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");

    let identity = DeviceIdentity {
        secret: device_secret(host, &device_id),
        device_id,
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(identity);

    let mut response = next.run(request).await;
    attach_request_id(&mut response, &request_id);
    Ok(response)
}

fn attach_request_id(response: &mut Response, request_id: &str) {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}

/// Axum extractor for the device identity
///
/// This can be used as a parameter in handlers to automatically extract
/// the identity attached by the middleware.
#[derive(Clone, Debug)]
pub struct Device(pub DeviceIdentity);

impl<S: Send + Sync> axum::extract::FromRequestParts<S> for Device {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<DeviceIdentity>()
            .cloned()
            .ok_or_else(|| {
                tracing::warn!("DeviceIdentity not found in request extensions");
                StatusCode::NOT_ACCEPTABLE
            })?;

        Ok(Device(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_secret_derivation() {
        let identity = DeviceIdentity {
            secret: device_secret("localhost:1234", "abc"),
            device_id: "abc".into(),
            request_id: Uuid::new_v4().to_string(),
        };
        assert_eq!(identity.secret, "localhost#abc");
    }
}
