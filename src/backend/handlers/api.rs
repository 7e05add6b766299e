/**
 * Dynamic API Route Dispatch
 *
 * This module implements the reserved /api path prefix. Requests are
 * matched against the server-stored backend routes by path pattern and
 * method; a match's middlewares and script run through the execution
 * sandbox with the full request descriptor bound as `req`.
 *
 * # Envelope Policy
 *
 * POST/PUT/PATCH bodies must arrive enveloped: the device identifier is
 * known by the time any of these run, so plaintext compatibility no longer
 * applies. A body that fails to open rejects the request outright.
 *
 * # Failure Mapping
 *
 * - no matching route: 404 `{"message": "endpoint not found"}`
 * - faulted middleware or route script: 500 `{"message": "internal server error"}`
 *
 * Both bodies are sealed like every other structured response.
 */

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{Method, StatusCode},
    response::Response,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::backend::error::BackendError;
use crate::backend::handlers::host::ServerScriptHost;
use crate::backend::handlers::{internal_error_response, not_found_response, sealed_response};
use crate::backend::middleware::Device;
use crate::backend::server::state::AppState;
use crate::shared::document::{middlewares_for_route, Middleware};
use crate::shared::envelope;
use crate::shared::routing::percent_decode;
use crate::shared::script::{map_server_result, run_script, ScriptContext};

/// Upper bound on accepted request bodies.
const BODY_LIMIT: usize = 1024 * 1024;

/// Dynamic route dispatch handler
///
/// Bound to every method under the /api prefix; the stored route documents
/// decide what actually exists.
pub async fn dispatch(
    State(state): State<AppState>,
    Device(identity): Device,
    request: Request,
) -> Result<Response, BackendError> {
    let (parts, body) = request.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    let query = parse_query(parts.uri.query());
    let headers = header_map(&parts.headers);

    let raw_body = to_bytes(body, BODY_LIMIT).await.map_err(|e| {
        BackendError::handler(StatusCode::BAD_REQUEST, format!("unreadable body: {}", e))
    })?;
    let body_value = open_body(&identity.secret, &method, &raw_body)?;

    let Some(matched) = state.documents.backend_table.match_request(method.as_str(), &path)
    else {
        tracing::debug!(%path, method = %method, "no backend route matched");
        return not_found_response(&identity.secret);
    };

    let Some(script) = matched.route.script().map(str::to_string) else {
        tracing::error!(
            endpoint = %matched.route.endpoint,
            "backend route view is not a script body"
        );
        return internal_error_response(&identity.secret);
    };

    let params = serde_json::to_value(&matched.params)?;
    let req_descriptor = json!({
        "request_id": identity.request_id,
        "method": method.as_str(),
        "endpoint": path,
        "params": params.clone(),
        "query": Value::Object(query),
        "headers": Value::Object(headers),
        "body": body_value,
        "files": {},
        "env": Value::Object(state.env.as_ref().clone()),
    });

    let ctx = ScriptContext::new(state.store.clone(), Arc::new(ServerScriptHost))
        .bind("req", req_descriptor)
        .bind("params", params)
        .bind("device_id", Value::String(identity.device_id.clone()))
        .bind("env", Value::Object(state.env.as_ref().clone()));

    // Route middlewares run first, in their declared order.
    let backend_middlewares: Vec<Middleware> = state
        .documents
        .middlewares
        .iter()
        .filter(|middleware| !middleware.audience.is_fe())
        .cloned()
        .collect();
    for middleware in middlewares_for_route(&backend_middlewares, &matched.route.middlewares) {
        if let Err(e) = run_script(&middleware.script, &ctx).await {
            tracing::error!(
                middleware = %middleware.key,
                endpoint = %matched.route.endpoint,
                "middleware script faulted: {}",
                e
            );
            return internal_error_response(&identity.secret);
        }
    }

    match run_script(&script, &ctx).await {
        Ok(result) => {
            let (status, payload) = map_server_result(result);
            let status = status
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::OK);
            sealed_response(status, &identity.secret, &payload)
        }
        Err(e) => {
            tracing::error!(
                endpoint = %matched.route.endpoint,
                "route script faulted: {}",
                e
            );
            internal_error_response(&identity.secret)
        }
    }
}

/// Open the request body under the envelope policy.
///
/// Mutating methods must arrive enveloped; other methods accept plaintext
/// for compatibility. An empty body is null.
fn open_body(secret: &str, method: &Method, raw: &[u8]) -> Result<Value, BackendError> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    let body: Value = serde_json::from_slice(raw).map_err(|e| {
        BackendError::handler(StatusCode::BAD_REQUEST, format!("body is not JSON: {}", e))
    })?;
    let mandatory = matches!(*method, Method::POST | Method::PUT | Method::PATCH);
    let opened = if mandatory {
        envelope::open_sealed(secret, &body)?
    } else {
        envelope::open(secret, &body)?
    };
    Ok(opened)
}

/// Parse a query string into a JSON object.
fn parse_query(query: Option<&str>) -> Map<String, Value> {
    let mut out = Map::new();
    let Some(query) = query else {
        return out;
    };
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        out.insert(
            percent_decode(key),
            Value::String(percent_decode(value)),
        );
    }
    out
}

/// Lower the header map into a JSON object.
fn header_map(headers: &axum::http::HeaderMap) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            out.insert(name.as_str().to_string(), Value::String(value.to_string()));
        }
    }
    out
}
