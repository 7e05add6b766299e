//! # Client View Engine
//!
//! The client-side resolution pipeline. A navigation matches the path
//! against the cached routes, decrypts the matched view, expands both
//! template variable syntaxes against the component cache, and hands the
//! resolved element tree to the rendering collaborator. Lifecycle scripts
//! run through the execution sandbox around the commit.
//!
//! ## Lifecycle Ordering
//!
//! For each committed navigation:
//! 1. the outgoing view's `onClose` runs with the context captured when
//!    that view was committed (not the incoming one)
//! 2. the matched route's middlewares run in their declared order
//! 3. the render tree is committed
//! 4. `onLoad` runs once, with the device identifier already available
//!
//! ## Last Resolution Wins
//!
//! Navigations are not cancelled mid-flight. Each resolution pass carries
//! a generation number; a pass that finishes after a newer one started is
//! discarded instead of committed.
//!
//! ## Failure
//!
//! Script faults in middlewares, `onLoad`, `onClose` or event handlers are
//! logged and swallowed; they never take the pipeline down. Match and
//! resolution faults surface to the caller, which falls back to a
//! not-found presentation.

use futures_util::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

use crate::client::api::ApiClient;
use crate::client::cache::SyncCache;
use crate::shared::cipher;
use crate::shared::document::ElementNode;
use crate::shared::error::{EngineError, EngineResult};
use crate::shared::routing::RouteTable;
use crate::shared::script::{run_script, ScriptContext, ScriptHost, SharedStore};
use crate::shared::template;
use crate::shared::ViewDocument;

/// A fully resolved view, ready for the rendering collaborator
#[derive(Debug, Clone)]
pub struct ResolvedView {
    /// The route pattern that matched
    pub endpoint: String,
    /// The navigated path
    pub path: String,
    /// Document title to commit
    pub title: String,
    /// Inline stylesheet, if any
    pub style: Option<String>,
    /// The resolved element tree
    pub render: ElementNode,
    /// Path parameters extracted by the route resolver
    pub params: BTreeMap<String, String>,
}

/// Outcome of a navigation pass
#[derive(Debug)]
pub enum Navigation {
    /// The pass finished while still current and the view was committed
    Committed(ResolvedView),
    /// A newer navigation started before this pass finished
    Superseded,
}

/// The outgoing view's lifecycle capture
struct ActiveView {
    endpoint: String,
    on_close: Option<String>,
    bindings: Map<String, Value>,
}

/// One resolution pass's outputs, before commit
struct ResolutionPass {
    endpoint: String,
    params: BTreeMap<String, String>,
    middleware_keys: Vec<String>,
    view: ViewDocument,
    render: ElementNode,
}

/// Capabilities available to client scripts
///
/// Navigation requests are queued for the embedding loop to act on;
/// relative HTTP paths go through the enveloping API client.
pub struct ClientScriptHost {
    api: ApiClient,
    pending_navigations: StdMutex<Vec<String>>,
}

impl ClientScriptHost {
    fn new(api: ApiClient) -> Self {
        Self {
            api,
            pending_navigations: StdMutex::new(Vec::new()),
        }
    }

    fn take_navigation(&self) -> Option<String> {
        let mut pending = self.pending_navigations.lock().unwrap();
        if pending.is_empty() {
            None
        } else {
            Some(pending.remove(0))
        }
    }
}

impl ScriptHost for ClientScriptHost {
    fn http(
        &self,
        method: String,
        url: String,
        body: Option<Value>,
    ) -> BoxFuture<'static, EngineResult<Value>> {
        let api = self.api.clone();
        Box::pin(async move {
            let method = reqwest::Method::from_bytes(method.as_bytes())
                .map_err(|_| EngineError::script(format!("invalid http method '{}'", method)))?;
            let response = api.request(method, &url, body.as_ref()).await?;
            Ok(response.data)
        })
    }

    fn navigate(&self, path: &str) -> EngineResult<()> {
        self.pending_navigations
            .lock()
            .unwrap()
            .push(path.to_string());
        Ok(())
    }

    fn notify(&self, level: &str, message: &str) {
        // The rendering collaborator owns real toasts; headless runs log.
        tracing::info!(target: "pagewright::ui", level, "{}", message);
    }

    fn delay(&self, ms: u64) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(std::time::Duration::from_millis(ms)))
    }
}

/// The client resolution/execution engine
pub struct Engine {
    cache: SyncCache,
    /// Process-wide store consumed by scripts
    pub store: SharedStore,
    host: Arc<ClientScriptHost>,
    device_id: String,
    secret: String,
    generation: AtomicU64,
    active: Mutex<Option<ActiveView>>,
}

impl Engine {
    /// Build an engine over the cache and API client.
    pub fn new(cache: SyncCache, api: ApiClient, store: SharedStore) -> Self {
        let device_id = api.device_id().to_string();
        let secret = api.secret().to_string();
        Self {
            cache,
            store,
            host: Arc::new(ClientScriptHost::new(api)),
            device_id,
            secret,
            generation: AtomicU64::new(0),
            active: Mutex::new(None),
        }
    }

    /// Resolve a path and commit its view.
    ///
    /// # Errors
    ///
    /// A match fault when nothing (not even a wildcard) matches, a
    /// decryption fault when a cached document cannot be opened, and a
    /// resolution fault when template expansion fails.
    pub async fn navigate(&self, path: &str) -> EngineResult<Navigation> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let pass = self.resolve(path).await?;

        // Last resolution wins: a newer navigation may have started while
        // this pass was reading the cache.
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(%path, "resolution superseded by a newer navigation");
            return Ok(Navigation::Superseded);
        }

        self.run_on_close(&pass.endpoint).await;

        let bindings = self.lifecycle_bindings(path, &pass.params);
        self.run_route_middlewares(&pass.middleware_keys, &bindings)
            .await;

        let resolved = ResolvedView {
            endpoint: pass.endpoint.clone(),
            path: path.to_string(),
            title: pass.view.title.clone(),
            style: pass.view.style.clone(),
            render: pass.render,
            params: pass.params,
        };

        // Commit before onLoad: the hook observes the new active view.
        *self.active.lock().await = Some(ActiveView {
            endpoint: pass.endpoint,
            on_close: pass.view.on_close.clone(),
            bindings: bindings.clone(),
        });

        if let Some(on_load) = &pass.view.on_load {
            self.run_lifecycle_script("onLoad", on_load, &bindings).await;
        }

        Ok(Navigation::Committed(resolved))
    }

    /// Run an element event handler script (the rendering collaborator
    /// calls this for `on*` attributes).
    pub async fn fire_event(&self, script: &str, event: Value) {
        let active = self.active.lock().await;
        let mut bindings = active
            .as_ref()
            .map(|view| view.bindings.clone())
            .unwrap_or_default();
        drop(active);
        bindings.insert("event".to_string(), event);
        self.run_script_with_bindings("event handler", script, bindings)
            .await;
    }

    /// Pop the next navigation requested by a script, if any.
    pub fn take_pending_navigation(&self) -> Option<String> {
        self.host.take_navigation()
    }

    async fn resolve(&self, path: &str) -> EngineResult<ResolutionPass> {
        let cached_routes = self.cache.get_routes().await?;
        let table = RouteTable::new(
            cached_routes
                .iter()
                .map(|cached| cached.to_route())
                .collect(),
        );
        let matched = table
            .match_path(path)
            .ok_or_else(|| EngineError::no_match(path))?;

        let cipher_text = matched.route.view_cipher_text().ok_or_else(|| {
            EngineError::resolution(format!(
                "cached view for '{}' is not cipher text",
                matched.route.endpoint
            ))
        })?;
        let view_text = cipher::decode(&self.secret, cipher_text)?;
        let view: ViewDocument = serde_json::from_str(&view_text)?;

        let render_text = serde_json::to_string(&view.render)?;
        let actions = view.action.clone().unwrap_or_default();
        let lookup = self.component_lookup().await?;
        let resolved_text =
            template::resolve(&render_text, &actions, &lookup, template::DEFAULT_DEPTH_LIMIT)?;
        let render: ElementNode = serde_json::from_str(&resolved_text).map_err(|e| {
            EngineError::resolution(format!("resolved tree is not a valid element tree: {}", e))
        })?;

        Ok(ResolutionPass {
            endpoint: matched.route.endpoint,
            params: matched.params,
            middleware_keys: matched.route.middlewares,
            view,
            render,
        })
    }

    /// Build the component lookup over a snapshot of the component cache.
    ///
    /// Fragments decrypt lazily, only for the keys a resolution actually
    /// touches.
    async fn component_lookup(
        &self,
    ) -> EngineResult<impl Fn(&str) -> EngineResult<Option<String>>> {
        let components: HashMap<String, String> = self
            .cache
            .get_components()
            .await?
            .into_iter()
            .map(|component| (component.key, component.view))
            .collect();
        let secret = self.secret.clone();
        Ok(move |key: &str| -> EngineResult<Option<String>> {
            let Some(cipher_text) = components.get(key) else {
                return Ok(None);
            };
            let view_text = cipher::decode(&secret, cipher_text)?;
            let view: ViewDocument = serde_json::from_str(&view_text)?;
            Ok(Some(serde_json::to_string(&view.render)?))
        })
    }

    fn lifecycle_bindings(
        &self,
        path: &str,
        params: &BTreeMap<String, String>,
    ) -> Map<String, Value> {
        let mut bindings = Map::new();
        bindings.insert(
            "params".to_string(),
            serde_json::to_value(params).unwrap_or(Value::Null),
        );
        bindings.insert(
            "device_id".to_string(),
            Value::String(self.device_id.clone()),
        );
        bindings.insert("endpoint".to_string(), Value::String(path.to_string()));
        bindings
    }

    /// Run the outgoing view's onClose if the endpoint actually changes.
    async fn run_on_close(&self, next_endpoint: &str) {
        let outgoing = {
            let mut active = self.active.lock().await;
            let changing = active
                .as_ref()
                .map(|view| view.endpoint != next_endpoint)
                .unwrap_or(false);
            if changing {
                active.take()
            } else {
                None
            }
        };
        if let Some(view) = outgoing {
            if let Some(on_close) = view.on_close {
                // The captured context, not the incoming one.
                self.run_script_with_bindings("onClose", &on_close, view.bindings)
                    .await;
            }
        }
    }

    /// Run the matched route's middlewares in their declared order.
    ///
    /// A faulting middleware is logged and skipped; the navigation goes on.
    async fn run_route_middlewares(&self, keys: &[String], bindings: &Map<String, Value>) {
        if keys.is_empty() {
            return;
        }
        let middlewares = match self.cache.get_middlewares().await {
            Ok(middlewares) => middlewares,
            Err(e) => {
                tracing::error!("failed to read middlewares: {}", e);
                return;
            }
        };
        // get_middlewares returns execution order; filtering preserves it.
        for middleware in middlewares
            .iter()
            .filter(|middleware| keys.contains(&middleware.key))
        {
            let script = match cipher::decode(&self.secret, &middleware.script) {
                Ok(script) => script,
                Err(e) => {
                    tracing::error!(middleware = %middleware.key, "cannot open middleware: {}", e);
                    continue;
                }
            };
            self.run_script_with_bindings("middleware", &script, bindings.clone())
                .await;
        }
    }

    async fn run_lifecycle_script(&self, stage: &str, script: &str, bindings: &Map<String, Value>) {
        self.run_script_with_bindings(stage, script, bindings.clone())
            .await;
    }

    async fn run_script_with_bindings(
        &self,
        stage: &str,
        script: &str,
        bindings: Map<String, Value>,
    ) {
        let mut ctx = ScriptContext::new(self.store.clone(), self.host.clone());
        ctx.bindings = bindings;
        if let Err(e) = run_script(script, &ctx).await {
            // A faulting script is a no-op; the pipeline stays alive.
            tracing::error!(stage, "script faulted: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::cache::SyncCache;
    use crate::client::sync::repopulate;
    use crate::shared::document::{Component, DocumentBundle, Middleware, Route};
    use crate::shared::script::new_store;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const ORIGIN: &str = "localhost";
    const DEVICE: &str = "test-device";

    async fn engine_with(bundle: DocumentBundle) -> (Engine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let cache = SyncCache::open(dir.path().join("cache.db")).await.unwrap();
        let api = ApiClient::new("http://localhost:1234", ORIGIN, DEVICE);
        repopulate(&cache, api.secret(), bundle).await.unwrap();
        (Engine::new(cache, api, new_store()), dir)
    }

    fn user_bundle() -> DocumentBundle {
        DocumentBundle {
            version: "1.0.0".into(),
            middlewares: vec![Middleware {
                key: "track".into(),
                audience: Default::default(),
                script: r##"["store.merge", {"tracked": true}]"##.into(),
                order: 1,
            }],
            routes: vec![
                Route {
                    endpoint: "/users/:id".into(),
                    method: None,
                    audience: Default::default(),
                    middlewares: vec!["track".into()],
                    view: json!({
                        "title": "User",
                        "onLoad": ["store.merge", {"loaded": ["var", "params.id"]}],
                        "onClose": ["store.merge", {"closed": ["var", "params.id"]}],
                        "render": {
                            "element": "div",
                            "children": ["#*greeting*#, user #*who*#", "#|badge|label=VIP|#"]
                        },
                        "action": {"greeting": "Hi", "who": "42"}
                    }),
                },
                Route {
                    endpoint: "/plain".into(),
                    method: None,
                    audience: Default::default(),
                    middlewares: vec![],
                    view: json!({
                        "title": "Plain",
                        "render": {"element": "p", "children": ["nothing here"]}
                    }),
                },
                Route {
                    endpoint: "*".into(),
                    method: None,
                    audience: Default::default(),
                    middlewares: vec![],
                    view: json!({
                        "title": "Not Found",
                        "render": {"element": "div", "children": ["missing"]}
                    }),
                },
            ],
            components: vec![Component {
                key: "badge".into(),
                view: json!({
                    "title": "badge",
                    "render": {"element": "span", "children": ["#label#"]}
                }),
            }],
        }
    }

    fn stringify_scripts(bundle: &mut DocumentBundle) {
        // Lifecycle hooks are script strings on the wire; the json! macro
        // above builds them as values for readability.
        for route in &mut bundle.routes {
            if let Some(view) = route.view.as_object_mut() {
                for hook in ["onLoad", "onClose"] {
                    if let Some(script) = view.get(hook).cloned() {
                        if !script.is_string() {
                            view.insert(hook.into(), json!(script.to_string()));
                        }
                    }
                }
            }
        }
    }

    fn bundle() -> DocumentBundle {
        let mut bundle = user_bundle();
        stringify_scripts(&mut bundle);
        bundle
    }

    #[tokio::test]
    async fn test_full_resolution_pipeline() {
        let (engine, _dir) = engine_with(bundle()).await;

        let Navigation::Committed(view) = engine.navigate("/users/42").await.unwrap() else {
            panic!("expected committed navigation");
        };
        assert_eq!(view.title, "User");
        assert_eq!(view.params.get("id").map(String::as_str), Some("42"));

        // Action variables substituted, component expanded in place.
        let rendered = serde_json::to_value(&view.render).unwrap();
        assert_eq!(
            rendered,
            json!({
                "element": "div",
                "children": [
                    "Hi, user 42",
                    {"element": "span", "children": ["VIP"]}
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_middleware_and_on_load_touch_store() {
        let (engine, _dir) = engine_with(bundle()).await;
        engine.navigate("/users/7").await.unwrap();

        let store = engine.store.read().await;
        assert_eq!(store.get("tracked"), Some(&json!(true)));
        assert_eq!(store.get("loaded"), Some(&json!("7")));
    }

    #[tokio::test]
    async fn test_on_close_runs_with_captured_context() {
        let (engine, _dir) = engine_with(bundle()).await;
        engine.navigate("/users/7").await.unwrap();
        engine.navigate("/plain").await.unwrap();

        let store = engine.store.read().await;
        // The outgoing view's params, not the incoming view's.
        assert_eq!(store.get("closed"), Some(&json!("7")));
    }

    #[tokio::test]
    async fn test_same_endpoint_does_not_close() {
        let (engine, _dir) = engine_with(bundle()).await;
        engine.navigate("/users/7").await.unwrap();
        engine.navigate("/users/8").await.unwrap();

        let store = engine.store.read().await;
        assert_eq!(store.get("closed"), None);
    }

    #[tokio::test]
    async fn test_wildcard_view_for_unknown_path() {
        let (engine, _dir) = engine_with(bundle()).await;
        let Navigation::Committed(view) = engine.navigate("/nowhere").await.unwrap() else {
            panic!("expected committed navigation");
        };
        assert_eq!(view.title, "Not Found");
    }

    #[tokio::test]
    async fn test_empty_cache_is_a_match_fault() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SyncCache::open(dir.path().join("cache.db")).await.unwrap();
        let api = ApiClient::new("http://localhost:1234", ORIGIN, DEVICE);
        let engine = Engine::new(cache, api, new_store());

        let result = engine.navigate("/anything").await;
        assert!(matches!(result, Err(EngineError::Match { .. })));
    }

    #[tokio::test]
    async fn test_event_handler_sees_event_binding() {
        let (engine, _dir) = engine_with(bundle()).await;
        engine.navigate("/users/7").await.unwrap();

        engine
            .fire_event(
                r##"["store.merge", {"clicked": ["var", "event.value"]}]"##,
                json!({"value": "button-1"}),
            )
            .await;

        let store = engine.store.read().await;
        assert_eq!(store.get("clicked"), Some(&json!("button-1")));
    }

    #[tokio::test]
    async fn test_script_navigation_is_queued() {
        let (engine, _dir) = engine_with(bundle()).await;
        engine.navigate("/users/7").await.unwrap();
        engine.fire_event(r##"["navigate", "/plain"]"##, Value::Null).await;

        assert_eq!(engine.take_pending_navigation().as_deref(), Some("/plain"));
        assert_eq!(engine.take_pending_navigation(), None);
    }
}
