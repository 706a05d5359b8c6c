#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use researcher_db::{InMemoryJobStore, JobStore};
use researcher_events::{HubConfig, NotificationHub};
use researcher_pipeline::{Orchestrator, PipelineConfig, ProviderChain};
use researcher_providers::provider::Options;
use researcher_providers::{InferenceProvider, ProviderError, ProviderFailure, SharedProvider};
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower::ServiceExt;

use researcher_api::config::ServerConfig;
use researcher_api::router::build_app_router;
use researcher_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: None,
        perplexity_api_key: None,
        openai_api_key: None,
        provider_timeout_secs: 300,
        hub_send_timeout_ms: 2000,
        hub_channel_capacity: 64,
    }
}

// ---------------------------------------------------------------------------
// Fake provider
// ---------------------------------------------------------------------------

/// Provider that answers immediately, fails, or waits on a gate first.
pub struct FakeProvider {
    name: &'static str,
    fail: bool,
    gate: Option<Arc<Notify>>,
}

impl FakeProvider {
    pub fn ok(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail: false,
            gate: None,
        })
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail: true,
            gate: None,
        })
    }

    pub fn gated(name: &'static str, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail: false,
            gate: Some(gate),
        })
    }

    async fn respond(&self) -> Result<(), ProviderError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(ProviderError::new(
                self.name,
                ProviderFailure::Malformed("scripted failure".into()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl InferenceProvider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch_research(&self, topic: &str, _: &Options) -> Result<String, ProviderError> {
        self.respond().await?;
        Ok(format!("notes on {topic}"))
    }

    async fn synthesize(&self, _: &str, _: &Options) -> Result<Value, ProviderError> {
        self.respond().await?;
        Ok(json!({"market_overview": "growing", "risks": []}))
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// The router plus handles to the state behind it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// A fresh clone of the router for one `oneshot` request.
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// App with providers that always succeed.
pub fn build_test_app() -> TestApp {
    build_test_app_with(
        FakeProvider::ok("perplexity"),
        FakeProvider::ok("openai"),
        FakeProvider::ok("openai"),
    )
}

/// Build the full application router with all middleware layers on top of
/// an in-memory store and the given providers.
pub fn build_test_app_with(
    primary: SharedProvider,
    secondary: SharedProvider,
    synthesis: SharedProvider,
) -> TestApp {
    let config = test_config();
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let hub = Arc::new(NotificationHub::new(HubConfig::default()));
    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        Arc::clone(&hub),
        ProviderChain::primary_with_fallback(primary, secondary),
        synthesis,
        PipelineConfig::default(),
    );

    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        hub,
        orchestrator,
    };
    let router = build_app_router(state.clone(), &config);
    TestApp { router, state }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, None).await
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll the orchestrator until `id` has no run in flight.
pub async fn wait_until_idle(test_app: &TestApp, id: i64) {
    for _ in 0..200 {
        if !test_app.state.orchestrator.is_running(id) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("analysis {id} still running");
}
