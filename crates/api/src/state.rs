use std::sync::Arc;

use researcher_db::JobStore;
use researcher_events::NotificationHub;
use researcher_pipeline::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is behind `Arc` or is itself a shared handle.
#[derive(Clone)]
pub struct AppState {
    /// Analysis persistence (PostgreSQL or in-memory).
    pub store: Arc<dyn JobStore>,
    pub config: Arc<ServerConfig>,
    /// Per-analysis subscriber registry feeding the WebSocket endpoint.
    pub hub: Arc<NotificationHub>,
    /// Starts and supervises analysis runs.
    pub orchestrator: Orchestrator,
}
