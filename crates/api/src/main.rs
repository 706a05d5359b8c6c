use std::net::SocketAddr;
use std::sync::Arc;

use researcher_db::{InMemoryJobStore, JobStore, PgJobStore};
use researcher_events::NotificationHub;
use researcher_pipeline::{Orchestrator, ProviderChain};
use researcher_providers::{OpenAiProvider, PerplexityProvider, SharedProvider};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use researcher_api::config::ServerConfig;
use researcher_api::router::build_app_router;
use researcher_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid configuration");
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Job store ---
    let store = build_store(&config).await;

    // --- Providers ---
    let perplexity_key = config.perplexity_api_key.clone().unwrap_or_else(|| {
        tracing::warn!("PERPLEXITY_API_KEY not set; research will rely on the fallback");
        String::new()
    });
    let openai_key = config.openai_api_key.clone().unwrap_or_else(|| {
        tracing::warn!("OPENAI_API_KEY not set; synthesis requests will fail");
        String::new()
    });
    let perplexity: SharedProvider = Arc::new(PerplexityProvider::new(perplexity_key));
    let openai: SharedProvider = Arc::new(OpenAiProvider::new(openai_key));

    // --- Notification hub ---
    let hub = Arc::new(NotificationHub::new(config.hub_config()));

    // --- Orchestrator ---
    let research = ProviderChain::primary_with_fallback(perplexity, Arc::clone(&openai));
    tracing::info!(chain = ?research.names(), "Research provider chain configured");
    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        Arc::clone(&hub),
        research,
        openai,
        config.pipeline_config(),
    );

    // --- App state ---
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        hub: Arc::clone(&hub),
        orchestrator: orchestrator.clone(),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let drained = orchestrator.shutdown(config.shutdown_timeout()).await;
    tracing::info!(drained, "Analysis runs stopped");

    let ws_jobs = hub.job_count().await;
    tracing::info!(ws_jobs, "Closing remaining WebSocket subscriptions");
    hub.shutdown_all().await;

    tracing::info!("Graceful shutdown complete");
}

/// `RUST_LOG` filter with a debug default; `LOG_FORMAT=json` switches to
/// JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "researcher_api=debug,researcher_pipeline=debug,tower_http=debug".into()
    });
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise in-memory.
async fn build_store(config: &ServerConfig) -> Arc<dyn JobStore> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
        return Arc::new(InMemoryJobStore::new());
    };

    let pool = researcher_db::create_pool(database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    researcher_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    researcher_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    Arc::new(PgJobStore::new(pool))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
