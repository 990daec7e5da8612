use std::sync::Arc;

use axum::{extract::State, middleware, routing::get, Json, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use forum_realtime::adapters::auth::JwtSessionValidator;
use forum_realtime::adapters::broker::RedisMessageBroker;
use forum_realtime::adapters::http::middleware::{auth_middleware, AuthState};
use forum_realtime::adapters::websocket::{
    websocket_router, ConnectionRegistry, ConnectionSettings, GatewayState,
};
use forum_realtime::config::{AppConfig, LogFormat};
use forum_realtime::ports::MessageBroker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "forum-realtime starting"
    );

    let broker: Arc<dyn MessageBroker> = Arc::new(RedisMessageBroker::connect(&config.redis).await?);
    let validator: AuthState = Arc::new(JwtSessionValidator::from_config(&config.auth));
    let registry = Arc::new(ConnectionRegistry::new());

    let origin_policy = config.realtime.origin_policy();
    if !origin_policy.has_allowlist() {
        tracing::warn!(
            dev_origin = %config.realtime.dev_origin,
            "No origin allowlist configured; accepting the development origin and same-origin requests"
        );
    }

    let gateway = GatewayState::new(
        Arc::clone(&registry),
        broker,
        origin_policy,
        ConnectionSettings::from_config(&config.realtime),
    );

    let app = Router::new()
        .route("/health", get(health).with_state(Arc::clone(&registry)))
        .merge(websocket_router().with_state(gateway))
        .layer(middleware::from_fn_with_state(validator, auth_middleware))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    tracing::info!("forum-realtime stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match config.server.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn health(State(registry): State<Arc<ConnectionRegistry>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "connections": registry.len()
    }))
}

/// Resolves on Ctrl-C or SIGTERM after closing every live socket, so the
/// server can drain.
async fn shutdown_signal(registry: Arc<ConnectionRegistry>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received, closing realtime connections");
    registry.shutdown().await;
}
