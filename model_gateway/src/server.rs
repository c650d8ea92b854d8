use std::sync::Arc;

use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use fantasy_mcp::McpConnector;
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    config::GatewayConfig,
    llm::{anthropic::AnthropicClient, ModelClient},
    routers::{
        chat::{handler, ChatContext},
        mcp_proxy,
    },
};

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Build the application router over a prepared context.
pub fn build_app(ctx: ChatContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(handler::chat))
        .route("/api/mcp/{server}/{action}", post(mcp_proxy::proxy))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}

/// Build the context from configuration.
///
/// A missing API key is not fatal: the gateway still serves health and
/// proxy routes, and chat requests answer with a configuration error.
pub fn build_context(config: &GatewayConfig) -> anyhow::Result<ChatContext> {
    let model_client: Option<Arc<dyn ModelClient>> = match &config.anthropic_api_key {
        Some(key) if !key.trim().is_empty() => {
            let http_client = reqwest::Client::builder().build()?;
            Some(Arc::new(AnthropicClient::new(
                http_client,
                &config.anthropic_base_url,
                key,
                config.request_timeout(),
            )))
        }
        _ => {
            warn!("ANTHROPIC_API_KEY is not set; chat requests will fail");
            None
        }
    };

    let connector = McpConnector::new(config.mcp_config())?;
    Ok(ChatContext::new(
        model_client,
        Arc::new(connector),
        config.chat_settings(),
    ))
}

pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let ctx = build_context(&config)?;
    let app = build_app(ctx);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        address = %addr,
        model = %config.model,
        tool_server = %config.chat_tool_server,
        "Fantasy gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
