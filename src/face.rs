use std::net::SocketAddr;

use axum::extract::State;
use axum::http::{HeaderValue, Request, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ApiError;
use crate::relay::Relay;
use crate::types::{
    ActionFinderInput, ActionResult, FilterInput, FilterResult, PageContent, SummaryResult,
};

/// Routes for the extension. The relay is the only shared state.
pub fn router(relay: Relay) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/process-page", post(process_page_handler))
        .route("/api/find-action", post(find_action_handler))
        .route("/api/filter-actions", post(filter_actions_handler))
        .with_state(relay)
        // The extension runs on arbitrary origins and sends credentials, so
        // origin, methods and headers are mirrored rather than wildcarded.
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_methods(AllowMethods::mirror_request())
                .allow_headers(AllowHeaders::mirror_request())
                .allow_credentials(true),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}

/// Serve until Ctrl-C.
pub async fn serve(relay: Relay, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Simplify relay listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(relay))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

async fn index_handler() -> Json<Value> {
    Json(json!({
        "status": "Backend is live. Send POST requests to /api/process-page"
    }))
}

async fn process_page_handler(
    State(relay): State<Relay>,
    Json(payload): Json<PageContent>,
) -> Result<Json<SummaryResult>, ApiError> {
    relay.process_page(payload).await.map(Json)
}

async fn find_action_handler(
    State(relay): State<Relay>,
    Json(payload): Json<ActionFinderInput>,
) -> Result<Json<ActionResult>, ApiError> {
    relay.find_action(payload).await.map(Json)
}

async fn filter_actions_handler(
    State(relay): State<Relay>,
    Json(payload): Json<FilterInput>,
) -> Result<Json<FilterResult>, ApiError> {
    relay.filter_actions(payload).await.map(Json)
}
