// API server
//
// Public REST surface: domain CRUD, priority endpoints, orchestrator,
// dashboard, and the gateway proxy with its local-engine fallback.

mod domain;
mod handlers;
pub mod middleware;
mod proxy;

pub use middleware::RateLimiter;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::Error;
use crate::gateway::GatewayClient;
use crate::metrics::{ApiMetrics, MetricsLogger};
use crate::orchestrator::Orchestrator;
use crate::store::Store;

/// Shared application state for all handlers.
pub struct AppState {
    pub store: Store,
    pub gateway: GatewayClient,
    pub orchestrator: Orchestrator,
    pub metrics_logger: MetricsLogger,
    pub api_metrics: ApiMetrics,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let store = Store::open(&config.db_path)?;
        let gateway = GatewayClient::new(
            &config.gateway_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let metrics_logger = MetricsLogger::new(config.metrics_dir.clone())?;
        let api_metrics = ApiMetrics::new()?;

        Ok(Self {
            store,
            gateway,
            orchestrator: Orchestrator::new(),
            metrics_logger,
            api_metrics,
            config,
        })
    }

    /// In-memory state for handler tests.
    #[doc(hidden)]
    pub fn for_tests(metrics_dir: std::path::PathBuf, gateway_url: &str) -> Result<Self> {
        let config = Config {
            gateway_url: gateway_url.to_string(),
            metrics_dir: metrics_dir.clone(),
            ..Config::default()
        };
        Ok(Self {
            store: Store::open_in_memory()?,
            gateway: GatewayClient::new(gateway_url, Duration::from_secs(2))?,
            orchestrator: Orchestrator::new(),
            metrics_logger: MetricsLogger::new(metrics_dir)?,
            api_metrics: ApiMetrics::new()?,
            config,
        })
    }
}

/// Build the API router over shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // System
        .route("/api/health", get(handlers::health))
        .route("/api/metrics", get(handlers::prometheus_metrics))
        .route("/api/metrics/summary", get(handlers::metrics_summary))
        .route("/api/dashboard", get(handlers::dashboard))
        // Priority engine
        .route("/api/priority/calculate", post(handlers::calculate_priority))
        .route("/api/priority/explain", post(handlers::explain_allocation))
        .route("/api/priority/budget", post(handlers::budget_split))
        // Orchestrator
        .route("/api/orchestrator/route", post(handlers::route_query))
        .route("/api/orchestrator/stats", get(handlers::orchestrator_stats))
        // Regions
        .route("/api/regions", get(domain::list_regions).post(domain::create_region))
        .route(
            "/api/regions/:region_id",
            get(domain::get_region)
                .put(domain::update_region)
                .delete(domain::delete_region),
        )
        .route("/api/regions/:region_id/priority", post(domain::recalc_priority))
        // Allocations
        .route(
            "/api/allocations",
            get(domain::list_allocations).post(domain::create_allocation),
        )
        .route("/api/allocations/:allocation_id", get(domain::get_allocation))
        .route("/api/allocations/:allocation_id/approve", post(domain::approve_allocation))
        .route("/api/allocations/:allocation_id/disburse", post(domain::disburse_allocation))
        .route("/api/allocations/:allocation_id/complete", post(domain::complete_allocation))
        .route("/api/allocations/:allocation_id/reject", post(domain::reject_allocation))
        // Proposals
        .route(
            "/api/proposals",
            get(domain::list_proposals).post(domain::create_proposal),
        )
        .route("/api/proposals/:proposal_id", get(domain::get_proposal))
        .route("/api/proposals/:proposal_id/submit", post(domain::submit_proposal))
        .route("/api/proposals/:proposal_id/open-voting", post(domain::open_voting))
        .route("/api/proposals/:proposal_id/vote", post(domain::cast_vote))
        .route("/api/proposals/:proposal_id/finalize", post(domain::finalize_proposal))
        .route("/api/proposals/:proposal_id/votes", get(domain::list_votes))
        // Analysis requests
        .route("/api/requests/allocations", get(domain::list_allocation_requests))
        .route("/api/requests/allocations/:request_id", get(domain::get_allocation_request))
        .route(
            "/api/requests/allocations/:request_id/approve",
            post(domain::approve_allocation_request),
        )
        .route(
            "/api/requests/allocations/:request_id/reject",
            post(domain::reject_allocation_request),
        )
        .route("/api/requests/explanations", get(domain::list_explanation_requests))
        .route(
            "/api/requests/explanations/:request_id",
            get(domain::get_explanation_request),
        )
        .route(
            "/api/requests/explanations/:request_id/approve",
            post(domain::approve_explanation_request),
        )
        .route(
            "/api/requests/explanations/:request_id/reject",
            post(domain::reject_explanation_request),
        )
        .route("/api/requests/review-queue", get(domain::review_queue))
        // Data sources
        .route("/api/sources", get(domain::list_sources).post(domain::create_source))
        .route("/api/sources/:id", delete(domain::delete_source))
        .route("/api/sources/:id/use", post(domain::use_source))
        // Gateway proxy
        .route("/api/gateway/allocation", post(proxy::forward_allocation))
        .route("/api/gateway/explanation", post(proxy::forward_explanation))
        .route("/api/gateway/status/:request_id", get(proxy::gateway_status))
        .route("/api/gateway/health", get(proxy::gateway_health))
        .route("/api/gateway/metrics", get(proxy::gateway_metrics))
        .with_state(state)
}

/// Run the API server.
pub async fn run_server(config: Config) -> Result<()> {
    let limiter = RateLimiter::new(config.rate_limit_rps, config.rate_limit_burst);
    let max_body = config.max_file_size * 4;
    let bind = config.bind_address.clone();

    // Idle rate-limit buckets are purged in the background so the per-IP map
    // cannot grow without bound.
    let sweeper = limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            sweeper.purge_idle(600);
        }
    });

    let state = Arc::new(AppState::new(config)?);
    let app = create_router(state)
        .layer(axum::middleware::from_fn(middleware::rate_limit_middleware))
        .layer(Extension(limiter))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: std::net::SocketAddr = bind.parse()?;
    tracing::info!("Starting Civica API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) | Error::InvalidTransition { .. } | Error::Serde(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::GatewayUnreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Upstream { status, .. } if *status == 404 => StatusCode::NOT_FOUND,
            Error::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Error::Storage(_) | Error::Provider(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
