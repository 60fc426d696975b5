//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use donorlink_core::config::DonorLinkConfig;
use donorlink_notify::DispatchController;
use donorlink_vision::{HttpImageLabeler, ImageLabeler, LabelVerifier};

/// Shared state for the gateway server.
pub struct AppState {
    pub config: DonorLinkConfig,
    /// Dispatch controller, also the owner of the record store handle.
    pub controller: Arc<DispatchController>,
    /// `None` when image verification is disabled or unconfigured.
    pub labeler: Option<Arc<dyn ImageLabeler>>,
    /// Verifier over the configured expected labels.
    pub verifier: LabelVerifier,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: DonorLinkConfig,
        controller: Arc<DispatchController>,
        labeler: Option<Arc<dyn ImageLabeler>>,
    ) -> Self {
        let verifier =
            LabelVerifier::new(&config.vision.expected_labels, config.vision.min_confidence);
        Self {
            config,
            controller,
            labeler,
            verifier,
            start_time: std::time::Instant::now(),
        }
    }

    /// Build all process-wide clients from config.
    pub fn from_config(config: DonorLinkConfig) -> anyhow::Result<Self> {
        let controller = Arc::new(donorlink_notify::controller_from_config(&config)?);

        let labeler: Option<Arc<dyn ImageLabeler>> = if !config.vision.enabled {
            None
        } else {
            match HttpImageLabeler::new(&config.vision) {
                Ok(l) => Some(Arc::new(l)),
                Err(e) => {
                    tracing::warn!("⚠️ Image verification not available: {e}");
                    None
                }
            }
        };

        Ok(Self::new(config, controller, labeler))
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/api/v1/triggers/request-created",
            post(super::routes::trigger_request_created),
        )
        .route(
            "/api/v1/notifications/{uid}",
            get(super::routes::list_notifications),
        )
        .route(
            "/api/v1/users/{uid}/fcm-token",
            put(super::routes::register_token),
        )
        .route(
            "/api/v1/donations/verify-image",
            post(super::routes::verify_image),
        );

    Router::new()
        .route("/health", get(super::routes::health_check))
        .merge(api)
        .layer(
            CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn start(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.gateway.host, state.config.gateway.port);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
