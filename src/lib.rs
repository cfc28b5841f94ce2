//! summarelay - summarize uploaded text files through an OpenAI-compatible chat API
//!
//! The relay exposes one endpoint, `POST /api/summary`, which takes a credential, a system
//! prompt and a document, forwards them to the upstream chat completions API and returns the
//! first choice as `{"summary": ...}`. Every other request is served from a static root on disk,
//! which is where the upload page lives. The [`form`] module holds the client half of the flow.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum_prometheus::{
    GenericMetricLayer, Handle, PrometheusMetricLayerBuilder,
    metrics_exporter_prometheus::PrometheusHandle,
};
use std::borrow::Cow;
use std::path::PathBuf;
use tracing::{info, instrument};

pub mod client;
pub mod errors;
pub mod form;
pub mod handlers;
pub mod models;
pub mod relay;
pub mod static_files;

use client::{HttpClient, HyperClient, PoolSettings};
use handlers::{static_handler, summary_handler};
use relay::Upstream;

/// Path of the summary endpoint.
pub const SUMMARY_PATH: &str = "/api/summary";

/// Largest summary request body accepted, well above axum's 2 MB default so whole novels fit.
pub const SUMMARY_BODY_LIMIT: usize = 128 * 1024 * 1024;

/// The main application state: the outbound client, upstream settings and the static root.
/// Nothing in here changes after startup.
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub http_client: T,
    pub upstream: Upstream,
    pub static_root: PathBuf,
}

impl AppState<HyperClient> {
    /// Create a new AppState with the default Hyper client
    pub fn new(upstream: Upstream, static_root: PathBuf, pool: PoolSettings) -> Self {
        Self {
            http_client: client::create_hyper_client(pool),
            upstream,
            static_root,
        }
    }
}

impl<T: HttpClient> AppState<T> {
    /// Create a new AppState with a custom HTTP client (useful for testing)
    pub fn with_client(upstream: Upstream, static_root: PathBuf, http_client: T) -> Self {
        Self {
            http_client,
            upstream,
            static_root,
        }
    }
}

/// Build the main router
/// This creates routes for:
/// - `POST /api/summary` - Summarizes the posted text via the upstream API
/// - everything else (including other methods on `/api/summary`) - Served from the static root
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + Send + Sync + 'static>(state: AppState<T>) -> Router {
    info!("Building router");
    Router::new()
        .route(
            SUMMARY_PATH,
            post(summary_handler)
                .layer(DefaultBodyLimit::max(SUMMARY_BODY_LIMIT))
                .fallback(static_handler),
        )
        .fallback(static_handler)
        .with_state(state)
}

/// Builds a router for the metrics endpoint.
#[instrument(skip(handle))]
pub fn build_metrics_router(handle: PrometheusHandle) -> Router {
    info!("Building metrics router");
    Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    )
}

type MetricsLayerAndHandle = (
    GenericMetricLayer<'static, PrometheusHandle, Handle>,
    PrometheusHandle,
);

/// Builds a layer and handle for prometheus metrics collection.
///
/// The prefix must live for the whole program, hence `Cow<'static, str>`.
pub fn build_metrics_layer_and_handle(
    prefix: impl Into<Cow<'static, str>>,
) -> MetricsLayerAndHandle {
    info!("Building metrics layer");
    PrometheusMetricLayerBuilder::new()
        .with_prefix(prefix)
        .enable_response_body_size(true)
        .with_endpoint_label_type(axum_prometheus::EndpointLabel::Exact)
        .with_default_metrics()
        .build_pair()
}
