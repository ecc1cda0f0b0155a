//! anthropic-mock - A contract-checked fake of the Anthropic Messages API
//!
//! This library serves a canned `POST /v1/messages` endpoint so client SDKs can be tested
//! without reaching the real service. Every route is wrapped in a declared contract (allowed
//! methods, request schema, response schema): requests that do not fit are rejected before route
//! logic runs, and responses that do not fit never leave the server.
//!
//! - [`schema`] - declarative JSON schemas and validation with field-level violations
//! - [`contract`] - route specifications and the wrapper that enforces them
//! - [`messages`] - the Messages route and its wire types
//! - [`test_utils`] - an in-process server for client tests and snapshot normalization

use axum::Router;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, http::StatusCode};
use axum_prometheus::{
    GenericMetricLayer, Handle, PrometheusMetricLayerBuilder,
    metrics_exporter_prometheus::PrometheusHandle,
};
use bon::Builder;
use serde_json::json;
use std::borrow::Cow;
use tracing::{info, instrument};

pub mod contract;
pub mod errors;
pub mod ids;
pub mod messages;
pub mod schema;
pub mod test_utils;

use contract::DEFAULT_BODY_LIMIT;
use errors::ContractError;
use messages::{CannedMessages, DEFAULT_REPLY_TEXT, MESSAGES_PATH, messages_route};

/// Knobs for the routes the mock serves.
#[derive(Debug, Clone, Builder)]
pub struct MockOptions {
    /// The assistant text returned for every conversation
    #[builder(into, default = DEFAULT_REPLY_TEXT.to_string())]
    pub reply_text: String,
    /// Largest accepted request body, in bytes
    #[builder(default = DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Build the main router for the mock
/// This creates routes for:
/// - `/v1/messages` - The contract-checked Messages endpoint
/// - `/health` - Liveness probe
///
/// Anything else gets a 404 in the API's error envelope.
#[instrument(skip(options))]
pub fn build_router(options: &MockOptions) -> Result<Router, ContractError> {
    info!("Building router");
    let messages = messages_route(
        CannedMessages::new(options.reply_text.clone()),
        options.body_limit,
    )?;

    Ok(Router::new()
        .route(MESSAGES_PATH, messages.into_method_router())
        .route("/health", get(health))
        .fallback(not_found))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

async fn not_found() -> Response {
    errors::not_found_response()
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
/// # Parameters
/// - `prefix`: A string prefix for the metrics. Accepts borrowed or owned strings; the prefix
///   must live for the whole program, as the Prometheus layer requires.
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
