mod config;
mod error;
mod gemini;
mod model;
mod normalizer;
mod prompt;
mod types;

use anyhow::Context;
use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, Method, header},
    response::Json,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use clap::Parser;
use metrics::counter;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use error::ApiError;
use gemini::{GeminiClient, GeminiConfig};
use model::ModelClient;
use types::{ClassificationRequest, ClassificationResult};

const HEALTH_MESSAGE: &str = "Fake News Detection API (Gemini) is running";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let config = Config::parse();
    init_tracing(config.log_json);

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }
    tracing::info!("Starting news check server with config: {:?}", config);

    let gemini = GeminiClient::new(GeminiConfig {
        api_key: config.gemini_api_key.clone(),
        model: config.model.clone(),
        base_url: config.api_base_url.clone(),
        timeout: config.request_timeout(),
    })?;

    let cors = cors_layer(config.parse_allowed_origins())?;
    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = build_router(AppState::new(Arc::new(gemini)), cors)
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer);

    let listener = TcpListener::bind(&config.server_address()).await?;
    tracing::info!("Server running on http://{}", config.server_address());
    tracing::info!(model = %config.model, "Forwarding news items to Gemini");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,newscheck=debug".into());
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

/// `None` allows any origin.
fn cors_layer(origins: Option<Vec<String>>) -> anyhow::Result<CorsLayer> {
    let allow_origin = match origins {
        None => AllowOrigin::from(Any),
        Some(origins) => {
            let origins = origins
                .iter()
                .map(|origin| {
                    origin
                        .parse::<HeaderValue>()
                        .with_context(|| format!("Invalid CORS origin: {origin}"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            AllowOrigin::list(origins)
        }
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/check-news", post(check_news_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Clone)]
struct AppState {
    model: Arc<dyn ModelClient + Send + Sync>,
}

impl AppState {
    fn new(model: Arc<dyn ModelClient + Send + Sync>) -> Self {
        Self { model }
    }
}

async fn health_handler() -> &'static str {
    HEALTH_MESSAGE
}

#[tracing::instrument(
    skip(state, payload),
    fields(request_id = %uuid::Uuid::new_v4().simple(), kind = tracing::field::Empty)
)]
async fn check_news_handler(
    State(state): State<AppState>,
    payload: Result<Json<ClassificationRequest>, JsonRejection>,
) -> Result<Json<ClassificationResult>, ApiError> {
    counter!("classification_requests_total").increment(1);

    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let item = request.into_item().inspect_err(|e| {
        tracing::info!(error = %e, "Rejected news check request");
    })?;
    tracing::Span::current().record("kind", tracing::field::debug(item.kind()));

    let prompt = prompt::build_prompt(&item);
    let completion = state
        .model
        .generate(&prompt)
        .await
        .map_err(ApiError::from)
        .inspect_err(|e| {
            counter!("model_failures_total").increment(1);
            tracing::error!(error = %e, "News check failed");
        })?;

    let result = normalizer::normalize(&completion);
    if result.explanation.starts_with(normalizer::INVALID_JSON_PREFIX) {
        tracing::warn!(
            completion_len = completion.len(),
            "Model output was not valid JSON, returning fallback"
        );
    }

    counter!("classification_labels_total", "label" => result.label.as_str()).increment(1);
    tracing::info!(label = result.label.as_str(), confidence = result.confidence, "News check completed");
    Ok(Json(result))
}
