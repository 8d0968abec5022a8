//! Bazaar is a small marketplace backend: accounts and business listings.
#![forbid(unsafe_code)]
#![deny(unused_mut)]

mod business;
mod crypto;
mod database;
pub mod error;
mod profile;
mod router;
mod status;
pub mod telemetry;
mod user;

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
use error::ServerError;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use crate::business::{BusinessRepository, SqliteBusinessRepository};
use crate::profile::{MemoryProfileStore, MongoProfileStore, ProfileStore};
use crate::user::{AccountRepository, AccountService, SqliteAccountRepository};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub accounts: AccountService,
    pub businesses: Arc<dyn BusinessRepository>,
    pub metrics: Option<PrometheusHandle>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any),
        );

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(status::status))
        // `GET /metrics` goes to the Prometheus exposition.
        .route("/metrics", get(status::metrics))
        .nest("/api", router::router())
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state(
    config: Arc<config::Configuration>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let db =
        database::Database::new(&config.sqlite, config.mongodb.as_ref()).await?;

    // create tables on start.
    let accounts = SqliteAccountRepository::new(db.sqlite.clone());
    accounts.create_schema().await?;
    let businesses = SqliteBusinessRepository::new(db.sqlite.clone());
    businesses.create_schema().await?;

    let profiles: Arc<dyn ProfileStore> = match db.mongo {
        Some(collection) => Arc::new(MongoProfileStore::new(collection)),
        None => {
            tracing::warn!(
                "missing `mongodb` entry on `config.yaml` file, profiles are kept in memory"
            );
            Arc::new(MemoryProfileStore::new())
        },
    };

    let metrics = if config.telemetry.metrics {
        Some(telemetry::setup_metrics_recorder()?)
    } else {
        None
    };

    Ok(AppState {
        config,
        accounts: AccountService::new(Arc::new(accounts), profiles),
        businesses: Arc::new(businesses),
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqlitePoolOptions;

    /// Private in-memory database; a single connection keeps it alive.
    pub async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    /// Application state backed by in-memory stores.
    pub async fn state() -> AppState {
        let pool = memory_pool().await;

        let accounts = SqliteAccountRepository::new(pool.clone());
        accounts.create_schema().await.unwrap();
        let businesses = SqliteBusinessRepository::new(pool);
        businesses.create_schema().await.unwrap();

        AppState {
            config: Arc::new(config::Configuration::default()),
            accounts: AccountService::new(
                Arc::new(accounts),
                Arc::new(MemoryProfileStore::new()),
            ),
            businesses: Arc::new(businesses),
            metrics: None,
        }
    }

    #[tokio::test]
    async fn test_status_handler() {
        let app = app(state().await);

        let response =
            make_request(app, Method::GET, "/status.json", String::default())
                .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_disabled() {
        let app = app(state().await);

        let response =
            make_request(app, Method::GET, "/metrics", String::default()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = app(state().await);

        let response =
            make_request(app, Method::GET, "/api/unknown", String::default())
                .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
