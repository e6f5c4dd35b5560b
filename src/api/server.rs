//! HTTP Server implementation
//!
//! This module provides the HTTP server using Axum framework with:
//! - Configurable host/port binding
//! - Graceful shutdown handling
//! - Request timeouts
//! - CORS support
//! - Periodic pruning of security gate state

use crate::api::handlers::AppState;
use crate::api::middleware::{
    security_headers_middleware, trace_id_middleware, SecurityHeadersConfig,
};
use crate::api::routes::build_api_routes;
use crate::core::config::ServerConfig;
use crate::core::error::WardenError;
use crate::core::Config;
use crate::db::manager::DatabaseManager;
use axum::{
    error_handling::HandleErrorLayer,
    http::{header, Method, StatusCode},
    middleware,
    response::IntoResponse,
    BoxError, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// HTTP API Server
pub struct ApiServer {
    router: Router,
    config: ServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Create a new API server with the given configuration and database manager
    pub fn new(config: Config, db: Arc<DatabaseManager>) -> anyhow::Result<Self> {
        if config.security.token_ttl != config.security.cookie_max_age {
            tracing::warn!(
                token_ttl = config.security.token_ttl,
                cookie_max_age = config.security.cookie_max_age,
                "Session token and cookie lifetimes differ; the shorter one bounds the session"
            );
        }

        let state = AppState::new(config, db)?;
        Ok(Self::from_state(state))
    }

    /// Create a server around prepared state
    pub fn from_state(state: AppState) -> Self {
        let router = Self::build_router(&state);

        Self {
            router,
            config: state.config.server.clone(),
            state,
        }
    }

    /// Build the Axum router with all routes and middleware
    fn build_router(state: &AppState) -> Router {
        let config = &state.config;
        let security_headers =
            SecurityHeadersConfig::from_config(&config.security, config.environment);

        build_api_routes(state.clone()).layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(trace_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(Self::build_cors_layer(&config.security.allowed_origins))
                .layer(middleware::from_fn_with_state(
                    security_headers,
                    security_headers_middleware,
                ))
                .layer(HandleErrorLayer::new(handle_timeout))
                .timeout(Duration::from_secs(config.server.request_timeout)),
        )
    }

    /// Build CORS layer from allowed origins configuration
    ///
    /// Explicit origins may send the session cookie; the wildcard may not.
    fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
        use tower_http::cors::Any;

        if allowed_origins.iter().any(|origin| origin == "*") {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_credentials(true)
        }
    }

    /// Start the HTTP server and listen for requests
    ///
    /// This method will block until the server is shut down gracefully.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let socket_addr: SocketAddr = addr.parse()?;

        info!(
            host = %self.config.host,
            port = self.config.port,
            request_timeout = self.config.request_timeout,
            environment = self.state.config.environment.as_str(),
            "Starting HTTP server"
        );

        let pruner = self.spawn_gate_pruner();

        let listener = tokio::net::TcpListener::bind(socket_addr).await?;
        info!(addr = %socket_addr, "HTTP server listening");

        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        pruner.abort();
        info!("HTTP server shut down gracefully");

        Ok(())
    }

    /// Prune idle rate-limit windows once per window period
    fn spawn_gate_pruner(&self) -> tokio::task::JoinHandle<()> {
        let oracle = self.state.oracle.clone();
        let period = Duration::from_secs(self.state.config.shield.window_seconds);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                oracle.prune().await;
            }
        })
    }

    /// Get a reference to the router
    pub fn router(&self) -> &Router {
        &self.router
    }
}

async fn handle_timeout(err: BoxError) -> impl IntoResponse {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            axum::Json(crate::core::error::ErrorResponse::new(
                "Timeout".to_string(),
                "Request timed out".to_string(),
            )),
        )
            .into_response()
    } else {
        WardenError::TaskError(err.to_string()).into_response()
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Initiating graceful shutdown...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::middleware::TRACE_ID_HEADER;
    use crate::core::config::AppEnvironment;
    use axum::{body::Body, http::Request};
    use tower::util::ServiceExt;

    fn server(environment: AppEnvironment) -> ApiServer {
        let mut config = Config::for_environment(AppEnvironment::Test).unwrap();
        config.environment = environment;
        config.security.bcrypt_cost = 4;
        let db = Arc::new(DatabaseManager::new_in_memory().unwrap());
        ApiServer::new(config, db).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_not_gated() {
        let router = server(AppEnvironment::Test).router().clone();

        // No user agent: the gate would call this a bot
        for _ in 0..10 {
            let response = router
                .clone()
                .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_global_layers_apply() {
        let response = server(AppEnvironment::Test)
            .router()
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let headers = response.headers();
        assert!(headers.contains_key(TRACE_ID_HEADER));
        assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
        assert!(!headers.contains_key("Strict-Transport-Security"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = server(AppEnvironment::Test)
            .router()
            .clone()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_with_explicit_origins_allows_credentials() {
        let router = Router::new()
            .route("/", axum::routing::get(|| async { "ok" }))
            .layer(ApiServer::build_cors_layer(&[
                "https://app.example.com".to_string(),
            ]));

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://app.example.com"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }
}
