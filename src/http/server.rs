//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Compile the configured routes into route services
//! - Create the Axum Router with a catch-all handler over the route table
//! - Wire up middleware (request ID, tracing, timeout)
//! - Bind, serve and shut down gracefully

use std::convert::Infallible;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::util::BoxCloneSyncService;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::cache::{cache_response, ResponseCache};
use crate::config::schema::{AppConfig, ServerConfig};
use crate::execution::{ExecuterRegistry, Platform};
use crate::http::dispatcher::RouteHandler;
use crate::http::request::RequestUuid;
use crate::lifecycle::shutdown;
use crate::routing::compiler::compile_route;
use crate::routing::router::{RouteService, RouteTable};

/// Error type for serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server failed: {0}")]
    Serve(#[from] io::Error),
}

/// Bind a TCP listener.
pub async fn bind(address: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.to_string(),
            source,
        })
}

/// HTTP server mapping requests to command executions.
pub struct HttpServer {
    router: Router,
    registry: ExecuterRegistry,
    routes: usize,
}

impl HttpServer {
    /// Build the executers and routes for `config`.
    ///
    /// Starts the shell pool when a route needs it, so this must be called
    /// within a Tokio runtime.
    pub fn new(config: &AppConfig) -> Self {
        let registry =
            ExecuterRegistry::from_config(&config.modules, &config.routes, Platform::current());
        let table = build_route_table(config, &registry);
        let routes = table.len();
        let router = Self::build_router(&config.server, table);

        Self {
            router,
            registry,
            routes,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(server: &ServerConfig, table: RouteTable) -> Router {
        Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            .with_state(Arc::new(table))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(server.request_timeout_secs),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(RequestUuid))
    }

    /// The router, for serving on a custom listener or in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.routes
    }

    /// Serve on `listener` until `shutdown` fires, then drain requests and
    /// close the shell pool.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.routes, "HTTP server starting");

        let result = axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown::wait_for(shutdown))
            .await;

        self.registry.shutdown();
        result?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Compile every configured route into a route service.
///
/// Routes without an available executer or with an invalid pattern are
/// skipped with an error log.
pub fn build_route_table(config: &AppConfig, registry: &ExecuterRegistry) -> RouteTable {
    let cache = Arc::new(ResponseCache::from_config(&config.modules.cache));
    let mut table = RouteTable::new();

    for declared in &config.routes {
        let route = compile_route(declared);
        let label = route.label.clone();

        let Some(spec) = route.exec.clone() else {
            tracing::error!(route = %label, "No execution configured, route skipped");
            continue;
        };
        let executer = match registry.for_route(&spec) {
            Ok(executer) => executer,
            Err(e) => {
                tracing::error!(route = %label, error = %e, "Route skipped");
                continue;
            }
        };

        let method = route.method.clone();
        let pattern = route.pattern.clone();
        let caching = route.caching;
        let handler = Arc::new(RouteHandler::new(
            route,
            spec.clone(),
            executer,
            config.server.max_body_size,
        ));

        let service = tower::service_fn(move |request: Request| {
            let handler = handler.clone();
            async move { Ok::<_, Infallible>(handler.handle(request).await) }
        });
        let service: RouteService = if caching {
            BoxCloneSyncService::new(
                ServiceBuilder::new()
                    .layer(axum::middleware::from_fn_with_state(cache.clone(), cache_response))
                    .service(service),
            )
        } else {
            BoxCloneSyncService::new(service)
        };

        if let Err(e) = table.register(method, &pattern, label.clone(), service) {
            tracing::error!(route = %label, error = %e, "Invalid route pattern, route skipped");
            continue;
        }
        tracing::info!(route = %label, mode = %spec.mode(), caching, "Route registered");
    }

    table
}

/// Catch-all handler: hand the request to the route table.
async fn dispatch(State(table): State<Arc<RouteTable>>, request: Request) -> Response {
    table.dispatch(request).await
}
