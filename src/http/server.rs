//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Validate the configuration, including ones built in code
//! - Normalize the listen address and load TLS material
//! - Build the schema routes plus `GET /`
//! - Wire up middleware (request ID, tracing)
//! - Bind, and report bind failures before returning
//! - Periodically log how many requests are in flight
//! - Shut down: cancel tracked requests, then close the listener
//!
//! # Design Decisions
//! - `launch` returns only once the socket is listening, or with the error
//!   that prevented it
//! - Server state moves Listening → Draining → Closed and never back

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Json, Router};
use axum_server::Handle;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::config::address::{self, AddressError};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig, Protocol};
use crate::http::middleware::log_request;
use crate::http::request::{make_span, propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::Shutdown;
use crate::net::tls::{load_tls_config, TlsError};
use crate::net::InFlightRequests;
use crate::query::GroupRegistry;
use crate::routing::{build_api_router, HandlerMap, RouteSchema, RouterError};

/// How long closing connections get after in-flight requests are cancelled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("error parsing server address {address}: {source}")]
    Address {
        address: String,
        #[source]
        source: AddressError,
    },
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error(transparent)]
    Tls(#[from] TlsError),
    #[error("error launching server at {address}: {source}")]
    Listen {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// Server lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Listening,
    Draining,
    Closed,
}

#[derive(Clone)]
struct AppState {
    version: Arc<str>,
}

async fn version_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "version": &*state.version }))
}

/// The full application router: `GET /`, the schema routes, and the
/// request-wide layers.
pub fn build_app(version: &str, api: Router) -> Router {
    let state = AppState {
        version: Arc::from(version),
    };

    Router::new()
        .route("/", get(version_info).layer(from_fn(log_request)))
        .with_state(state)
        .merge(api)
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(set_request_id_layer())
}

/// Start serving `schema` with the built-in parse groups.
pub async fn launch(
    config: &GatewayConfig,
    schema: &RouteSchema,
    handlers: &HandlerMap,
) -> Result<Server, LaunchError> {
    launch_with_registry(config, schema, handlers, GroupRegistry::with_builtins()).await
}

/// Start serving `schema` with a caller-supplied group registry.
///
/// `params.types` from the schema are added to `registry` before routes are
/// compiled.
pub async fn launch_with_registry(
    config: &GatewayConfig,
    schema: &RouteSchema,
    handlers: &HandlerMap,
    mut registry: GroupRegistry,
) -> Result<Server, LaunchError> {
    validate_config(config).map_err(ConfigError::Validation)?;

    let proto = config.web.proto;
    let address = address::normalize_address(&config.web.server, proto.default_port()).map_err(
        |source| LaunchError::Address {
            address: config.web.server.clone(),
            source,
        },
    )?;
    let socket_addr = address::resolve(&address).map_err(|source| LaunchError::Address {
        address: address.clone(),
        source,
    })?;

    schema.register_types(&mut registry);
    let in_flight = InFlightRequests::new();
    let api = build_api_router(schema, handlers, &registry, &in_flight, &config.limits)?;
    let app = build_app(&config.version, api).into_make_service();

    let handle = Handle::new();
    let serve_task = match proto {
        Protocol::Https => {
            let tls = load_tls_config(config).await?;
            tokio::spawn(
                axum_server::bind_rustls(socket_addr, tls)
                    .handle(handle.clone())
                    .serve(app),
            )
        }
        Protocol::Http => tokio::spawn(axum_server::bind(socket_addr).handle(handle.clone()).serve(app)),
    };

    let local_addr = match handle.listening().await {
        Some(addr) => addr,
        None => {
            let source = match serve_task.await {
                Ok(Err(e)) => e,
                Ok(Ok(())) => io::Error::other("server exited before listening"),
                Err(e) => io::Error::other(e),
            };
            if source.kind() == io::ErrorKind::AddrInUse {
                tracing::error!(
                    address = %address,
                    "address of HTTP server already bound by another process"
                );
            } else {
                tracing::error!(address = %address, error = %source, "error from http server");
            }
            return Err(LaunchError::Listen { address, source });
        }
    };

    let host = address
        .rsplit_once(':')
        .map(|(host, _)| host.trim_start_matches("http://").trim_start_matches("https://"))
        .unwrap_or_default();
    let base_url = address::base_url(proto.as_str(), &format!("{host}:{}", local_addr.port()));
    tracing::debug!(url = ?base_url, "calculated server url");
    tracing::info!(address = %local_addr, proto = proto.as_str(), "HTTP server listening");

    let shutdown = Shutdown::new();
    let (state_tx, _) = watch::channel(ServerState::Listening);
    let state = Arc::new(state_tx);

    spawn_in_flight_logger(
        in_flight.clone(),
        Duration::from_secs(config.observability.in_flight_log_interval_secs),
        &shutdown,
    );

    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            match serve_task.await {
                Ok(Ok(())) => tracing::info!("server closed"),
                Ok(Err(e)) => tracing::error!(error = %e, "error closing server"),
                Err(e) => tracing::error!(error = %e, "error closing server"),
            }
            state.send_replace(ServerState::Closed);
        });
    }

    Ok(Server {
        local_addr,
        base_url,
        in_flight,
        handle,
        shutdown,
        state,
    })
}

fn spawn_in_flight_logger(in_flight: InFlightRequests, period: Duration, shutdown: &Shutdown) {
    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::info!("Handling {} connected queries.", in_flight.len());
                }
                _ = stop.recv() => break,
            }
        }
    });
}

/// A running gateway.
pub struct Server {
    local_addr: SocketAddr,
    base_url: Option<String>,
    in_flight: InFlightRequests,
    handle: Handle,
    shutdown: Shutdown,
    state: Arc<watch::Sender<ServerState>>,
}

impl Server {
    /// The bound address, with the real port when `0` was configured.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// e.g. `http://localhost:4000`; wildcard hosts are shown as localhost.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Requests currently tracked.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Cancel every tracked request and close the listener.
    ///
    /// Only the first call does anything; it returns whether it was that call.
    pub fn shutdown(&self) -> bool {
        let started = self.state.send_if_modified(|state| {
            if *state == ServerState::Listening {
                *state = ServerState::Draining;
                true
            } else {
                false
            }
        });
        if !started {
            return false;
        }

        let cancelled = self.in_flight.shutdown_all();
        tracing::info!(requests = cancelled, "Shutting down HTTP server");

        self.shutdown.trigger();
        self.handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        true
    }

    /// Resolves once the listener is closed.
    pub async fn closed(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s == ServerState::Closed).await;
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .field("base_url", &self.base_url)
            .field("state", &self.state())
            .finish()
    }
}
