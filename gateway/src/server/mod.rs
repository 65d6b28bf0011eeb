/// Broker transport: connection setup and the uplink forwarding loop.
pub mod broker;

/// The latest-packet-per-role snapshot cache.
pub mod cache;

/// Ordered rule table mapping uplinks to device roles.
pub mod classify;

/// Fan-out of classified packets to dashboard clients.
pub mod dispatch;

/// Encoding and publishing of operator commands.
pub mod downlink;

/// Server error components.
pub mod error;

/// The ingest loop turning raw uplinks into classified packets.
pub mod ingest;

/// All server API route functions.
pub mod routes;

use axum::Router;
pub use cache::StateCache;
pub use classify::Classifier;
pub use dispatch::Dispatcher;
pub use downlink::DownlinkPublisher;
pub use error::{ServerError as Error, ServerResult as Result};
pub use ingest::Ingestor;
use jeflog::task;
use tower_http::cors::{self, CorsLayer};

use std::{
  io,
  net::SocketAddr,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
};
use tokio::{net::TcpListener, task::JoinHandle};

/// Running totals of what the gateway has processed.
#[derive(Debug, Default)]
pub struct Statistics {
  /// Uplinks classified and broadcast.
  pub ingested: AtomicUsize,

  /// Uplinks that were not valid JSON.
  pub malformed: AtomicUsize,

  /// Uplinks without a device identifier or decoded payload.
  pub incomplete: AtomicUsize,

  /// Uplinks classified as `Role::Unknown`.
  pub unknown: AtomicUsize,

  /// Downlinks handed to the broker client.
  pub downlinks_sent: AtomicUsize,

  /// Downlinks the broker client refused.
  pub downlinks_failed: AtomicUsize,
}

impl Statistics {
  /// Increments one of the counters.
  pub fn count(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Reads one of the counters.
  pub fn read(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::Relaxed)
  }

  /// One-line summary suitable for logging.
  pub fn summary(&self) -> String {
    format!(
      "{} ingested, {} unknown, {} malformed, {} incomplete, {} downlinks sent, {} failed",
      Self::read(&self.ingested),
      Self::read(&self.unknown),
      Self::read(&self.malformed),
      Self::read(&self.incomplete),
      Self::read(&self.downlinks_sent),
      Self::read(&self.downlinks_failed),
    )
  }
}

/// Contains all of the gateway's shared server state.
#[derive(Clone, Debug)]
pub struct Shared {
  /// Latest packet of every known role.
  pub cache: StateCache,

  /// Fan-out to connected dashboard clients.
  pub dispatcher: Dispatcher,

  /// Publisher for operator commands.
  pub downlink: DownlinkPublisher,

  /// Running totals, reported at shutdown.
  pub statistics: Arc<Statistics>,

  /// Whether every routed packet and command is logged.
  pub verbose: bool,
}

impl Shared {
  /// Wires a fresh, empty cache into a new dispatcher.
  pub fn new(downlink: DownlinkPublisher, verbose: bool) -> Self {
    let cache = StateCache::new();

    Shared {
      dispatcher: Dispatcher::new(cache.clone()),
      cache,
      downlink,
      statistics: Arc::new(Statistics::default()),
      verbose,
    }
  }
}

/// The server, constructed with all route functions ready.
#[derive(Clone, Debug)]
pub struct Server {
  /// The shared state of the server, to be passed to route functions.
  pub shared: Shared,
}

async fn wait_for_shutdown(shutdown_future: JoinHandle<io::Result<()>>) {
  let _ = shutdown_future.await;
}

impl Server {
  /// Constructs a new `Server` around the given downlink publisher.
  pub fn new(downlink: DownlinkPublisher, verbose: bool) -> Self {
    Server {
      shared: Shared::new(downlink, verbose),
    }
  }

  /// Builds the router with every route function and permissive CORS.
  pub fn router(&self) -> Router {
    use axum::routing::{get, post};

    let cors = CorsLayer::new()
      .allow_methods(cors::Any)
      .allow_headers(cors::Any)
      .allow_origin(cors::Any);

    Router::new()
      .route("/data/forward", get(routes::forward_data))
      .route("/data/snapshot", get(routes::get_snapshot))
      .route("/data/snapshot/:role", get(routes::get_role_snapshot))
      .route("/operator/command", post(routes::dispatch_operator_command))
      .layer(cors)
      .with_state(self.shared.clone())
  }

  /// Serves the route functions on the given port. Exits when the
  /// shutdown_future returns via a graceful shutdown.
  ///
  /// Open WebSocket connections are not drained, so the process may exit
  /// while dashboards are still attached.
  pub async fn serve(
    &self,
    port: u16,
    shutdown_future: JoinHandle<io::Result<()>>,
  ) -> io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    task!("Serving dashboard clients on \x1b[1m0.0.0.0:{port}\x1b[0m.");

    self.serve_on(listener, shutdown_future).await
  }

  /// Serves the route functions on an already bound listener, until the
  /// shutdown_future returns.
  pub async fn serve_on(
    &self,
    listener: TcpListener,
    shutdown_future: JoinHandle<io::Result<()>>,
  ) -> io::Result<()> {
    let router = self
      .router()
      .into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, router)
      .with_graceful_shutdown(wait_for_shutdown(shutdown_future))
      .await?;

    Ok(())
  }
}
