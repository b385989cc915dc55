//! HTTP(S) and WebSocket listener.
//!
//! A single port serves:
//! - `GET /` - the index page, or the location stream when the request is a
//!   WebSocket upgrade (`/ws` is accepted too)
//! - `GET /location` - the current location as JSON, `204` before the first fix
//! - everything else - static files from the public directory
//!
//! Connections are accepted here and, when a certificate is configured,
//! wrapped in TLS before being handed to hyper.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_native_tls::TlsAcceptor;
use tower::Service;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use gpsbridge_core::config::ServerSettings;
use gpsbridge_core::LocationStore;
use gpsbridge_protocol::encode_location;

use crate::hub::BroadcastHub;

/// Configuration for the listener.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Directory holding `index.html` and other static assets.
    pub public_dir: PathBuf,
    /// Outbound queue depth per subscriber.
    pub subscriber_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            bind_addr: settings.bind_addr,
            public_dir: settings.public_dir.clone(),
            subscriber_queue: settings.subscriber_queue,
        }
    }
}

/// Errors that stop the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// State shared by all route handlers.
#[derive(Clone)]
struct AppState {
    hub: Arc<BroadcastHub>,
    config: Arc<ServerConfig>,
}

/// The bridge's HTTP(S)/WebSocket server.
pub struct BridgeServer {
    config: ServerConfig,
    hub: Arc<BroadcastHub>,
    tls: Option<TlsAcceptor>,
}

impl BridgeServer {
    /// Create a plain HTTP/WS server.
    pub fn new(config: ServerConfig, hub: Arc<BroadcastHub>) -> Self {
        Self {
            config,
            hub,
            tls: None,
        }
    }

    /// Terminate TLS on every accepted connection.
    pub fn with_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls = Some(acceptor);
        self
    }

    /// Build the router.
    ///
    /// Handlers expect `ConnectInfo<SocketAddr>` in the request extensions,
    /// which [`BridgeServer::serve`] inserts.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            config: Arc::new(self.config.clone()),
        };

        Router::new()
            .route("/", get(root_handler))
            .route("/ws", get(root_handler))
            .route("/location", get(location_handler))
            .fallback_service(ServeDir::new(&self.config.public_dir))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and serve forever.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener.local_addr().map_err(ServerError::LocalAddr)?;
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        info!("GPS bridge listening on {}://{}", scheme, local);

        let router = self.router();

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let router = router.clone();
                    let tls = self.tls.clone();

                    tokio::spawn(async move {
                        match tls {
                            Some(acceptor) => match acceptor.accept(stream).await {
                                Ok(stream) => serve_connection(stream, addr, router).await,
                                Err(e) => warn!("TLS handshake with {} failed: {}", addr, e),
                            },
                            None => serve_connection(stream, addr, router).await,
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Drive one HTTP connection, including WebSocket upgrades.
async fn serve_connection<S>(stream: S, addr: SocketAddr, router: Router)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(addr));
        router.clone().call(request)
    });

    if let Err(e) = auto::Builder::new(TokioExecutor::new())
        .serve_connection_with_upgrades(TokioIo::new(stream), service)
        .await
    {
        debug!("Connection from {} ended with error: {}", addr, e);
    }
}

/// `GET /`: upgrade to the location stream, or serve the index page.
async fn root_handler(
    upgrade: Option<WebSocketUpgrade>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    match upgrade {
        Some(ws) => ws.on_upgrade(move |socket| handle_subscriber(socket, addr, state)),
        None => index_page(&state.config).await,
    }
}

async fn index_page(config: &ServerConfig) -> Response {
    let path = config.public_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            warn!("Cannot serve {}: {}", path.display(), e);
            (StatusCode::NOT_FOUND, "index.html not found").into_response()
        }
    }
}

/// `GET /location`: the current location, if any.
async fn location_handler(State(state): State<AppState>) -> Response {
    let current = state.hub.store().read().await.get();
    match current {
        Some(location) => Json(location).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Handle a single WebSocket subscriber until it disconnects.
async fn handle_subscriber(socket: WebSocket, addr: SocketAddr, state: AppState) {
    info!("Subscriber connected from {}", addr);

    let (tx, mut rx) = mpsc::channel(state.config.subscriber_queue.max(1));
    let id = state.hub.on_connect(tx).await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Clients have nothing to say; only watch for the connection ending.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Subscriber {} disconnected", addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if ws_tx.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                }
            }

            location = rx.recv() => {
                let Some(location) = location else {
                    break;
                };
                let text = match encode_location(&location) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Not sending {} to {}: {}", location, addr, e);
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(Message::Text(text)).await {
                    debug!("Failed to send location to {}: {}", addr, e);
                    break;
                }
            }
        }
    }

    state.hub.on_disconnect(id).await;
}
