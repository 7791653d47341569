//! HTTP/WebSocket API layer.
//!
//! Thin handlers delegate to the engine (via the command queue), the configuration
//! snapshot, and the auth gate; this module just wires the router together and owns the
//! shared application state.

pub mod http;
pub mod response;
pub mod ws;
pub mod ws_connection;

pub use ws_connection::WsConnectionManager;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use thiserror::Error;

use crate::command::CommandSender;
use crate::config::{Config, SharedSnapshot};
use crate::engine::SharedEngineStatus;
use crate::events::BroadcastEventBridge;
use crate::model::profile::AccessProfile;
use crate::universe::UniverseStore;

/// Errors that can occur when starting the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    #[error("no available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Shared application state for the API layer.
///
/// Every field is a cheaply-cloneable handle; [`AppState`] itself is `Clone` so axum can
/// hand a copy to every handler/connection without locking the whole struct.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative per-universe channel arrays (read-only from this layer).
    pub store: Arc<UniverseStore>,
    /// The active configuration snapshot, atomically swapped on every mutation.
    pub snapshot: SharedSnapshot,
    /// Sends commands into the engine's single command queue.
    pub commands: CommandSender,
    /// Fans broadcast events out to connected WebSocket clients.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Tracks live WebSocket connections for registration and mass force-close.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Latest published engine state (global master, active scene id).
    pub engine_status: SharedEngineStatus,
    /// Persisted server settings (password, secret key, IP whitelist). Never mutated by
    /// this layer; the core treats the configuration file as an input only (§6).
    pub config: Arc<Config>,
}

/// Builder for constructing an [`AppState`].
#[derive(Default)]
pub struct AppStateBuilder {
    store: Option<Arc<UniverseStore>>,
    snapshot: Option<SharedSnapshot>,
    commands: Option<CommandSender>,
    event_bridge: Option<Arc<BroadcastEventBridge>>,
    ws_manager: Option<Arc<WsConnectionManager>>,
    engine_status: Option<SharedEngineStatus>,
    config: Option<Arc<Config>>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populates every field that overlaps with [`crate::bootstrap::BootstrappedServices`].
    pub fn from_services(mut self, services: &crate::bootstrap::BootstrappedServices) -> Self {
        self.store = Some(Arc::clone(&services.store));
        self.snapshot = Some(Arc::clone(&services.snapshot));
        self.commands = Some(services.commands.clone());
        self.event_bridge = Some(Arc::clone(&services.event_bridge));
        self.ws_manager = Some(Arc::clone(&services.ws_manager));
        self.engine_status = Some(Arc::clone(&services.engine_status));
        self.config = Some(Arc::clone(&services.config));
        self
    }

    pub fn store(mut self, store: Arc<UniverseStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn snapshot(mut self, snapshot: SharedSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn commands(mut self, commands: CommandSender) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn event_bridge(mut self, bridge: Arc<BroadcastEventBridge>) -> Self {
        self.event_bridge = Some(bridge);
        self
    }

    pub fn ws_manager(mut self, manager: Arc<WsConnectionManager>) -> Self {
        self.ws_manager = Some(manager);
        self
    }

    pub fn engine_status(mut self, status: SharedEngineStatus) -> Self {
        self.engine_status = Some(status);
        self
    }

    pub fn config(mut self, config: Arc<Config>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> AppState {
        AppState {
            store: self.store.expect("store is required"),
            snapshot: self.snapshot.expect("snapshot is required"),
            commands: self.commands.expect("commands is required"),
            event_bridge: self.event_bridge.expect("event_bridge is required"),
            ws_manager: self.ws_manager.expect("ws_manager is required"),
            engine_status: self.engine_status.expect("engine_status is required"),
            config: self.config.expect("config is required"),
        }
    }
}

impl AppState {
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

/// Resolves the caller's [`AccessProfile`] from a bearer token, falling back to IP
/// whitelist auto-auth (§4.K). Shared by the HTTP auth-status/CRUD handlers and the
/// WebSocket handshake so both surfaces apply identical precedence.
pub(crate) fn resolve_profile(state: &AppState, addr: SocketAddr, token: Option<String>) -> Option<AccessProfile> {
    let snapshot = state.snapshot.load_full();
    if let Some(token) = token {
        if let Ok(claims) = crate::auth::authenticate_token(&state.config, &token) {
            if let Some(profile) = snapshot.profiles.iter().find(|p| p.name == claims.profile_name) {
                return Some(profile.clone());
            }
            // Token is valid but references a since-removed profile; fall through to
            // whitelist rather than granting a stale implicit admin.
        }
    }
    whitelist_profile(state, addr.ip(), &snapshot.profiles)
}

fn whitelist_profile(state: &AppState, ip: IpAddr, profiles: &[AccessProfile]) -> Option<AccessProfile> {
    crate::auth::whitelist_auto_auth(&state.config, ip, profiles).cloned()
}

async fn find_available_port(start: u16, end: u16) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    for port in start..=end {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        if let Ok(listener) = tokio::net::TcpListener::bind(addr).await {
            return Ok((port, listener));
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Default port-scan range when `config.port == 0`.
const PORT_SCAN_START: u16 = 8080;
const PORT_SCAN_END: u16 = 8099;

/// Binds and serves the HTTP/WebSocket API until the process exits or the listener
/// errors. `0` in `state.config.port` means "pick any available port in the scan range".
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let (port, listener) = if state.config.port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
        (state.config.port, tokio::net::TcpListener::bind(addr).await?)
    } else {
        find_available_port(PORT_SCAN_START, PORT_SCAN_END).await?
    };

    log::info!("[api] listening on http://0.0.0.0:{port}");
    let app = http::create_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
