//! Application bootstrap and dependency wiring.
//!
//! This module is the composition root - the single place where the gateway's shared
//! services are instantiated and wired together, kept deliberately small: the gateway
//! has no per-speaker discovery or topology state to wire up, just a connection
//! tracker and a shutdown signal shared by every session.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::WsConnectionManager;
use crate::state::Config;

/// Container for the gateway's process-wide services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Tracks active downstream WebSocket connections for force-close on shutdown.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Application configuration.
    pub config: Config,
    /// Cancellation token for graceful shutdown, inherited by every session.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Initiates graceful shutdown: cancels every in-flight session and force-closes
    /// any downstream connection still registered.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] beginning graceful shutdown");
        self.cancel_token.cancel();
        let closed = self.ws_manager.close_all();
        log::info!("[Bootstrap] closed {closed} connection(s) during shutdown");
    }
}

/// Bootstraps the gateway's process-wide services.
#[must_use]
pub fn bootstrap_services(config: Config) -> BootstrappedServices {
    BootstrappedServices {
        ws_manager: Arc::new(WsConnectionManager::new()),
        config,
        cancel_token: CancellationToken::new(),
    }
}
