use std::sync::Arc;

use cr_domain::config::Config;
use cr_engine::{EngineDriver, IdentityStore};

use crate::events::EventRouter;
use crate::sessions::registry::SessionRegistry;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// The one shared mutable structure in the process.
    pub registry: Arc<SessionRegistry>,
    /// Durable device identities (the only persisted state).
    pub identities: Arc<dyn IdentityStore>,
    /// Factory for protocol connections.
    pub driver: Arc<dyn EngineDriver>,
    /// Dispatches engine events into the registry and the relay.
    pub router: EventRouter,
}
