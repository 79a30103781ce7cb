use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use scrivener_core::{Orchestrator, Stores};
use scrivener_provider::BoxGenerator;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub stores: Stores,
    pub orchestrator: Orchestrator<BoxGenerator>,
    /// Parent of every generation's cancellation token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

impl AppStateInner {
    pub fn new(stores: Stores, orchestrator: Orchestrator<BoxGenerator>) -> AppState {
        Arc::new(Self {
            stores,
            orchestrator,
            shutdown: CancellationToken::new(),
        })
    }
}
