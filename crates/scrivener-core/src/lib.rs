//! Domain core: credential verification, chat sessions and their message
//! logs, the generated-content archive, and the per-turn orchestrator that
//! ties them to a text generator.
//!
//! Every store is a cheap handle over a shared [`Database`]. Store calls are
//! blocking; async callers wrap them in `spawn_blocking`.

pub mod auth;
pub mod content;
mod convert;
pub mod error;
pub mod messages;
pub mod orchestrator;
pub mod preferences;
pub mod sessions;

use std::sync::Arc;

use scrivener_db::Database;

pub use auth::CredentialStore;
pub use content::ContentArchive;
pub use error::{CoreError, CoreResult};
pub use messages::MessageLog;
pub use orchestrator::{Orchestrator, OrchestratorConfig, PendingTurn, TurnEvent, TurnOutcome, TurnRequest};
pub use preferences::PreferenceStore;
pub use sessions::SessionLedger;

/// All stores over one database.
#[derive(Clone)]
pub struct Stores {
    pub credentials: CredentialStore,
    pub sessions: SessionLedger,
    pub messages: MessageLog,
    pub content: ContentArchive,
    pub preferences: PreferenceStore,
}

impl Stores {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            credentials: CredentialStore::new(db.clone()),
            sessions: SessionLedger::new(db.clone()),
            messages: MessageLog::new(db.clone()),
            content: ContentArchive::new(db.clone()),
            preferences: PreferenceStore::new(db),
        }
    }
}
