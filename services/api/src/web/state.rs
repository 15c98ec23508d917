//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::notifier::ConnectionRegistry;
use crate::web::views::Authors;
use doubtstack_core::{Activity, DatabaseService, PortResult};
use std::sync::Arc;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests and Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub activity: Activity,
    pub connections: Arc<ConnectionRegistry>,
}

impl AppState {
    /// Wires the activity chain to the database and the live connection registry.
    pub fn new(db: Arc<dyn DatabaseService>, config: Arc<Config>) -> Self {
        let connections = Arc::new(ConnectionRegistry::new());
        let activity = Activity::new(db.clone(), connections.clone());
        Self {
            db,
            config,
            activity,
            connections,
        }
    }

    /// Loads the users behind `ids` once, for embedding author blocks in a response.
    pub async fn authors<I>(&self, ids: I) -> PortResult<Authors>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut ids: Vec<Uuid> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Authors::new());
        }
        let users = self.db.get_users_by_ids(&ids).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }
}
