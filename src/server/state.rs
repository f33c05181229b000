use std::sync::Arc;

use crate::chords::ChordPipeline;
use crate::user::UserStore;

use super::live_connections::LiveConnections;
use super::ServerConfig;

pub type GuardedUserStore = Arc<dyn UserStore>;
pub type GuardedChordPipeline = Arc<ChordPipeline>;
pub type GuardedLiveConnections = Arc<LiveConnections>;

/// Read-only collaborators shared by every connection handler. No session data lives here.
#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub user_store: GuardedUserStore,
    pub pipeline: GuardedChordPipeline,
    pub live_connections: GuardedLiveConnections,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        user_store: GuardedUserStore,
        pipeline: GuardedChordPipeline,
    ) -> Self {
        Self {
            config,
            user_store,
            pipeline,
            live_connections: LiveConnections::new(),
        }
    }
}
