//! A configured server paired with its remote client

use std::sync::Arc;

use woosync_core::config::ServerConfig;
use woosync_core::domain::ServerId;
use woosync_core::ports::IRemoteApi;
use woosync_reconcile::MappingSet;

/// Everything a synchroniser needs to talk to one server
#[derive(Clone)]
pub struct SyncTarget {
    pub config: ServerConfig,
    pub server: ServerId,
    pub remote: Arc<dyn IRemoteApi>,
    /// Compiled `item_field_map`
    pub mappings: MappingSet,
}

impl SyncTarget {
    /// Pair a server configuration with its client
    ///
    /// The server id is taken from the client so that links always name
    /// the server the records actually came from.
    pub fn new(config: ServerConfig, remote: Arc<dyn IRemoteApi>) -> Self {
        let mappings = MappingSet::compile(&config.item_field_map);
        Self {
            server: remote.server().clone(),
            config,
            remote,
            mappings,
        }
    }

    /// Whether batch passes and single-record syncs may touch this server
    pub fn is_enabled(&self) -> bool {
        self.config.enable_sync
    }
}

impl std::fmt::Debug for SyncTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncTarget")
            .field("server", &self.server)
            .field("enable_sync", &self.config.enable_sync)
            .field("mapping_rules", &self.mappings.rules_count())
            .finish()
    }
}
