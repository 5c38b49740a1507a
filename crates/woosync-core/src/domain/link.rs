//! Links between local records and remote records
//!
//! A [`SyncLink`] ties a local record to one remote record on one server.
//! It also carries the watermarks recorded at the last successful sync, which
//! let the reconciliation engine recognise pairs that have not changed since.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{RemoteId, ServerId};

/// Relation between a local record and a remote record on one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLink {
    /// Remote server this link points to
    pub server: ServerId,
    /// Remote id; `None` means "create on first sync"
    pub remote_id: Option<RemoteId>,
    /// Whether synchronisation is enabled for this link
    pub enabled: bool,
    /// Remote modification time observed at the last successful sync
    pub last_remote_modified: Option<DateTime<Utc>>,
    /// Local modification time written or observed at the last successful sync
    pub last_local_modified: Option<DateTime<Utc>>,
}

impl SyncLink {
    /// An enabled link to an existing remote record
    pub fn linked(server: ServerId, remote_id: RemoteId) -> Self {
        Self {
            server,
            remote_id: Some(remote_id),
            enabled: true,
            last_remote_modified: None,
            last_local_modified: None,
        }
    }

    /// An enabled link whose remote record does not exist yet
    pub fn pending(server: ServerId) -> Self {
        Self {
            server,
            remote_id: None,
            enabled: true,
            last_remote_modified: None,
            last_local_modified: None,
        }
    }

    /// Enabled with a blank remote id: the remote record must be created
    pub fn is_pending_create(&self) -> bool {
        self.enabled && self.remote_id.is_none()
    }

    /// Record the watermarks of a successful sync
    pub fn mark_synced(&mut self, remote_modified: DateTime<Utc>, local_modified: DateTime<Utc>) {
        self.last_remote_modified = Some(remote_modified);
        self.last_local_modified = Some(local_modified);
    }

    /// Whether neither side changed since the last successful sync
    pub fn is_in_sync(&self, local_modified: DateTime<Utc>, remote_modified: DateTime<Utc>) -> bool {
        match (self.last_local_modified, self.last_remote_modified) {
            (Some(local_mark), Some(remote_mark)) => {
                local_modified <= local_mark && remote_modified <= remote_mark
            }
            _ => false,
        }
    }
}

/// The set of links of one local record, at most one per server
///
/// Enforces the invariant that a record has at most one link (and therefore
/// at most one enabled link) per remote server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncLinks(Vec<SyncLink>);

impl SyncLinks {
    /// An empty link set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a link, replacing any existing link for the same server
    pub fn upsert(&mut self, link: SyncLink) {
        match self.0.iter_mut().find(|l| l.server == link.server) {
            Some(existing) => *existing = link,
            None => self.0.push(link),
        }
    }

    /// The link for a server, if any
    pub fn for_server(&self, server: &ServerId) -> Option<&SyncLink> {
        self.0.iter().find(|l| &l.server == server)
    }

    /// Mutable access to the link for a server, if any
    pub fn for_server_mut(&mut self, server: &ServerId) -> Option<&mut SyncLink> {
        self.0.iter_mut().find(|l| &l.server == server)
    }

    /// All enabled links
    pub fn enabled(&self) -> impl Iterator<Item = &SyncLink> {
        self.0.iter().filter(|l| l.enabled)
    }

    /// All links
    pub fn iter(&self) -> impl Iterator<Item = &SyncLink> {
        self.0.iter()
    }

    /// Number of links
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no links
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<SyncLink> for SyncLinks {
    fn from_iter<T: IntoIterator<Item = SyncLink>>(iter: T) -> Self {
        let mut links = SyncLinks::new();
        for link in iter {
            links.upsert(link);
        }
        links
    }
}

/// What the reconciliation engine needs to know about a local record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVersion {
    /// Local modification time
    pub modified: DateTime<Utc>,
    /// The record's link for the server being reconciled
    pub link: Option<SyncLink>,
}

/// What the reconciliation engine needs to know about a remote record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteVersion {
    /// Remote modification time
    pub modified: DateTime<Utc>,
}
