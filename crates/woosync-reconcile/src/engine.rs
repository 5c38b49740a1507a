//! Reconciliation engine
//!
//! Decides, for one (local, remote) pair belonging to the same logical
//! entity, which side is master and what to do about it. The decision is a
//! pure function of the two modification timestamps and the link state.

use tracing::trace;
use woosync_core::domain::{LocalVersion, RemoteVersion};

/// What to do with a record pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create the local record from the remote one
    CreateLocal,
    /// Create the remote record from the local one
    CreateRemote,
    /// Remote is master: overwrite mapped local fields
    UpdateLocalFromRemote,
    /// Local is master: overwrite mapped remote fields
    UpdateRemoteFromLocal,
    /// Nothing to do
    Skip(SkipReason),
}

/// Why a pair is skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither side exists
    NothingToReconcile,
    /// Local record only, and no enabled link asks for a remote record
    NotLinked,
    /// Neither side changed since the last successful sync
    InSync,
}

/// Outcome of [`ReconciliationEngine::decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    /// The local link is disabled but the remote side shows activity;
    /// the caller re-enables it before applying `action`
    pub reenable_link: bool,
}

impl Decision {
    fn new(action: Action) -> Self {
        Self {
            action,
            reenable_link: false,
        }
    }

    /// Whether the decision writes anything
    pub fn is_skip(&self) -> bool {
        matches!(self.action, Action::Skip(_))
    }
}

/// Per-pair decision maker
pub struct ReconciliationEngine;

impl ReconciliationEngine {
    /// Decide what to do with a pair
    ///
    /// Equal timestamps make the remote side master.
    pub fn decide(local: Option<&LocalVersion>, remote: Option<&RemoteVersion>) -> Decision {
        let decision = match (local, remote) {
            (None, None) => Decision::new(Action::Skip(SkipReason::NothingToReconcile)),
            (None, Some(_)) => Decision::new(Action::CreateLocal),
            (Some(local), None) => {
                let pending = local
                    .link
                    .as_ref()
                    .is_some_and(|link| link.is_pending_create());
                if pending {
                    Decision::new(Action::CreateRemote)
                } else {
                    Decision::new(Action::Skip(SkipReason::NotLinked))
                }
            }
            (Some(local), Some(remote)) => {
                let reenable_link = local.link.as_ref().is_some_and(|link| !link.enabled);
                let in_sync = local
                    .link
                    .as_ref()
                    .is_some_and(|link| link.is_in_sync(local.modified, remote.modified));

                let action = if in_sync {
                    Action::Skip(SkipReason::InSync)
                } else if remote.modified >= local.modified {
                    Action::UpdateLocalFromRemote
                } else {
                    Action::UpdateRemoteFromLocal
                };
                Decision {
                    action,
                    reenable_link,
                }
            }
        };

        trace!(
            local = ?local.map(|l| l.modified),
            remote = ?remote.map(|r| r.modified),
            action = ?decision.action,
            reenable = decision.reenable_link,
            "Reconciliation decision"
        );
        decision
    }
}
