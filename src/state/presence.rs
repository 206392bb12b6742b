//! Presence snapshots derived from the registry and the directory.

use cipher_proto::{PresenceEntry, ServerFrame};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use super::registry::{ConnectionRegistry, Outbound};
use super::uid::SessionId;
use crate::store::Directory;

/// Projects the connection registry into a list of online users.
#[derive(Clone)]
pub struct PresencePublisher {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<dyn Directory>,
}

impl PresencePublisher {
    pub fn new(registry: Arc<ConnectionRegistry>, directory: Arc<dyn Directory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    /// Online users with their display names, in registry snapshot order.
    ///
    /// Users that no longer resolve, or whose lookup fails, are left out.
    pub async fn snapshot(&self) -> Vec<PresenceEntry> {
        let user_ids = self.registry.list_user_ids();
        let mut users = Vec::with_capacity(user_ids.len());

        for user_id in user_ids {
            match self.directory.resolve(&user_id).await {
                Ok(Some(profile)) => users.push(profile.into()),
                Ok(None) => debug!(user_id = %user_id, "Online user no longer in directory"),
                Err(e) => warn!(user_id = %user_id, error = %e, "Presence lookup failed"),
            }
        }

        users
    }

    /// A presence frame built from a fresh snapshot.
    pub async fn frame(&self) -> ServerFrame {
        ServerFrame::presence(self.snapshot().await)
    }

    /// Push a fresh snapshot to every registered session except `skip`.
    ///
    /// Never waits on a recipient's queue. Returns how many sessions were reached.
    pub async fn broadcast(&self, skip: Option<SessionId>) -> usize {
        let frame = Arc::new(self.frame().await);
        let mut sent = 0;

        for (user_id, handle) in self.registry.handles() {
            if Some(handle.id()) == skip {
                continue;
            }
            match handle.try_send(Outbound::Frame(Arc::clone(&frame))) {
                Ok(()) => sent += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(user_id = %user_id, "Presence broadcast skipped, queue full")
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(user_id = %user_id, "Presence broadcast skipped, session gone")
                }
            }
        }

        sent
    }
}
