//! Chat routing: validate, persist, then forward at most once.

use chrono::Utc;
use cipher_proto::{ChatFrame, ServerFrame};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use super::{Session, SessionManager};
use crate::error::{SessionError, SessionResult};
use crate::metrics;
use crate::state::Outbound;
use crate::store::{ChatMessage, NewMessage};

impl SessionManager {
    /// Route an inbound chat frame from `session`.
    ///
    /// The sender is always the session's user. The message is durably stored
    /// before any forward is attempted, and a failed forward is never reported
    /// to the sender.
    pub(super) async fn route_chat(&self, session: &Session, chat: ChatFrame) -> SessionResult {
        chat.check_length(self.policy.max_content_length)?;

        let recipient = self
            .directory
            .resolve(&chat.receiver_id)
            .await
            .map_err(SessionError::DirectoryFailure)?;
        if recipient.is_none() {
            return Err(SessionError::UnknownRecipient(chat.receiver_id));
        }

        let stored = self
            .store
            .append(NewMessage {
                sender_id: session.user_id.clone(),
                receiver_id: chat.receiver_id,
                content: chat.content,
                timestamp: Utc::now(),
            })
            .await
            .map_err(SessionError::PersistenceFailure)?;
        metrics::inc_persisted();

        match self.forward(&stored) {
            Ok(true) => debug!(message_id = stored.id, to = %stored.receiver_id, "Message forwarded"),
            Ok(false) => debug!(message_id = stored.id, to = %stored.receiver_id, "Recipient offline"),
            Err(e) => debug!(message_id = stored.id, error = %e, "Forward failed"),
        }
        Ok(())
    }

    /// Enqueue a stored message on its recipient's live session, if any.
    ///
    /// Never waits: a full recipient queue drops the forward. Returns
    /// `Ok(false)` when the recipient has no registered session.
    pub fn forward(&self, message: &ChatMessage) -> SessionResult<bool> {
        let Some(handle) = self.registry.get(&message.receiver_id) else {
            return Ok(false);
        };

        let frame = Arc::new(ServerFrame::Message(message.into()));
        match handle.try_send(Outbound::Frame(frame)) {
            Ok(()) => {
                metrics::inc_delivered();
                Ok(true)
            }
            Err(TrySendError::Full(_)) => {
                metrics::record_forward_dropped("queue_full");
                warn!(to = %message.receiver_id, message_id = message.id, "Recipient queue full, forward dropped");
                Err(SessionError::ForwardFailure(message.receiver_id.clone()))
            }
            Err(TrySendError::Closed(_)) => {
                metrics::record_forward_dropped("closed");
                Err(SessionError::ForwardFailure(message.receiver_id.clone()))
            }
        }
    }
}
