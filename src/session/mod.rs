//! Session lifecycle and frame dispatch.
//!
//! Each connected user gets one [`Session`], driven through
//! `Unauthenticated -> Open -> Closed` by the [`SessionManager`]. Only an
//! open session accepts frames, and nothing re-enters `Open`.
//!
//! The manager is the only writer of the [`ConnectionRegistry`]: it registers
//! a session on open and compare-and-removes it on close, so a stale
//! connection going away never evicts a newer one.

mod messaging;

use chrono::Utc;
use cipher_proto::{ClientFrame, CloseReason, FrameError, ServerFrame};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{LimitsConfig, ReplacePolicy, SessionConfig};
use crate::error::{SessionError, SessionResult};
use crate::metrics;
use crate::network::limit::RateLimiter;
use crate::state::{
    ConnectionRegistry, Outbound, PresencePublisher, SessionHandle, SessionId, SessionIdGenerator,
};
use crate::store::{Directory, MessageStore};
use crate::telemetry::FrameTimer;

/// Tunables the manager applies to every session.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub max_content_length: usize,
    pub max_frame_bytes: usize,
    pub messages_per_second: f32,
    pub message_burst: f32,
    pub on_replace: ReplacePolicy,
    pub broadcast_presence: bool,
}

impl SessionPolicy {
    pub fn from_config(session: &SessionConfig, limits: &LimitsConfig) -> Self {
        Self {
            max_content_length: limits.max_content_length,
            max_frame_bytes: limits.max_frame_bytes,
            messages_per_second: limits.messages_per_second,
            message_burst: limits.message_burst,
            on_replace: session.on_replace,
            broadcast_presence: session.broadcast_presence,
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default(), &LimitsConfig::default())
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake received, identity not yet checked.
    Unauthenticated,
    /// Registered and accepting frames.
    Open,
    /// Terminal.
    Closed,
}

/// Why a session is being closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent a close frame or the stream ended cleanly.
    ClientClosed,
    /// The transport failed underneath us.
    TransportError(String),
    /// No inbound frame within the idle timeout.
    IdleTimeout,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::TransportError(_) => "transport_error",
            Self::IdleTimeout => "idle_timeout",
        }
    }
}

/// One user's connection, as seen by the session core.
#[derive(Debug)]
pub struct Session {
    user_id: String,
    handle: SessionHandle,
    state: SessionState,
    limiter: RateLimiter,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn id(&self) -> SessionId {
        self.handle.id()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }
}

/// Drives every session's state machine.
pub struct SessionManager {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<dyn Directory>,
    store: Arc<dyn MessageStore>,
    presence: PresencePublisher,
    ids: SessionIdGenerator,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        directory: Arc<dyn Directory>,
        store: Arc<dyn MessageStore>,
        policy: SessionPolicy,
    ) -> Self {
        let presence = PresencePublisher::new(Arc::clone(&registry), Arc::clone(&directory));
        Self {
            registry,
            directory,
            store,
            presence,
            ids: SessionIdGenerator::new(),
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn presence(&self) -> &PresencePublisher {
        &self.presence
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Create an unauthenticated session for a completed handshake.
    ///
    /// `outbound` feeds the connection's writer task.
    pub fn begin(&self, user_id: impl Into<String>, outbound: mpsc::Sender<Outbound>) -> Session {
        Session {
            user_id: user_id.into(),
            handle: SessionHandle::new(self.ids.next(), outbound),
            state: SessionState::Unauthenticated,
            limiter: RateLimiter::new(self.policy.messages_per_second, self.policy.message_burst),
        }
    }

    /// Authenticate and register a session.
    ///
    /// An unknown user gets a 4001 close queued and nothing else; a directory
    /// failure gets 1011. Either way the session ends up `Closed` and the
    /// registry is untouched. On success the session is registered (replacing
    /// any prior entry for the user) and sent a presence snapshot. If that
    /// snapshot cannot be queued the entry is removed again and the session
    /// is `Closed`.
    pub async fn open(&self, session: &mut Session) -> SessionResult {
        if session.state != SessionState::Unauthenticated {
            return Err(SessionError::NotOpen);
        }

        match self.directory.resolve(&session.user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                session.state = SessionState::Closed;
                metrics::record_handshake("unauthorized");
                warn!(user_id = %session.user_id, "Handshake rejected: unknown user");
                let _ = session
                    .handle
                    .send(Outbound::Close(CloseReason::Unauthorized))
                    .await;
                return Err(SessionError::Unauthorized(session.user_id.clone()));
            }
            Err(e) => {
                session.state = SessionState::Closed;
                metrics::record_handshake("error");
                warn!(user_id = %session.user_id, error = %e, "Handshake failed: directory unavailable");
                let _ = session
                    .handle
                    .send(Outbound::Close(CloseReason::InternalError))
                    .await;
                return Err(SessionError::DirectoryFailure(e));
            }
        }

        if let Some(displaced) = self
            .registry
            .put(session.user_id.clone(), session.handle.clone())
        {
            self.displace(&session.user_id, displaced);
        }
        session.state = SessionState::Open;
        metrics::record_handshake("opened");
        metrics::set_sessions_active(self.registry.len());
        info!(user_id = %session.user_id, session_id = %session.id(), "Session opened");

        if let Err(e) = self.send_presence(session).await {
            // The writer is gone; its handle must not stay registered.
            session.state = SessionState::Closed;
            if self.registry.remove(&session.user_id, session.id()) {
                metrics::set_sessions_active(self.registry.len());
            }
            warn!(user_id = %session.user_id, session_id = %session.id(), error = %e, "Session lost during open");
            return Err(e);
        }
        if self.policy.broadcast_presence {
            self.presence.broadcast(Some(session.id())).await;
        }
        Ok(())
    }

    fn displace(&self, user_id: &str, displaced: SessionHandle) {
        match self.policy.on_replace {
            ReplacePolicy::Orphan => {
                info!(user_id = %user_id, session_id = %displaced.id(), "Prior session orphaned");
            }
            ReplacePolicy::Close => {
                info!(user_id = %user_id, session_id = %displaced.id(), "Closing prior session");
                if displaced
                    .try_send(Outbound::Close(CloseReason::Replaced))
                    .is_err()
                {
                    debug!(user_id = %user_id, "Prior session already gone");
                }
            }
        }
    }

    /// Handle one inbound text frame.
    ///
    /// Recoverable failures are reported to the sender as an error frame and
    /// yield `Ok(())`. An `Err` means the session must be closed.
    pub async fn handle_frame(&self, session: &mut Session, raw: &str) -> SessionResult {
        if !session.is_open() {
            return Err(SessionError::NotOpen);
        }

        let mut timer = FrameTimer::new();
        let result = self.dispatch(session, raw, &mut timer).await;
        self.settle(session, timer.kind(), result).await
    }

    /// Report a frame the transport already refused (e.g. a binary message).
    pub async fn reject_frame(&self, session: &Session, error: FrameError) -> SessionResult {
        if !session.is_open() {
            return Err(SessionError::NotOpen);
        }
        self.settle(session, "binary", Err(error.into())).await
    }

    async fn dispatch(
        &self,
        session: &mut Session,
        raw: &str,
        timer: &mut FrameTimer,
    ) -> SessionResult {
        if !session.limiter.check() {
            return Err(SessionError::RateLimited);
        }
        if raw.len() > self.policy.max_frame_bytes {
            return Err(FrameError::FrameTooLarge {
                actual: raw.len(),
                limit: self.policy.max_frame_bytes,
            }
            .into());
        }

        let frame = ClientFrame::parse(raw)?;
        timer.set_kind(frame.kind());

        match frame {
            ClientFrame::Chat(chat) => self.route_chat(session, chat).await,
            ClientFrame::Presence => self.send_presence(session).await,
        }
    }

    async fn settle(&self, session: &Session, kind: &str, result: SessionResult) -> SessionResult {
        let error = match result {
            Ok(()) => return Ok(()),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => e,
        };

        metrics::record_frame_error(kind, error.error_code());
        debug!(user_id = %session.user_id, kind, error = %error, "Frame rejected");

        match error.to_frame() {
            Some(frame) => self.send(session, frame).await,
            None => Ok(()),
        }
    }

    /// Send a presence snapshot to `session`.
    pub async fn send_presence(&self, session: &Session) -> SessionResult {
        let frame = self.presence.frame().await;
        self.send(session, frame).await
    }

    /// Queue a frame on the session's own connection, waiting for space.
    async fn send(&self, session: &Session, frame: ServerFrame) -> SessionResult {
        session
            .handle
            .send(Outbound::Frame(Arc::new(frame)))
            .await
            .map_err(|_| SessionError::UnexpectedTransportError("outbound queue closed".into()))
    }

    /// Close a session. Idempotent.
    ///
    /// The registry entry is removed only if it still belongs to this session.
    pub async fn close(&self, session: &mut Session, reason: DisconnectReason) {
        if session.state() == SessionState::Closed {
            return;
        }
        let was_open = session.is_open();
        session.state = SessionState::Closed;

        if reason == DisconnectReason::IdleTimeout {
            let _ = session
                .handle
                .try_send(Outbound::Close(CloseReason::IdleTimeout));
        }

        if !was_open {
            return;
        }

        let removed = self.registry.remove(&session.user_id, session.id());
        if removed {
            metrics::set_sessions_active(self.registry.len());
            if self.policy.broadcast_presence {
                self.presence.broadcast(None).await;
            }
        }

        let duration_secs = (Utc::now() - session.handle.established_at()).num_seconds();
        match &reason {
            DisconnectReason::TransportError(detail) => {
                warn!(user_id = %session.user_id, session_id = %session.id(), error = %detail, duration_secs, removed, "Session closed on transport error");
            }
            _ => {
                info!(user_id = %session.user_id, session_id = %session.id(), reason = reason.as_str(), duration_secs, removed, "Session closed");
            }
        }
    }
}
