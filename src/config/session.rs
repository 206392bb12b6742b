//! Session lifecycle configuration.

use serde::Deserialize;
use std::time::Duration;

/// What happens to an existing connection when the same user opens another.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplacePolicy {
    /// The older connection stays open but is no longer reachable for forwards.
    #[default]
    Orphan,
    /// The older connection is sent a close frame (code 4002).
    Close,
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Capacity of each session's outbound frame queue (default: 64).
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
    /// Policy for a second session of an already connected user.
    #[serde(default)]
    pub on_replace: ReplacePolicy,
    /// Push a presence snapshot to every session whenever someone connects
    /// or disconnects (default: false).
    #[serde(default)]
    pub broadcast_presence: bool,
    /// Seconds without an inbound frame before the session is closed.
    /// 0 disables the timeout (default: 0).
    #[serde(default)]
    pub idle_timeout_secs: u64,
}

impl SessionConfig {
    /// Idle timeout as a `Duration`, or `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_queue: default_outbound_queue(),
            on_replace: ReplacePolicy::default(),
            broadcast_presence: false,
            idle_timeout_secs: 0,
        }
    }
}

fn default_outbound_queue() -> usize {
    64
}
