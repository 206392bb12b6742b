//! Users seeded into the directory at startup.

use serde::Deserialize;

/// A `[[user]]` block.
///
/// Each block is upserted on startup, so editing a display name here and
/// restarting replaces the stored profile.
#[derive(Debug, Clone, Deserialize)]
pub struct UserBlock {
    /// Unique user identifier (e.g., "mohammad").
    pub user_id: String,
    /// Name shown to other users.
    pub display_name: String,
}
