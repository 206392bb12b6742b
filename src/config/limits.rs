//! Frame and flood limits configuration.

use serde::Deserialize;

/// Frame and flood limits configuration.
///
/// These limits keep a single client from exhausting server resources.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum chat content length in characters (default: 4096).
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
    /// Maximum size of one inbound WebSocket message in bytes (default: 65536).
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Sustained inbound frames per second per session (default: 10).
    #[serde(default = "default_messages_per_second")]
    pub messages_per_second: f32,
    /// Burst capacity of the per-session token bucket (default: 20).
    #[serde(default = "default_message_burst")]
    pub message_burst: f32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_content_length: default_max_content_length(),
            max_frame_bytes: default_max_frame_bytes(),
            messages_per_second: default_messages_per_second(),
            message_burst: default_message_burst(),
        }
    }
}

fn default_max_content_length() -> usize {
    4096
}

fn default_max_frame_bytes() -> usize {
    65536
}

fn default_messages_per_second() -> f32 {
    10.0
}

fn default_message_burst() -> f32 {
    20.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_correct() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.max_content_length, 4096);
        assert_eq!(limits.max_frame_bytes, 65536);
        assert_eq!(limits.messages_per_second, 10.0);
        assert_eq!(limits.message_burst, 20.0);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let limits: LimitsConfig = toml::from_str("max_content_length = 280").unwrap();
        assert_eq!(limits.max_content_length, 280);
        assert_eq!(limits.max_frame_bytes, 65536);
    }
}
