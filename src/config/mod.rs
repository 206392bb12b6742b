//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, DatabaseConfig)
//! - [`listen`]: Listener configuration (ListenConfig, TlsConfig, HttpConfig)
//! - [`session`]: Session lifecycle policy (SessionConfig, ReplacePolicy)
//! - [`limits`]: Per-frame and per-session limits (LimitsConfig)
//! - [`users`]: Users seeded into the directory at startup (UserBlock)
//! - [`validation`]: Startup validation

mod limits;
mod listen;
mod session;
mod types;
mod users;
pub mod validation;

pub use limits::LimitsConfig;
pub use listen::{HttpConfig, ListenConfig, TlsConfig};
pub use session::{ReplacePolicy, SessionConfig};
pub use types::{Config, ConfigError, DatabaseConfig, ServerConfig};
pub use users::UserBlock;
