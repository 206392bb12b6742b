//! Network module.
//!
//! Contains the Gateway (TCP/TLS listener), the per-client Connection
//! handler, and per-session flood control.

mod connection;
mod gateway;
pub mod limit;

pub use connection::{Connection, ConnectionSettings};
pub use gateway::Gateway;
