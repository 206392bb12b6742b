//! In-memory session state.
//!
//! - [`registry`]: userId -> live session handle
//! - [`presence`]: online-user snapshots
//! - [`uid`]: session identifiers

mod dashmap_ext;
pub mod presence;
pub mod registry;
mod uid;

pub use presence::PresencePublisher;
pub use registry::{ConnectionRegistry, Outbound, SessionHandle};
pub use uid::{SessionId, SessionIdGenerator};
