//! # cipher-proto
//!
//! Frame types for the Cipher realtime channel.
//!
//! Every frame is a single JSON object carried in one WebSocket text message.
//! Clients send [`ClientFrame`]s, the server answers with [`ServerFrame`]s and
//! ends connections with one of the [`CloseReason`] codes.
//!
//! ```rust
//! use cipher_proto::{ClientFrame, ServerFrame};
//!
//! let frame = ClientFrame::parse(r#"{"receiverId":"khader","content":"hi"}"#).unwrap();
//! assert!(matches!(frame, ClientFrame::Chat(_)));
//!
//! let reply = ServerFrame::error("unknown_recipient", "no such user: ghost");
//! assert!(reply.to_json().contains("\"type\":\"error\""));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod close;
pub mod error;
pub mod frame;

pub use close::CloseReason;
pub use error::FrameError;
pub use frame::{ChatFrame, ClientFrame, ForwardedChat, PresenceEntry, ServerFrame};
