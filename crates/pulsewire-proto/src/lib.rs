//! Wire protocol for the pulsewire update channel.
//!
//! Frames travel as WebSocket text messages carrying JSON objects. Every
//! object has a `kind` tag used for routing and an ISO-8601 `timestamp`.
//!
//! # Components
//!
//! - [`InboundMessage`]: server to client frame, parsed once and immutable
//! - [`OutboundEnvelope`]: client to server frame, stamped at send time
//! - [`MessageKind`]: the discriminant of inbound frames
//! - [`CloseCode`]: WebSocket close status as seen by the channel

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod close;
pub mod errors;
pub mod inbound;
pub mod kind;
pub mod outbound;
pub mod timestamp;

pub use close::CloseCode;
pub use errors::{ProtocolError, Result};
pub use inbound::{InboundMessage, UserId};
pub use kind::MessageKind;
pub use outbound::{OutboundEnvelope, PING, StampedEnvelope, SUBSCRIBE_ANALYTICS};
