//! SWIM Core Library
//!
//! Membership state core for a SWIM-style gossip protocol.
//! Tracks node lifecycle states, derives join/leave events from transitions
//! and picks probe targets round-robin. Transport, failure detection timers
//! and the join/ping/ack exchange live outside this crate.

pub mod types;
pub mod error;
pub mod config;
pub mod channel;
pub mod registry;

pub use types::*;
pub use error::{AddressParseError, RegistryError, Result, UnknownState};
pub use config::{RegistryConfig, DEFAULT_CHANNEL_CAPACITY};
pub use channel::{EventChannel, EventReceiver};
pub use registry::{MembershipSnapshot, Registry};
