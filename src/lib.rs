//! Forwarding core of a content-centric network relay: faces and interfaces, the forwarding
//! table, the pending interest table and the content store, driven by packet arrival and a
//! periodic ageing sweep.
//!
//! Decoding packets and moving bytes on and off the medium are left to the embedder, through
//! [`packet::Codec`] and [`interface::LinkLayer`].

pub mod arena;

pub mod clock;

pub mod config;

pub mod error;

pub mod hash;

pub mod prefix;

pub mod packet;

pub mod face;

pub mod interface;

pub mod fib;

pub mod pit;

pub mod store;

pub mod nonce;

pub mod status;

pub mod relay;

pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use config::{InterfaceConfig, NonceCheck, RelayConfig};
pub use error::{ConfigError, RelayError, Result};
pub use face::{Address, FaceId};
pub use packet::{Packet, PacketKind, SuiteFields};
pub use prefix::{MatchMode, Prefix, Suite};
pub use relay::Relay;
#[cfg(feature = "sha2")]
pub use relay::DefaultRelay;
pub use status::RelayStatus;
