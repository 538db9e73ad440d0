//! # Adapters
//!
//! Production implementations of the driven ports.
//!
//! - `wire` - length-prefixed bincode frames
//! - `handshake` - plain `NodeInfo` exchange
//! - `tcp` - tokio TCP dialer and listener
//! - `store` - JSON address book file
//! - `time` - system clock
//! - `seeds` - seed list parsing and DNS resolution

/// Frame codec
pub mod wire;
/// NodeInfo handshake
pub mod handshake;
/// TCP transport
pub mod tcp;
/// Address book persistence
pub mod store;
/// Time source adapters
pub mod time;
/// Seed resolution
pub mod seeds;

pub use handshake::NodeInfoHandshaker;
pub use seeds::{resolve_seed_list, resolve_seeds};
pub use store::JsonFileStore;
pub use tcp::{TcpDialer, TcpTransportListener};
pub use time::SystemTimeSource;
pub use wire::{read_frame, write_frame, DEFAULT_MAX_FRAME_SIZE};
