//! # Connection Slots
//!
//! Session table of the switch: live sessions keyed by peer id plus the
//! reservations held by in-flight handshakes and dials.
//!
//! ## Design
//!
//! - A slot is reserved before any I/O happens, so caps hold even while
//!   handshakes are still running.
//! - A reservation is either turned into a session by `register` or given
//!   back with `release`. Nothing else frees it.
//! - Once closed, the table refuses every reservation and registration.
//!
//! The table is generic over the session control handle so it stays free
//! of runtime types.

mod config;
mod manager;
mod security;
mod types;

pub use config::ConnectionSlotsConfig;
pub use manager::ConnectionSlots;
pub use security::HostIndex;
pub use types::{ConnectionStats, PeerSession, Reservation};
