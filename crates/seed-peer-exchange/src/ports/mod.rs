//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! - **Driving Ports (Inbound):** what the seed exposes to the binary
//! - **Driven Ports (Outbound):** transport, handshake, storage and clock
//!   the seed needs from adapters

pub mod inbound;
pub mod outbound;

pub use inbound::{ConnectionManagerApi, SwitchStats};
pub use outbound::{
    AddrBookStore, BoxedConnection, Connection, Dialer, HandshakeOutcome, Handshaker,
    TimeSource, TransportListener,
};
