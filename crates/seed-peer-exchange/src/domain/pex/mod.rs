//! # Peer Exchange (PEX) Protocol
//!
//! Per-session state machine that asks the remote for addresses on a
//! jittered schedule, answers the remote's requests from the address book,
//! and punishes peers that flood requests or push unsolicited responses.
//!
//! ## States
//!
//! ```text
//!          poll (timer)              Addrs (in time)
//!   Idle ───────────────→ AwaitingResponse ───────────→ Idle
//!    │                          │
//!    │ violation                │ deadline elapsed
//!    ↓                          ↓
//!  Closed ←─────────────────────┘
//! ```
//!
//! Answering a request is synchronous and does not change the state.
//! The machine is pure: it never touches the clock, the network or the
//! address book. The session task feeds it instants and messages and acts
//! on the returned [`PexEvent`]s.

mod config;
mod machine;
mod security;
mod types;

pub use config::PexConfig;
pub use machine::PexProtocol;
pub use security::{MisbehaviorScore, RateDecision, RequestRateLimiter};
pub use types::{PexEvent, PexMessage, PexState};
