//! PEX message and state types.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::domain::NetAddress;

/// Messages on the PEX channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PexMessage {
    /// Ask the remote for addresses
    Request,
    /// Addresses, in answer to a request
    Addrs(Vec<NetAddress>),
}

/// Request-cycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PexState {
    /// No request outstanding
    Idle,
    /// Our request is outstanding until `deadline`
    AwaitingResponse {
        /// When the remote loses its chance to answer
        deadline: Instant,
    },
    /// A violation ended the session
    Closed,
}

/// What the session must do after a message was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PexEvent {
    /// Answer the remote with a selection from the address book.
    Respond {
        /// First completed exchange on this session.
        exchange_completed: bool,
    },
    /// Merge these addresses into the book, sourced from the remote.
    Learned {
        /// Addresses the remote sent.
        addrs: Vec<NetAddress>,
        /// First completed exchange on this session.
        exchange_completed: bool,
    },
    /// A request arrived too soon and was dropped.
    RequestIgnored {
        /// Requests ignored so far.
        ignored: u32,
    },
    /// An unsolicited response was dropped and counted.
    UnsolicitedDiscarded {
        /// Addresses thrown away.
        count: usize,
        /// Misbehavior score after this response.
        score: u32,
    },
}
