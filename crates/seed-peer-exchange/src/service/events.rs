//! Messages between the switch and its session tasks.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{ConnectionDirection, PeerId, ProtocolViolation, WireError};

/// Reported by a session task to the switch
#[derive(Debug)]
pub enum SessionEvent {
    /// The first PEX exchange on the session finished.
    ExchangeCompleted {
        /// Remote peer.
        peer: PeerId,
        /// Session that completed it.
        session_id: u64,
    },
    /// The remote pushed an unsolicited response.
    Misbehaved {
        /// Remote peer.
        peer: PeerId,
        /// Misbehavior score after the offence.
        score: u32,
    },
    /// The session ended and left the session table.
    Disconnected {
        /// Remote peer.
        peer: PeerId,
        /// Ended session.
        session_id: u64,
        /// Who opened it.
        direction: ConnectionDirection,
        /// Why it ended.
        reason: DisconnectReason,
    },
}

/// Sent by the switch to one session task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Disconnect now
    Disconnect,
}

/// The switch's grip on a running session task
#[derive(Debug)]
pub struct SessionHandle {
    /// Control channel into the task
    pub commands: mpsc::Sender<SessionCommand>,
    /// The task itself
    pub task: JoinHandle<()>,
}

/// Why a session ended
#[derive(Debug)]
pub enum DisconnectReason {
    /// The switch is shutting down
    Shutdown,
    /// The switch asked for it
    Requested,
    /// Seed-mode churn after a completed exchange
    Churned,
    /// The remote broke the PEX protocol
    Violation(ProtocolViolation),
    /// Reading or writing failed, or the remote hung up
    Transport(WireError),
    /// Writing a frame did not finish in time
    WriteTimeout(Duration),
}

impl DisconnectReason {
    /// Whether the session ended because of the remote
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            DisconnectReason::Violation(_)
                | DisconnectReason::Transport(_)
                | DisconnectReason::WriteTimeout(_)
        )
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Shutdown => write!(f, "shutting down"),
            DisconnectReason::Requested => write!(f, "disconnect requested"),
            DisconnectReason::Churned => write!(f, "churned after exchange"),
            DisconnectReason::Violation(v) => write!(f, "protocol violation: {v}"),
            DisconnectReason::Transport(e) => write!(f, "transport: {e}"),
            DisconnectReason::WriteTimeout(d) => write!(f, "write timed out after {d:?}"),
        }
    }
}
