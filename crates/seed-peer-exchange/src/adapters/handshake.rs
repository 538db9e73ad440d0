//! Plain `NodeInfo` handshake.
//!
//! Each side writes its `NodeInfo` frame, then reads the remote's. Writing
//! first on both sides keeps the exchange free of ordering deadlocks.
//! There is no encryption or key proof; the declared id is trusted.

use async_trait::async_trait;

use super::wire::{read_frame, write_frame};
use crate::domain::{ConnectionDirection, HandshakeError, NodeInfo};
use crate::ports::{BoxedConnection, HandshakeOutcome, Handshaker};

/// Exchanges and validates [`NodeInfo`]
#[derive(Debug, Clone)]
pub struct NodeInfoHandshaker {
    ours: NodeInfo,
    max_frame_size: usize,
}

impl NodeInfoHandshaker {
    pub fn new(ours: NodeInfo, max_frame_size: usize) -> Self {
        Self {
            ours,
            max_frame_size,
        }
    }

    /// What we announce
    pub fn node_info(&self) -> &NodeInfo {
        &self.ours
    }

    /// Check the remote's declaration against ours
    pub fn validate(&self, theirs: &NodeInfo) -> Result<(), HandshakeError> {
        if theirs.network != self.ours.network {
            return Err(HandshakeError::NetworkMismatch {
                ours: self.ours.network.clone(),
                theirs: theirs.network.clone(),
            });
        }
        if theirs.protocol_version != self.ours.protocol_version {
            return Err(HandshakeError::ProtocolMismatch {
                ours: self.ours.protocol_version,
                theirs: theirs.protocol_version,
            });
        }
        if !theirs.supports_pex() {
            return Err(HandshakeError::MissingPexChannel);
        }
        if theirs.listen_addr.id != theirs.id {
            return Err(HandshakeError::InconsistentIdentity {
                id: theirs.id.clone(),
                listen: theirs.listen_addr.id.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Handshaker for NodeInfoHandshaker {
    async fn handshake(
        &self,
        mut conn: BoxedConnection,
        _direction: ConnectionDirection,
    ) -> Result<HandshakeOutcome, HandshakeError> {
        write_frame(&mut conn, &self.ours, self.max_frame_size).await?;
        let theirs: NodeInfo = read_frame(&mut conn, self.max_frame_size).await?;
        self.validate(&theirs)?;
        Ok(HandshakeOutcome { peer: theirs, conn })
    }
}
