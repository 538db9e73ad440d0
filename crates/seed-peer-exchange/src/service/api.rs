use std::net::SocketAddr;

use async_trait::async_trait;

use super::core::Switch;
use crate::domain::{AcceptError, PeerId};
use crate::ports::{BoxedConnection, ConnectionManagerApi, SwitchStats};

#[async_trait]
impl ConnectionManagerApi for Switch {
    async fn accept(
        &self,
        conn: BoxedConnection,
        remote: SocketAddr,
    ) -> Result<PeerId, AcceptError> {
        Switch::accept(self, conn, remote).await
    }

    async fn shutdown(&self) {
        Switch::shutdown(self).await;
    }

    fn stats(&self) -> SwitchStats {
        Switch::stats(self)
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        Switch::connected_peers(self)
    }
}
