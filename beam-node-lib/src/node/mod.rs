//! The async, actor-based node/connection client: a local [`Node`] identity
//! that dials remote BEAM nodes and hands back a [`Connection`] handle.

mod connection;
mod dispatch;
mod error;
mod identity;
mod transport;

pub use connection::{Connection, ConnectionState, FrameEvent, Messages, SendTarget, TypedMessages};
pub use dispatch::CallHandler;
pub use error::NodeError;
pub use identity::NodeIdentity;

use std::time::Duration;

use crate::config::NodeConfig;
use crate::term::Pid;

/// This process's local distribution identity. Cheap to clone; every
/// [`Node::connect`] call mints a fresh locally-unique [`Pid`] for the
/// resulting connection.
#[derive(Debug, Clone)]
pub struct Node {
    identity: NodeIdentity,
}

impl Node {
    pub fn new(name: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            identity: NodeIdentity::new(name, cookie),
        }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(config.name.clone(), config.cookie.clone())
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Dial `remote_addr` (a `host:port` pair for the remote node's
    /// distribution port) and, if it answers within `config`'s connect
    /// timeout, return a ready [`Connection`]. A down or unreachable peer
    /// surfaces as [`NodeError::ConnectionFailed`] rather than a bare
    /// timeout, whether the failure was a refused connect or the deadline
    /// elapsing first.
    pub async fn connect(
        &self,
        remote_addr: &str,
        register_as: Option<&str>,
        config: &NodeConfig,
    ) -> Result<Connection, NodeError> {
        Connection::dial(
            self.identity.clone(),
            remote_addr,
            Duration::from_millis(config.connect_timeout_ms),
            register_as,
            config.subscriber_capacity,
        )
        .await
    }

    pub fn fresh_pid(&self) -> Pid {
        self.identity.fresh_pid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn down_node_connect_fails_fast_not_with_a_timeout() {
        // Port 1 is reserved and nothing listens there in any sandbox this
        // test runs in, so the OS refuses the connect immediately instead
        // of letting the deadline below elapse.
        let node = Node::new("client@localhost", "cookie");
        let config = NodeConfig {
            name: "client@localhost".into(),
            cookie: "cookie".into(),
            connect_timeout_ms: 5_000,
            subscriber_capacity: 16,
        };
        let result = node.connect("127.0.0.1:1", None, &config).await;
        assert!(matches!(result, Err(NodeError::ConnectionFailed(_))));
    }
}
