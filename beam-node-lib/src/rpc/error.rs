use thiserror::Error;

use crate::bridge::BridgeError;
use crate::node::NodeError;
use crate::term::Term;

#[derive(Debug, Error)]
pub enum RpcError {
    /// The remote returned `{:badrpc, reason}`.
    #[error("remote reported badrpc: {0:?}")]
    BadRpc(Term),
    /// The connection closed before a `:rex` reply arrived.
    #[error("connection closed before a :rex reply arrived")]
    NoResponse,
    /// The RPC DSL was invoked without a connection argument.
    #[error("rpc call built without a connection to run on")]
    MissingConnection,
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}
