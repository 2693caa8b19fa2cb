use thiserror::Error;

use crate::bridge::BridgeError;
use crate::etf::{DecodingError, EncodingError};
use crate::node::NodeError;
use crate::rpc::RpcError;

/// Top-level error for everything this crate can fail at: wire codec,
/// the typed bridge, the connection actor, and RPC.
#[derive(Error, Debug)]
pub enum Error {
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("decoding error: {0}")]
    Decoding(#[from] DecodingError),

    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
