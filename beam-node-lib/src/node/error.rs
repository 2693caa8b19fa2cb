use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to initialise local node identity: {0}")]
    InitFailed(String),
    #[error("failed to connect to remote node: {0}")]
    ConnectionFailed(String),
    #[error("failed to register under name {0:?}")]
    RegisterFailed(String),
    #[error("connection is not open")]
    NotConnected,
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}
