#![forbid(unsafe_code)]
//! A native client for the distributed-Erlang protocol: an External Term
//! Format codec, a generic typed encode/decode bridge between Rust values
//! and ETF terms, and an async, actor-based node/connection client with
//! send, RPC, and inbound-call dispatch.

pub mod bridge;
pub mod config;
pub mod error;
pub mod etf;
pub mod node;
pub mod rpc;
pub mod telemetry;
pub mod term;

pub use bridge::{decode, encode, BridgeError, Decoder, Encoder, FromTerm, KeyedPolicy, KeyStyle, Policy, PolicyOverride, StringPolicy, ToTerm, UnkeyedPolicy};
pub use config::{load_from_path, NodeConfig};
pub use error::{Error, Result};
pub use node::{CallHandler, Connection, ConnectionState, Messages, Node, NodeError, SendTarget, TypedMessages};
pub use rpc::{call, call_decoded, Module, RpcError};
pub use term::{Fun, Pid, Port, Reference, Term};
