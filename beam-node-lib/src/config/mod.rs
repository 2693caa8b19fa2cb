//! Local node identity configuration: name, cookie, and the handful of
//! connection defaults a deployment wants to pin down rather than pass at
//! every call site.

mod loader;

pub use loader::load_from_path;

use serde::{Deserialize, Serialize};

/// Everything needed to stand up a [`crate::node::Node`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's distribution name, e.g. `client@127.0.0.1`.
    pub name: String,
    /// The shared secret both ends must present.
    pub cookie: String,
    /// Milliseconds to wait for a connect handshake before giving up.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Capacity of the bounded, drop-oldest broadcast channel handed to raw
    /// message subscribers.
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_subscriber_capacity() -> usize {
    256
}

impl NodeConfig {
    pub fn new(name: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cookie: cookie.into(),
            connect_timeout_ms: default_connect_timeout_ms(),
            subscriber_capacity: default_subscriber_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_when_toml_omits_them() {
        let cfg: NodeConfig = toml::from_str(
            r#"
            name = "client@127.0.0.1"
            cookie = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.name, "client@127.0.0.1");
        assert_eq!(cfg.connect_timeout_ms, default_connect_timeout_ms());
        assert_eq!(cfg.subscriber_capacity, default_subscriber_capacity());
    }
}
