use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::term::Pid;

/// This node's local identity: its distribution name and cookie, plus the
/// counter needed to mint fresh, locally-unique pids. Shared read-only
/// across every [`super::Connection`] that originates from it.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    name: Arc<str>,
    cookie: Arc<str>,
    creation: u32,
    next_num: Arc<AtomicU32>,
}

impl NodeIdentity {
    pub fn new(name: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            cookie: Arc::from(cookie.into()),
            creation: 1,
            next_num: Arc::new(AtomicU32::new(1)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    /// Mint a pid distinct from every other pid this identity has minted.
    pub fn fresh_pid(&self) -> Pid {
        let num = self.next_num.fetch_add(1, Ordering::Relaxed);
        Pid {
            node: self.name.to_string(),
            num,
            serial: 0,
            creation: self.creation,
        }
    }
}
