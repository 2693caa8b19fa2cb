//! Registry of local handlers for inbound `{:call, id, sender, args}`
//! frames, keyed by the target pid.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::term::{Pid, Term};

/// Invoked with the decoded argument list when an inbound call names this
/// handler's registered pid.
pub trait CallHandler: Send + Sync {
    fn handle(&self, args: Vec<Term>) -> Result<Term, String>;
}

impl<F> CallHandler for F
where
    F: Fn(Vec<Term>) -> Result<Term, String> + Send + Sync,
{
    fn handle(&self, args: Vec<Term>) -> Result<Term, String> {
        self(args)
    }
}

#[derive(Clone, Default)]
pub(crate) struct Dispatch {
    handlers: Arc<Mutex<HashMap<Pid, Arc<dyn CallHandler>>>>,
}

impl Dispatch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn register(&self, pid: Pid, handler: impl CallHandler + 'static) {
        self.handlers.lock().await.insert(pid, Arc::new(handler));
    }

    pub(crate) async fn unregister(&self, pid: &Pid) {
        self.handlers.lock().await.remove(pid);
    }

    pub(crate) async fn find(&self, pid: &Pid) -> Option<Arc<dyn CallHandler>> {
        self.handlers.lock().await.get(pid).cloned()
    }
}
