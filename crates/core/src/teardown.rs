//! Teardown action registry
//!
//! Release actions are registered the moment their resource is acquired and
//! executed in reverse registration order when the run ends, however it
//! ends. Execution is best-effort: a failing action is logged and the rest
//! still run. A registry executes at most once.

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::bridge::BridgeError;

type TeardownFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BridgeError>> + Send>;

/// Handle to one registered action, used to dismiss it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownHandle(usize);

struct TeardownEntry {
    label: String,
    armed: bool,
    action: Option<TeardownFn>,
}

/// Collects release actions for the resources one run acquires.
#[derive(Default)]
pub struct TeardownRegistry {
    entries: Vec<TeardownEntry>,
    executed: bool,
}

impl TeardownRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release action. Actions run in reverse registration
    /// order: last acquired, first released.
    pub fn register<F>(&mut self, label: impl Into<String>, action: F) -> TeardownHandle
    where
        F: FnOnce() -> BoxFuture<'static, Result<(), BridgeError>> + Send + 'static,
    {
        let label = label.into();
        debug!("registered teardown action '{label}'");
        self.entries.push(TeardownEntry {
            label,
            armed: true,
            action: Some(Box::new(action)),
        });
        TeardownHandle(self.entries.len() - 1)
    }

    /// Disarm an action whose resource is intentionally handed over.
    /// Dismissing twice is a no-op.
    pub fn dismiss(&mut self, handle: TeardownHandle) {
        if let Some(entry) = self.entries.get_mut(handle.0) {
            if entry.armed {
                debug!("dismissed teardown action '{}'", entry.label);
                entry.armed = false;
            }
        }
    }

    /// Number of registered actions, dismissed ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Execute all armed actions, newest first. Failures are logged and do
    /// not stop the remaining actions. Only the first call executes
    /// anything; later calls are no-ops.
    pub async fn run_all(&mut self) {
        if self.executed {
            debug!("teardown already executed, skipping");
            return;
        }
        self.executed = true;
        for entry in self.entries.iter_mut().rev() {
            let Some(action) = entry.action.take() else {
                continue;
            };
            if !entry.armed {
                debug!("skipping dismissed teardown action '{}'", entry.label);
                continue;
            }
            debug!("running teardown action '{}'", entry.label);
            if let Err(err) = action().await {
                warn!("teardown action '{}' failed: {err}", entry.label);
            }
        }
    }
}
