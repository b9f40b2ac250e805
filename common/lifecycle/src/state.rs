//! Process-wide liveness/readiness flags and build metadata.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Shared by `Arc` between the manager (sole writer) and the probe handlers (readers).
///
/// Invariant: `ready` implies `up`. Readiness is only raised while up, and liveness is
/// only dropped after readiness.
#[derive(Debug, Default)]
pub struct ServiceState {
    up: AtomicBool,
    ready: AtomicBool,
    build_info: OnceLock<BTreeMap<String, String>>,
}

impl ServiceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn build_info(&self) -> Option<&BTreeMap<String, String>> {
        self.build_info.get()
    }

    /// Returns true if the flag changed.
    pub(crate) fn set_up(&self, up: bool) -> bool {
        if !up && self.is_ready() {
            self.set_ready(false);
        }
        self.up.swap(up, Ordering::SeqCst) != up
    }

    /// Returns true if the flag changed. Refuses to raise readiness while down.
    pub(crate) fn set_ready(&self, ready: bool) -> bool {
        if ready && !self.is_up() {
            return false;
        }
        self.ready.swap(ready, Ordering::SeqCst) != ready
    }

    /// Returns false if build info was already published.
    pub(crate) fn publish_build_info(&self, info: BTreeMap<String, String>) -> bool {
        self.build_info.set(info).is_ok()
    }
}
