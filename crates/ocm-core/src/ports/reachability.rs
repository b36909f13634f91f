//! Connectivity oracle.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the network is currently reachable.
pub trait ReachabilityMonitor: Send + Sync {
    fn is_reachable(&self) -> bool;
}

/// Reachability flag set explicitly by the host application.
///
/// Hosts forward their platform connectivity callbacks into
/// [`set_reachable`](Self::set_reachable).
#[derive(Debug)]
pub struct StaticReachability {
    reachable: AtomicBool,
}

impl StaticReachability {
    pub const fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
    }
}

impl Default for StaticReachability {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ReachabilityMonitor for StaticReachability {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }
}
