//! Types held by the image queue.

use std::collections::HashSet;
use std::path::PathBuf;

use ocm_core::{ImageCacheError, ImagePriority};

/// Lease ID for tracking one execution of a transfer.
///
/// A preempted transfer is restarted under a new lease; completions carrying
/// an older lease are stale and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId(pub(crate) u64);

/// A tracked image, from first request until eviction.
#[derive(Debug)]
pub struct CachedImage<C> {
    pub image_path: String,
    /// Local file, set once the transfer succeeded.
    pub location: Option<PathBuf>,
    pub priority: ImagePriority,
    pub associated_content: HashSet<String>,
    pub(crate) completions: Vec<C>,
    /// Lease of the current transfer while downloading.
    pub(crate) lease: Option<LeaseId>,
    /// Consecutive sweeps this image spent without live content.
    pub(crate) idle_sweeps: u32,
}

impl<C> CachedImage<C> {
    pub(crate) fn new(image_path: String, content: String, priority: ImagePriority) -> Self {
        let mut associated_content = HashSet::new();
        associated_content.insert(content);
        Self {
            image_path,
            location: None,
            priority,
            associated_content,
            completions: Vec::new(),
            lease: None,
            idle_sweeps: 0,
        }
    }
}

/// Side effect requested by the queue.
///
/// The queue never performs I/O; the scheduler executes these in order.
#[derive(Debug)]
pub enum SchedulerEffect<C> {
    /// Start (or restart) the transfer of `path` under `lease`.
    Start { path: String, lease: LeaseId },
    /// Pause the transfer of `path` at the transport.
    Pause { path: String },
    /// Cancel the transfer of `path` at the transport; it restarts from the
    /// low queue later.
    Cancel { path: String },
    /// Resume every paused transfer at the transport.
    ResumeAll,
    /// Cancel every transfer at the transport.
    CancelAll,
    /// Deliver `outcome` to `completions` in registration order.
    Complete {
        path: String,
        completions: Vec<C>,
        outcome: Result<PathBuf, ImageCacheError>,
    },
}

/// Point-in-time view of the scheduler state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    /// Downloading, in start order.
    pub in_progress: Vec<String>,
    pub high_priority_queue: Vec<String>,
    pub low_priority_queue: Vec<String>,
    pub cached: usize,
    pub paused: bool,
}
