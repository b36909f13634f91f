//! Image download queue.
//!
//! This module provides a pure state machine for image scheduling: which
//! image downloads now, which waits, which gets preempted. No I/O is
//! performed here; the orchestrator (`DownloadScheduler`) handles I/O.
//!
//! # Design
//!
//! - Pure synchronous state machine (no async, no IO, no tracing)
//! - Commands return [`SchedulerEffect`]s the caller executes in order
//! - Generic over the completion type so tests can use plain values
//!
//! # Scheduling rules
//!
//! - Low priority starts when a slot is free and caching is not paused,
//!   otherwise it waits in the low queue.
//! - High priority preempts the oldest low-priority download in progress
//!   (cancelled at the transport, moved to the back of the low queue) and
//!   starts at once. Without a low download to preempt it starts when a
//!   slot is free, otherwise it waits in the high queue.
//! - Every finished transfer frees a slot; the high queue drains first.
//!   While paused only the high queue drains.
//!
//! Every transfer alive at the transport is in `in_progress`, so the
//! number of running transfers never exceeds the download limit.
//!
//! An image path is tracked at most once across all collections.

mod types;

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use indexmap::IndexSet;
use ocm_core::{ImageCacheError, ImagePriority};

pub use types::{CachedImage, LeaseId, SchedulerEffect, SchedulerSnapshot};

/// Manages image scheduling state.
///
/// This is a sync type with no internal locking; the caller
/// (`DownloadScheduler`) is responsible for synchronization.
pub struct ImageQueue<C> {
    /// Every tracked image: queued, downloading or cached.
    images: HashMap<String, CachedImage<C>>,
    /// Downloading, in start order.
    in_progress: IndexSet<String>,
    high_queue: VecDeque<String>,
    low_queue: VecDeque<String>,
    download_limit: usize,
    paused: bool,
    lease_counter: u64,
}

impl<C> ImageQueue<C> {
    /// Create a queue running at most `download_limit` transfers.
    pub fn new(download_limit: usize) -> Self {
        Self {
            images: HashMap::new(),
            in_progress: IndexSet::new(),
            high_queue: VecDeque::new(),
            low_queue: VecDeque::new(),
            download_limit: download_limit.max(1),
            paused: false,
            lease_counter: 0,
        }
    }

    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn in_progress_len(&self) -> usize {
        self.in_progress.len()
    }

    /// Check if `path` is tracked in any state.
    pub fn is_tracked(&self, path: &str) -> bool {
        self.images.contains_key(path)
    }

    /// Local file of an already cached image.
    ///
    /// Associates `content` with the image on a hit.
    pub fn cached_location(&mut self, path: &str, content: &str) -> Option<PathBuf> {
        let image = self.images.get_mut(path)?;
        let location = image.location.clone()?;
        image.associated_content.insert(content.to_string());
        image.idle_sweeps = 0;
        Some(location)
    }

    /// Request `path` for `content`, registering `completion`.
    ///
    /// A path already queued or downloading gains the completion instead of
    /// a second transfer. Requesting a low-priority image at high priority
    /// promotes it.
    pub fn request(
        &mut self,
        path: &str,
        content: &str,
        priority: ImagePriority,
        completion: C,
    ) -> Vec<SchedulerEffect<C>> {
        let mut effects = Vec::new();

        if let Some(image) = self.images.get_mut(path) {
            image.associated_content.insert(content.to_string());
            image.idle_sweeps = 0;
            image.completions.push(completion);

            if let Some(location) = image.location.clone() {
                effects.push(SchedulerEffect::Complete {
                    path: path.to_string(),
                    completions: std::mem::take(&mut image.completions),
                    outcome: Ok(location),
                });
                return effects;
            }

            if priority == ImagePriority::High && image.priority == ImagePriority::Low {
                image.priority = ImagePriority::High;
                // A queued image moves to the high rule; a running one simply
                // stops being a preemption candidate.
                if let Some(position) = self.low_queue.iter().position(|queued| queued == path) {
                    self.low_queue.remove(position);
                    self.enqueue(path.to_string(), &mut effects);
                } else if self.paused && self.in_progress.contains(path) {
                    // Its transfer was paused with the rest of the low
                    // priority work; a fresh start continues it.
                    self.start(path.to_string(), &mut effects);
                }
            }
            return effects;
        }

        let mut image = CachedImage::new(path.to_string(), content.to_string(), priority);
        image.completions.push(completion);
        self.images.insert(path.to_string(), image);
        self.enqueue(path.to_string(), &mut effects);
        effects
    }

    /// Record the end of the transfer of `path` started under `lease`.
    ///
    /// Stale leases are ignored. On success the image becomes cached; on
    /// failure it is discarded. Either way its completions fire and queued
    /// images take the freed slot.
    pub fn finish(
        &mut self,
        path: &str,
        lease: LeaseId,
        outcome: Result<PathBuf, ImageCacheError>,
    ) -> Vec<SchedulerEffect<C>> {
        let mut effects = Vec::new();

        let current = self.images.get(path).and_then(|image| image.lease);
        if current != Some(lease) || !self.in_progress.contains(path) {
            return effects;
        }
        self.in_progress.shift_remove(path);

        let completions = match &outcome {
            Ok(location) => self.images.get_mut(path).map(|image| {
                image.location = Some(location.clone());
                image.lease = None;
                std::mem::take(&mut image.completions)
            }),
            Err(_) => self.images.remove(path).map(|image| image.completions),
        };

        effects.push(SchedulerEffect::Complete {
            path: path.to_string(),
            completions: completions.unwrap_or_default(),
            outcome,
        });

        self.dequeue(&mut effects);
        effects
    }

    /// Pause low-priority transfers; high-priority ones keep running.
    pub fn pause(&mut self) -> Vec<SchedulerEffect<C>> {
        self.paused = true;
        self.in_progress
            .iter()
            .filter(|path| self.priority_of(path) == Some(ImagePriority::Low))
            .map(|path| SchedulerEffect::Pause { path: path.clone() })
            .collect()
    }

    /// Resume paused transfers and start queued images in free slots.
    pub fn resume(&mut self) -> Vec<SchedulerEffect<C>> {
        self.paused = false;
        let mut effects = Vec::new();
        if !self.in_progress.is_empty() {
            effects.push(SchedulerEffect::ResumeAll);
        }
        self.dequeue(&mut effects);
        effects
    }

    /// Cancel everything queued or downloading.
    ///
    /// Cached images are kept.
    pub fn cancel(&mut self) -> Vec<SchedulerEffect<C>> {
        let mut effects = vec![SchedulerEffect::CancelAll];

        let doomed: Vec<String> = self
            .in_progress
            .drain(..)
            .chain(self.high_queue.drain(..))
            .chain(self.low_queue.drain(..))
            .collect();

        for path in doomed {
            if let Some(image) = self.images.remove(&path) {
                effects.push(SchedulerEffect::Complete {
                    path,
                    completions: image.completions,
                    outcome: Err(ImageCacheError::CachingCancelled),
                });
            }
        }
        effects
    }

    /// Forget a cached image whose file is gone.
    pub fn discard(&mut self, path: &str) {
        if self
            .images
            .get(path)
            .is_some_and(|image| image.location.is_some())
        {
            self.images.remove(path);
        }
    }

    /// Forget every cached image and return their files.
    pub fn purge_cached(&mut self) -> Vec<PathBuf> {
        let cached: Vec<String> = self
            .images
            .iter()
            .filter(|(_, image)| image.location.is_some())
            .map(|(path, _)| path.clone())
            .collect();

        cached
            .into_iter()
            .filter_map(|path| self.images.remove(&path))
            .filter_map(|image| image.location)
            .collect()
    }

    /// Run one eviction sweep.
    ///
    /// Associations to content in `retired_content` are dropped; any other
    /// association keeps its image alive. A cached image left without
    /// associations counts an idle sweep; after `idle_threshold` consecutive
    /// idle sweeps it is evicted and its file returned for deletion. Queued
    /// and downloading images are untouched.
    pub fn sweep(&mut self, retired_content: &HashSet<String>, idle_threshold: u32) -> Vec<PathBuf> {
        let mut evicted = Vec::new();

        self.images.retain(|_, image| {
            if image.location.is_none() {
                return true;
            }
            image
                .associated_content
                .retain(|content| !retired_content.contains(content));

            if image.associated_content.is_empty() {
                image.idle_sweeps += 1;
            } else {
                image.idle_sweeps = 0;
            }

            if image.idle_sweeps >= idle_threshold {
                evicted.extend(image.location.take());
                false
            } else {
                true
            }
        });

        evicted
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            in_progress: self.in_progress.iter().cloned().collect(),
            high_priority_queue: self.high_queue.iter().cloned().collect(),
            low_priority_queue: self.low_queue.iter().cloned().collect(),
            cached: self
                .images
                .values()
                .filter(|image| image.location.is_some())
                .count(),
            paused: self.paused,
        }
    }

    fn priority_of(&self, path: &str) -> Option<ImagePriority> {
        self.images.get(path).map(|image| image.priority)
    }

    fn has_capacity(&self) -> bool {
        self.in_progress.len() < self.download_limit
    }

    fn enqueue(&mut self, path: String, effects: &mut Vec<SchedulerEffect<C>>) {
        match self.priority_of(&path) {
            None => {}
            Some(ImagePriority::Low) => {
                if self.has_capacity() && !self.paused {
                    self.start(path, effects);
                } else {
                    self.low_queue.push_back(path);
                }
            }
            Some(ImagePriority::High) => {
                let victim = self
                    .in_progress
                    .iter()
                    .find(|running| self.priority_of(running) == Some(ImagePriority::Low))
                    .cloned();

                if let Some(victim) = victim {
                    self.in_progress.shift_remove(&victim);
                    if let Some(image) = self.images.get_mut(&victim) {
                        image.lease = None;
                    }
                    effects.push(SchedulerEffect::Cancel {
                        path: victim.clone(),
                    });
                    self.low_queue.push_back(victim);
                    self.start(path, effects);
                } else if self.has_capacity() {
                    self.start(path, effects);
                } else {
                    self.high_queue.push_back(path);
                }
            }
        }
    }

    fn dequeue(&mut self, effects: &mut Vec<SchedulerEffect<C>>) {
        // Each round starts, preempts or requeues one item; bound the loop by
        // the queued count so a requeue cannot spin.
        let mut rounds = self.high_queue.len() + self.low_queue.len();
        while rounds > 0 && self.has_capacity() {
            rounds -= 1;
            let next = match self.high_queue.pop_front() {
                Some(path) => Some(path),
                None if self.paused => None,
                None => self.low_queue.pop_front(),
            };
            match next {
                Some(path) => self.enqueue(path, effects),
                None => break,
            }
        }
    }

    fn start(&mut self, path: String, effects: &mut Vec<SchedulerEffect<C>>) {
        self.lease_counter += 1;
        let lease = LeaseId(self.lease_counter);
        if let Some(image) = self.images.get_mut(&path) {
            image.lease = Some(lease);
        }
        self.in_progress.insert(path.clone());
        effects.push(SchedulerEffect::Start { path, lease });
    }
}
