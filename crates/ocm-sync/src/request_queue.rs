//! Content-list request coalescing.
//!
//! A FIFO of pending requests plus at most one active handler. Requests for
//! the key of the active handler hand their completion to it, so one network
//! fetch answers every caller. Pure state; the coordinator runs the fetches.

use std::collections::VecDeque;

/// Identity of a content-list fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub path: String,
    pub page: u32,
}

impl RequestKey {
    pub fn new(path: impl Into<String>, page: u32) -> Self {
        Self {
            path: path.into(),
            page,
        }
    }
}

/// One caller invocation waiting for a content list.
#[derive(Debug)]
pub struct PendingContentListRequest<C> {
    pub key: RequestKey,
    pub items: u32,
    pub is_preload: bool,
    /// Taken once the request is folded into an active handler.
    completion: Option<C>,
}

impl<C> PendingContentListRequest<C> {
    pub fn new(
        path: impl Into<String>,
        page: u32,
        items: u32,
        is_preload: bool,
        completion: C,
    ) -> Self {
        Self {
            key: RequestKey::new(path, page),
            items,
            is_preload,
            completion: Some(completion),
        }
    }
}

/// The single in-flight fetch and everyone waiting on it.
#[derive(Debug)]
pub struct ActiveRequestHandler<C> {
    pub key: RequestKey,
    completions: Vec<C>,
}

/// What the coordinator must fetch next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedRequest {
    pub key: RequestKey,
    pub items: u32,
    pub is_preload: bool,
}

/// Pending content-list requests and the active handler.
#[derive(Debug)]
pub struct RequestQueue<C> {
    pending: VecDeque<PendingContentListRequest<C>>,
    active: Option<ActiveRequestHandler<C>>,
}

impl<C> Default for RequestQueue<C> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            active: None,
        }
    }
}

impl<C> RequestQueue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Key of the fetch in flight, if any.
    pub fn active_key(&self) -> Option<&RequestKey> {
        self.active.as_ref().map(|handler| &handler.key)
    }

    /// No fetch in flight and nothing waiting.
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.pending.is_empty()
    }

    /// Append a request.
    ///
    /// If a fetch for the same key is in flight, the completion joins it.
    pub fn add_request(&mut self, mut request: PendingContentListRequest<C>) {
        if let Some(active) = self.active.as_mut() {
            if active.key == request.key {
                active.completions.extend(request.completion.take());
            }
        }
        self.pending.push_back(request);
    }

    /// Activate the head of the queue when nothing is in flight.
    ///
    /// Every pending request sharing the head's key is folded into the new
    /// handler, in queue order.
    pub fn next_request(&mut self) -> Option<StartedRequest> {
        if self.active.is_some() {
            return None;
        }
        let head = self.pending.front()?;
        let started = StartedRequest {
            key: head.key.clone(),
            items: head.items,
            is_preload: head.is_preload,
        };

        let completions = self
            .pending
            .iter_mut()
            .filter(|request| request.key == started.key)
            .filter_map(|request| request.completion.take())
            .collect();

        self.active = Some(ActiveRequestHandler {
            key: started.key.clone(),
            completions,
        });
        Some(started)
    }

    /// Close the fetch for `key`: clear the handler, drop every queued
    /// request with that key and return the completions to notify.
    pub fn finish(&mut self, key: &RequestKey) -> Vec<C> {
        let completions = match self.active.take() {
            Some(handler) if handler.key == *key => handler.completions,
            other => {
                self.active = other;
                Vec::new()
            }
        };
        self.pending.retain(|request| request.key != *key);
        completions
    }

    /// Drop every queued request and return the completions not yet owned
    /// by the active handler. The active handler answers its own waiters.
    pub fn cancel_pending(&mut self) -> Vec<C> {
        self.pending
            .drain(..)
            .filter_map(|request| request.completion)
            .collect()
    }
}
