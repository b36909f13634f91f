//! Routing outcome of a load request.

/// Where a requested value will be served from.
///
/// Produced by the per-request routing decision and consumed immediately;
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource<T> {
    /// Fetch from the remote service.
    FromNetwork,
    /// Serve the persisted copy.
    FromCache(T),
    /// Serve a payload held in memory (preloaded content lists).
    FromMemory(T),
}

impl<T> DataSource<T> {
    /// The value carried by a cache or memory hit.
    pub fn into_local(self) -> Option<T> {
        match self {
            Self::FromNetwork => None,
            Self::FromCache(value) | Self::FromMemory(value) => Some(value),
        }
    }

    pub const fn is_network(&self) -> bool {
        matches!(self, Self::FromNetwork)
    }
}

/// Priority of an image download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ImagePriority {
    /// Prefetch of images not yet on screen.
    #[default]
    Low,
    /// Images the user is looking at.
    High,
}
