#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod contracts;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use contracts::{ParsedContentList, ParsedMenus, RawAction, RawContentList, RawMenus};
pub use domain::{
    Action, ActionKind, Content, ContentList, DataSource, ImagePriority, Media, Menu, MenuLoad,
    Preview, ScheduleWindow, Section, ShareInfo,
};
pub use errors::{ContentError, ImageCacheError, TransportError};
pub use ports::{
    ContentCachePort, ContentStore, DownloadTransport, NoopContentCache, ReachabilityMonitor,
    RemoteContentService, RepositoryError, StaticReachability, TransferId,
};
pub use settings::{
    DEFAULT_DOWNLOAD_LIMIT, DEFAULT_ITEMS_PER_PAGE, DEFAULT_MAX_DOWNLOAD_ATTEMPTS,
    OfflineSupportConfig, SettingsError, SyncSettings, validate_settings,
};
