#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod coordinator;
pub mod request_queue;
pub mod routing;

pub use coordinator::{
    CoordinatorConfig, SyncCoordinator, SyncCoordinatorDeps, build_sync_coordinator,
};
pub use request_queue::{PendingContentListRequest, RequestKey, RequestQueue};
pub use routing::RoutingContext;
