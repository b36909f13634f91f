//! Per-request data-source decisions.
//!
//! Pure functions: the coordinator gathers the inputs (configuration,
//! reachability, whatever the store holds) and acts on the outcome.

use chrono::{DateTime, Utc};

use ocm_core::{ContentList, DataSource, Menu};

/// Inputs shared by every routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingContext {
    pub offline_support: bool,
    pub reachable: bool,
    pub force: bool,
}

/// Decide where menus come from.
///
/// Without offline support menus always come from the network. With it,
/// a non-empty cache wins unless a forced refresh is possible.
pub fn menus_source(ctx: RoutingContext, cached: Vec<Menu>) -> DataSource<Vec<Menu>> {
    if !ctx.offline_support || cached.is_empty() {
        return DataSource::FromNetwork;
    }
    if ctx.reachable && ctx.force {
        DataSource::FromNetwork
    } else {
        DataSource::FromCache(cached)
    }
}

/// Decide where an action comes from.
///
/// Actions are cached whatever the offline setting. A cached action is used
/// unless it is missing, or offline support is on and a forced refresh is
/// possible.
pub fn element_source<T>(ctx: RoutingContext, cached: Option<T>) -> DataSource<T> {
    match cached {
        None => DataSource::FromNetwork,
        Some(_) if ctx.offline_support && ctx.force && ctx.reachable => DataSource::FromNetwork,
        Some(action) => DataSource::FromCache(action),
    }
}

/// Decide where a content list page comes from.
///
/// When reachable, a cached page is refreshed if forced, too short for the
/// requested page size (never for page 1), or expired. When unreachable any
/// cached page is served.
pub fn content_source(
    ctx: RoutingContext,
    page: u32,
    items: u32,
    cached: Option<ContentList>,
    now: DateTime<Utc>,
) -> DataSource<ContentList> {
    if !ctx.offline_support {
        return DataSource::FromNetwork;
    }
    let Some(list) = cached else {
        return DataSource::FromNetwork;
    };
    let refresh = ctx.force || list.is_stale_for(page, items) || list.is_expired(now);
    if ctx.reachable && refresh {
        DataSource::FromNetwork
    } else {
        DataSource::FromCache(list)
    }
}
