//! Domain types shared by every crate of the sync engine.

mod action;
mod content;
mod data_source;
mod menu;

pub use action::{ACTION_PARSERS, Action, ActionKind, Preview, ShareInfo};
pub use content::{Content, ContentList, Media, ScheduleWindow};
pub use data_source::{DataSource, ImagePriority};
pub use menu::{Menu, MenuLoad, Section};
