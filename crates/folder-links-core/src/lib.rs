pub mod editor;
pub mod error;
pub mod events;
pub mod folder_service;
pub mod graph;
pub mod host;
pub mod leaf_watcher;
pub mod link_index;
pub mod link_parser;
pub mod outgoing;
pub mod path;
pub mod plugin;
pub mod rename;
pub mod rendered;
pub mod resolver;
pub mod settings;
pub mod snapshot;
pub mod translation;

#[cfg(test)]
mod test_support;

pub use error::{FolderLinksError, Result};
pub use plugin::{CorePanel, FolderLinksPlugin, HostServices};
