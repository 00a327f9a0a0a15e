pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod normalize;
pub mod session;
pub mod store;
pub mod view;
pub mod watcher;

pub use classify::{MatchGroup, MatchSettings};
pub use config::{ExtensionPair, PairwatchConfig};
pub use error::{Error, Result};
pub use events::*;
pub use filter::DeliverableFilter;
pub use normalize::EventNormalizer;
pub use session::Session;
pub use store::MetadataStore;
pub use view::{RecordTag, RecordView, Snapshot, SnapshotSink};
pub use watcher::FolderMonitor;
