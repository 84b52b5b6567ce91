//! Finished exports awaiting download.

pub mod store;

pub use store::{DownloadId, ExportSession, RetentionPolicy, SessionStore, spawn_sweep_task};
