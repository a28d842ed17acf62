//! rack-core - Core library for Rack
//!
//! Local-first storage for a clothing inventory and the engine that keeps it
//! in step with a shared remote document store: an offline write queue, a
//! full-listing reconciliation diff and per-record conflict resolution.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notice;
pub mod remote;
pub mod store;
pub mod sync;
pub mod util;

pub use config::{SyncScope, SyncSettings};
pub use error::{Error, Result};
pub use models::{ClothingId, ClothingItem, Conflict, ConflictMap, ConflictReason};
pub use notice::{Notice, NoticeLevel, Notifier, SyncState};
pub use remote::{FirestoreRemote, MemoryRemote, RemoteAdapter, RemoteLink};
pub use store::{LocalStore, WriteOutcome};
pub use sync::{ConflictResolver, ConflictSet, Resolution, SyncSession};
