//! Offline queue, reconciliation and conflict resolution.

pub mod pending;
pub mod reconcile;
pub mod resolve;
pub mod session;

pub use pending::{DrainReport, PendingQueue};
pub use reconcile::{diff, ReconcileReport, Reconciler};
pub use resolve::{ConflictResolver, ConflictSet, Resolution};
pub use session::{SyncReport, SyncSession};
