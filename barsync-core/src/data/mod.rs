//! Market-data archive: retention policy, provider gateway, archive store, sync engine

pub mod archive;
pub mod provider;
pub mod retention;
pub mod sync;
pub mod yahoo;

pub use archive::{
    archive_dir_name, reconcile, sanitize_component, ArchiveEntry, ArchiveError, ArchiveHealth,
    ArchiveStore, SymbolArchive,
};
pub use provider::{DataError, FetchRequest, ProviderGateway};
pub use retention::{limit_for, policy_for, QueryKind, RetentionLimit, RetentionPolicy};
pub use sync::{
    plan, SyncEngine, SyncError, SyncOutcome, SyncPlan, SyncReport, SyncState, SyncTask,
};
pub use yahoo::YahooGateway;
