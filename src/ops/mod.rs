//! High-level operations.
//!
//! This module contains the implementation of Berth commands.

pub mod clean;
pub mod events;
pub mod fingerprint;
pub mod lock_sync;
pub mod provision;

pub use clean::{purge, ArtifactKind, ArtifactSet, CleanScope, PurgeReport};
pub use events::{CollectingSink, EventSink, ProvisionEvent};
pub use lock_sync::{
    LockSynchronizer, OperationResult, PackageManager, SyncMode, SyncReport, SyncState,
    UvPackageManager,
};
pub use provision::{provision, ProvisionOptions, RunReport};
