//! Key lifecycle engine for keygate.
//!
//! Keys live in a single JSON document held by a versioned [`store`]. The
//! [`lifecycle::KeyService`] issues, verifies, renews and prunes them, threading
//! the document revision from every read to the write that follows it.

pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod repositories;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::LifecycleError;
pub use lifecycle::{CleanupReport, KeyService, Rejection, RenewTarget, Verification};
pub use models::{ExpiryOverflow, KeyDuration, KeyRecord};
pub use repositories::{KeyRepository, KeySnapshot};
pub use store::{DocumentStore, MemoryStore, Revision, StoreError, VersionedDocument};
