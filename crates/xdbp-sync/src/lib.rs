//! xdbp-sync: upload-reconcile protocol between local file records and a remote XML database

pub mod error;
pub mod install;
pub mod newer;
pub mod permissions;
pub mod query;
pub mod resolver;
pub mod session;
pub mod store;
pub mod walk;

pub use error::SyncError;
pub use newer::Freshness;
pub use resolver::Resolution;
pub use session::{FilterReport, PushReport, RecordFailure, Session};
pub use store::{StoreOutcome, UploadConfig};
