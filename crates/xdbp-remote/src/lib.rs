//! xdbp-remote: capability surface of the remote XML database + in-memory backend

pub mod client;
pub mod error;
pub mod health;
pub mod memory;

pub use client::{
    CollectionInfo, InstallResponse, QueryParams, QueryResult, RemoteClient, ResourceInfo,
    UploadHandle,
};
pub use error::{RemoteError, RemoteResult};
pub use health::check_health;
pub use memory::{Call, MemoryClient, Op};
