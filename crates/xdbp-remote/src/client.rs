//! Capability trait for the remote database.
//!
//! Transport, authentication handshakes and network-level retries live in
//! the implementation; the sync protocol only sees these operations and the
//! typed [`RemoteError`] they fail with.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::RemoteResult;

/// Parameters passed to the server alongside a query script.
pub type QueryParams = BTreeMap<String, serde_json::Value>;

/// Opaque reference to bytes uploaded but not yet parsed into place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadHandle(pub String);

/// Metadata of a collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub path: String,
    pub owner: String,
    pub permissions: String,
    pub created: Option<DateTime<Utc>>,
    /// Names of direct child collections
    pub collections: Vec<String>,
}

/// Metadata of a stored resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub path: String,
    pub mime_type: String,
    pub size: u64,
    pub owner: String,
    pub permissions: String,
    /// Last modification; some servers omit it
    pub modified: Option<DateTime<Utc>>,
}

/// Result of a query, as the pages the server delivered.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub pages: Vec<Bytes>,
}

impl QueryResult {
    /// Concatenate all pages in the order they were returned.
    pub fn concat(&self) -> Bytes {
        match self.pages.as_slice() {
            [] => Bytes::new(),
            [only] => only.clone(),
            pages => {
                let mut out = Vec::with_capacity(pages.iter().map(Bytes::len).sum());
                for page in pages {
                    out.extend_from_slice(page);
                }
                Bytes::from(out)
            }
        }
    }
}

/// Server response to a package installation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallResponse {
    pub success: bool,
    /// An older version of the package was replaced
    pub updated: bool,
    /// Collection the package was deployed to
    pub target: Option<String>,
}

/// Operations the sync protocol needs from the remote database.
///
/// One instance is shared by every protocol invocation of a session; calls
/// are issued one at a time.
#[async_trait::async_trait]
pub trait RemoteClient: Send + Sync {
    /// Describe a collection. Fails with `NotFound` when it does not exist.
    async fn describe_collection(&self, path: &str) -> RemoteResult<CollectionInfo>;

    /// Create a collection, including missing intermediate collections.
    async fn create_collection(&self, path: &str) -> RemoteResult<()>;

    /// Remove a collection and everything below it.
    async fn remove_collection(&self, path: &str) -> RemoteResult<()>;

    /// Upload raw bytes for a later [`parse_local`](Self::parse_local).
    async fn upload(&self, content: Bytes) -> RemoteResult<UploadHandle>;

    /// Store uploaded bytes at `path`, parsing them according to `mime_type`.
    /// Content the server cannot parse fails with `Parse`.
    async fn parse_local(&self, handle: &UploadHandle, path: &str, mime_type: &str) -> RemoteResult<()>;

    /// Describe a resource. Fails with `NotFound` when it does not exist.
    async fn describe_resource(&self, path: &str) -> RemoteResult<ResourceInfo>;

    /// Set a unix-style permission string (e.g. `rwxr-xr-x`).
    async fn set_permissions(&self, path: &str, permissions: &str) -> RemoteResult<()>;

    async fn remove_resource(&self, path: &str) -> RemoteResult<()>;

    /// Execute a query script and collect every result page.
    async fn query_all(&self, script: Bytes, params: &QueryParams) -> RemoteResult<QueryResult>;

    /// Upload a package archive under `name`. Returns whether the server accepted it.
    async fn upload_package(&self, name: &str, content: Bytes) -> RemoteResult<bool>;

    /// Install a previously uploaded package.
    async fn install_package(&self, name: &str, repo_url: Option<&str>) -> RemoteResult<InstallResponse>;
}
