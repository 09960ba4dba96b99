//! Store protocol: place one file record into the remote collection tree.
//!
//! For a document the sequence is
//!   1. ensure the containing collection exists
//!   2. upload the bytes, then ask the server to parse them into place
//!   3. on a parse error for an `.html` file with `html5_as_binary` set,
//!      repeat step 2 once as `application/octet-stream`
//!   4. apply configured permissions
//!
//! A parse failure that is not remedied leaves the target in an unknown
//! state (the server bumps its modification time even when parsing fails),
//! so the resource is removed before the error is reported. Otherwise a
//! later newer-check would wrongly treat the broken copy as up to date.

use bytes::Bytes;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use xdbp_core::config::UploadOptions;
use xdbp_core::mime::{self, OCTET_STREAM};
use xdbp_core::{path, FileRecord};
use xdbp_remote::{RemoteClient, RemoteError};

use crate::error::SyncError;
use crate::permissions::apply_permissions;
use crate::resolver::{ensure_collection, Resolution};

/// Resolved upload settings for one session.
///
/// The target is normalized to forward slashes at construction.
#[derive(Debug, Clone, Default)]
pub struct UploadConfig {
    target: String,
    permissions: BTreeMap<String, String>,
    html5_as_binary: bool,
}

impl UploadConfig {
    pub fn new(target: &str) -> Self {
        Self {
            target: normalize_target(target),
            ..Default::default()
        }
    }

    pub fn from_options(options: &UploadOptions) -> Self {
        Self::new(&options.target)
            .with_permissions(options.permissions.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .with_html5_as_binary(options.html5_as_binary)
    }

    /// Add relative path → permission string entries.
    pub fn with_permissions<'a, I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (relative, perms) in entries {
            self.permissions
                .insert(path::normalize(relative), perms.to_string());
        }
        self
    }

    pub fn with_html5_as_binary(mut self, enabled: bool) -> Self {
        self.html5_as_binary = enabled;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn html5_as_binary(&self) -> bool {
        self.html5_as_binary
    }

    /// Permission string configured for a record's relative path.
    pub fn permissions_for(&self, relative: &str) -> Option<&str> {
        self.permissions
            .get(&path::normalize(relative))
            .map(String::as_str)
    }

    /// Remote path for a relative path: `target/relative`, normalized.
    pub fn remote_path(&self, relative: &str) -> String {
        path::join(&self.target, relative)
    }
}

fn normalize_target(target: &str) -> String {
    if target.is_empty() {
        return String::new();
    }
    path::trim_trailing_slash(&path::normalize(target))
}

/// Successful result of [`store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// A document was stored
    Stored {
        remote_path: String,
        mime_type: String,
        /// The document was stored as binary after a parse failure
        binary_fallback: bool,
        /// Permissions applied after storing
        permissions: Option<String>,
    },
    /// A directory record was resolved to a collection
    Collection {
        path: String,
        resolution: Resolution,
    },
    /// Nothing to send
    Skipped { relative: String },
}

/// Store a single record.
pub async fn store(
    client: &dyn RemoteClient,
    file: &FileRecord,
    config: &UploadConfig,
) -> Result<StoreOutcome, SyncError> {
    if file.is_stream() {
        return Err(SyncError::StreamingUnsupported(file.relative.clone()));
    }

    if file.is_directory() {
        let collection = path::trim_trailing_slash(&config.remote_path(&file.relative));
        let resolution = ensure_collection(client, &collection).await?;
        return Ok(StoreOutcome::Collection {
            path: collection,
            resolution,
        });
    }

    let content = match file.bytes() {
        Some(b) if !b.is_empty() => b,
        _ => {
            debug!(file = %file.relative, "skip: no contents");
            return Ok(StoreOutcome::Skipped {
                relative: file.relative.clone(),
            });
        }
    };

    let remote_path = config.remote_path(&file.relative);
    ensure_collection(client, &path::collection_of(&remote_path)).await?;

    let mime_type = mime::classify(&file.relative);
    info!(
        local = %file.path.display(),
        remote = %remote_path,
        mime = %mime_type,
        "storing"
    );

    let (mime_type, binary_fallback) =
        match upload_and_parse(client, content, &remote_path, &mime_type).await {
            Ok(()) => (mime_type, false),
            Err(e) if e.is_parse() && config.html5_as_binary() && file.extension() == Some(".html") => {
                warn!(
                    file = %file.relative,
                    reason = %e.summary(),
                    "not well-formed XML, storing as binary"
                );
                match upload_and_parse(client, content, &remote_path, OCTET_STREAM).await {
                    Ok(()) => (OCTET_STREAM.to_string(), true),
                    Err(retry) => return Err(abort(client, &remote_path, retry, true).await),
                }
            }
            Err(e) => {
                let contaminated = e.is_parse();
                return Err(abort(client, &remote_path, e, contaminated).await);
            }
        };

    let permissions = match config.permissions_for(&file.relative) {
        Some(perms) => {
            apply_permissions(client, &remote_path, perms).await?;
            Some(perms.to_string())
        }
        None => None,
    };

    info!(remote = %remote_path, mime = %mime_type, "stored");

    Ok(StoreOutcome::Stored {
        remote_path,
        mime_type,
        binary_fallback,
        permissions,
    })
}

async fn upload_and_parse(
    client: &dyn RemoteClient,
    content: &Bytes,
    remote_path: &str,
    mime_type: &str,
) -> Result<(), RemoteError> {
    let handle = client.upload(content.clone()).await?;
    client.parse_local(&handle, remote_path, mime_type).await
}

/// Turn a terminal failure into the reported error, removing the target
/// first when a parse attempt may have touched it.
async fn abort(
    client: &dyn RemoteClient,
    remote_path: &str,
    err: RemoteError,
    contaminated: bool,
) -> SyncError {
    warn!(remote = %remote_path, reason = %err.summary(), "not stored");

    if contaminated {
        match client.remove_resource(remote_path).await {
            Ok(()) => debug!(remote = %remote_path, "removed after failed parse"),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(remote = %remote_path, "cleanup after failed parse failed: {e}"),
        }
    }

    if err.is_parse() {
        SyncError::Parse {
            remote_path: remote_path.to_string(),
            source: err,
        }
    } else {
        SyncError::Remote(err)
    }
}
