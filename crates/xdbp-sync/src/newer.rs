//! "newer" filter: decide whether a record must be sent again by comparing
//! its local modification time with what the server reports.

use chrono::{DateTime, Utc};
use tracing::debug;
use xdbp_core::{path, FileRecord};
use xdbp_remote::RemoteClient;

use crate::error::SyncError;
use crate::store::UploadConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The record is newer than the remote copy (or there is none)
    Keep,
    /// The remote copy is at least as recent
    Drop,
}

impl Freshness {
    pub fn keep(self) -> bool {
        self == Freshness::Keep
    }
}

/// Check one record against the server.
///
/// `NotFound` means "needs sending"; any other failure is returned.
pub async fn is_newer(
    client: &dyn RemoteClient,
    file: &FileRecord,
    config: &UploadConfig,
) -> Result<Freshness, SyncError> {
    if file.is_directory() {
        let collection = path::trim_trailing_slash(&config.remote_path(&file.relative));
        return match client.describe_collection(&collection).await {
            Ok(_) => {
                debug!(collection = %collection, "collection present");
                Ok(Freshness::Drop)
            }
            Err(e) if e.is_not_found() => Ok(Freshness::Keep),
            Err(e) => Err(e.into()),
        };
    }

    let remote_path = config.remote_path(&file.relative);
    let remote_modified = match client.describe_resource(&remote_path).await {
        Ok(info) => info.modified,
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    let freshness = compare(file.modified, remote_modified);
    debug!(
        remote = %remote_path,
        local_modified = ?file.modified,
        remote_modified = ?remote_modified,
        ?freshness,
        "newer check"
    );
    Ok(freshness)
}

/// Keep iff the remote has no timestamp or the local one is strictly later.
///
/// A record without a local timestamp is never newer than a timestamped
/// remote resource.
pub fn compare(local: Option<DateTime<Utc>>, remote: Option<DateTime<Utc>>) -> Freshness {
    match (local, remote) {
        (_, None) => Freshness::Keep,
        (Some(l), Some(r)) if l > r => Freshness::Keep,
        _ => Freshness::Drop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_compare_table() {
        assert_eq!(compare(Some(t(2)), Some(t(1))), Freshness::Keep);
        assert_eq!(compare(Some(t(1)), Some(t(1))), Freshness::Drop);
        assert_eq!(compare(Some(t(1)), Some(t(2))), Freshness::Drop);
        assert_eq!(compare(None, None), Freshness::Keep);
        assert_eq!(compare(Some(t(0)), None), Freshness::Keep);
        assert_eq!(compare(None, Some(t(0))), Freshness::Drop);
    }
}
