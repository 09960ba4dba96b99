use tracing::info;
use xdbp_remote::RemoteClient;

use crate::error::SyncError;

/// Apply a unix-style permission string to a stored resource.
///
/// The string is passed through as-is; the server reports malformed ones.
pub async fn apply_permissions(
    client: &dyn RemoteClient,
    remote_path: &str,
    permissions: &str,
) -> Result<(), SyncError> {
    info!(remote = %remote_path, permissions = %permissions, "setting permissions");
    client
        .set_permissions(remote_path, permissions)
        .await
        .map_err(|source| SyncError::Permissions {
            remote_path: remote_path.to_string(),
            permissions: permissions.to_string(),
            source,
        })
}
