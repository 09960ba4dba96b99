//! Database health check

use anyhow::Result;

use crate::client::RemoteClient;
use crate::memory::ROOT_COLLECTION;

/// Verify the database is reachable and the credentials are accepted by
/// describing the root collection.
pub async fn check_health(client: &dyn RemoteClient) -> Result<()> {
    client
        .describe_collection(ROOT_COLLECTION)
        .await
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("database health check failed: {e}"))
}

/// Returns true if the database is reachable, false otherwise (non-panicking)
pub async fn is_healthy(client: &dyn RemoteClient) -> bool {
    check_health(client).await.is_ok()
}
