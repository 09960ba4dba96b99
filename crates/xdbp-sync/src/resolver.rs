//! Make sure the collection a resource is stored into exists.

use tracing::{debug, info};
use xdbp_core::path;
use xdbp_remote::{RemoteClient, RemoteError};

/// What [`ensure_collection`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The collection was already there
    Existing,
    /// The collection (and any missing ancestors) was created
    Created,
}

/// Describe `collection` and create it if the server reports it missing.
///
/// Only a `NotFound` answer leads to a create call. Any other describe
/// failure (unreachable server, rejected credentials) is returned unchanged.
pub async fn ensure_collection(
    client: &dyn RemoteClient,
    collection: &str,
) -> Result<Resolution, RemoteError> {
    let collection = path::trim_trailing_slash(&path::normalize(collection));

    match client.describe_collection(&collection).await {
        Ok(_) => {
            debug!(collection = %collection, "collection exists");
            Ok(Resolution::Existing)
        }
        Err(e) if e.is_not_found() => {
            info!(collection = %collection, "creating collection");
            client.create_collection(&collection).await?;
            Ok(Resolution::Created)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdbp_remote::{MemoryClient, Op};

    #[tokio::test]
    async fn test_existing_collection_issues_no_create() {
        let client = MemoryClient::new().with_collection("/db/tmp");
        let res = ensure_collection(&client, "/db/tmp").await.unwrap();
        assert_eq!(res, Resolution::Existing);
        assert_eq!(client.ops(), vec![Op::DescribeCollection]);
    }

    #[tokio::test]
    async fn test_missing_collection_is_created_with_normalized_path() {
        let client = MemoryClient::new();
        let res = ensure_collection(&client, "/db//tmp\\a/./b/").await.unwrap();
        assert_eq!(res, Resolution::Created);
        let calls = client.calls();
        assert_eq!(calls[1].op, Op::CreateCollection);
        assert_eq!(calls[1].target, "/db/tmp/a/b");
        assert!(client.has_collection("/db/tmp/a/b"));
    }

    #[tokio::test]
    async fn test_second_call_is_idempotent() {
        let client = MemoryClient::new();
        ensure_collection(&client, "/db/tmp/x").await.unwrap();
        let second = ensure_collection(&client, "/db/tmp/x").await.unwrap();
        assert_eq!(second, Resolution::Existing);
        assert_eq!(client.count(Op::CreateCollection), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_treated_as_missing() {
        let client = MemoryClient::new();
        client.set_offline(true);
        let err = ensure_collection(&client, "/db/tmp").await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(client.count(Op::CreateCollection), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_propagates_unchanged() {
        let client = MemoryClient::new();
        let fault = RemoteError::Auth("user guest is not allowed".into());
        client.inject(Op::DescribeCollection, fault.clone());
        let err = ensure_collection(&client, "/db/tmp").await.unwrap_err();
        assert_eq!(err, fault);
        assert_eq!(client.count(Op::CreateCollection), 0);
    }

    #[tokio::test]
    async fn test_create_failure_propagates() {
        let client = MemoryClient::new();
        client.inject(Op::CreateCollection, RemoteError::Fault("permission denied".into()));
        let err = ensure_collection(&client, "/db/locked").await.unwrap_err();
        assert!(matches!(err, RemoteError::Fault(_)));
    }
}
