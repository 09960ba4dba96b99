//! Integration test: the newer filter against remote modification times

use chrono::{DateTime, TimeZone, Utc};
use xdbp_core::FileRecord;
use xdbp_remote::{MemoryClient, Op, RemoteError};
use xdbp_sync::store::{store, UploadConfig};
use xdbp_sync::newer::is_newer;
use xdbp_sync::Freshness;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn config() -> UploadConfig {
    UploadConfig::new("/tmp")
}

#[tokio::test]
async fn existing_collection_is_not_newer() {
    let client = MemoryClient::new().with_collection("/tmp/sub");
    let freshness = is_newer(&client, &FileRecord::directory("sub"), &config())
        .await
        .unwrap();
    assert_eq!(freshness, Freshness::Drop);
}

#[tokio::test]
async fn missing_collection_is_newer() {
    let client = MemoryClient::new();
    let freshness = is_newer(&client, &FileRecord::directory("sub"), &config())
        .await
        .unwrap();
    assert_eq!(freshness, Freshness::Keep);
    assert_eq!(client.count(Op::CreateCollection), 0);
}

#[tokio::test]
async fn missing_resource_is_newer() {
    let client = MemoryClient::new();
    let file = FileRecord::buffer("a/test.xml", "<a/>").with_modified(t(100));
    assert_eq!(is_newer(&client, &file, &config()).await.unwrap(), Freshness::Keep);
}

#[tokio::test]
async fn local_timestamp_is_compared_strictly() {
    let client = MemoryClient::new().with_resource("/tmp/test.xml", "<a/>", t(500));
    let cases = [
        (t(501), Freshness::Keep),
        (t(500), Freshness::Drop),
        (t(499), Freshness::Drop),
    ];
    for (local, expected) in cases {
        let file = FileRecord::buffer("test.xml", "<a/>").with_modified(local);
        assert_eq!(
            is_newer(&client, &file, &config()).await.unwrap(),
            expected,
            "local {local}"
        );
    }
}

#[tokio::test]
async fn remote_without_timestamp_is_always_replaced() {
    let client = MemoryClient::new()
        .with_resource("/tmp/test.xml", "<a/>", t(500))
        .without_modified();
    let file = FileRecord::buffer("test.xml", "<a/>").with_modified(t(1));
    assert_eq!(is_newer(&client, &file, &config()).await.unwrap(), Freshness::Keep);
}

#[tokio::test]
async fn record_without_local_timestamp_is_not_newer() {
    let client = MemoryClient::new().with_resource("/tmp/test.xml", "<a/>", t(500));
    let file = FileRecord::buffer("test.xml", "<a/>");
    assert_eq!(is_newer(&client, &file, &config()).await.unwrap(), Freshness::Drop);
}

#[tokio::test]
async fn transport_errors_propagate() {
    let client = MemoryClient::new();
    client.set_offline(true);

    let dir = is_newer(&client, &FileRecord::directory("sub"), &config()).await;
    assert!(dir.unwrap_err().is_transport());

    let file = FileRecord::buffer("test.xml", "<a/>").with_modified(t(1));
    assert!(is_newer(&client, &file, &config()).await.unwrap_err().is_transport());
}

#[tokio::test]
async fn auth_failure_is_not_treated_as_missing() {
    let client = MemoryClient::new();
    client.inject(Op::DescribeResource, RemoteError::Auth("wrong password".into()));

    let file = FileRecord::buffer("test.xml", "<a/>").with_modified(t(1));
    let err = is_newer(&client, &file, &config()).await.unwrap_err();
    assert_eq!(err.remote(), Some(&RemoteError::Auth("wrong password".into())));
}

#[tokio::test]
async fn freshly_stored_resource_is_up_to_date() {
    let client = MemoryClient::new().with_fixed_clock(t(2_000));
    let file = FileRecord::buffer("a/test.xml", "<a/>").with_modified(t(1_500));

    assert!(is_newer(&client, &file, &config()).await.unwrap().keep());
    store(&client, &file, &config()).await.unwrap();
    assert_eq!(is_newer(&client, &file, &config()).await.unwrap(), Freshness::Drop);

    let edited = FileRecord::buffer("a/test.xml", "<b/>").with_modified(t(2_500));
    assert!(is_newer(&client, &edited, &config()).await.unwrap().keep());
}

#[tokio::test]
async fn failed_store_leaves_record_newer() {
    let client = MemoryClient::new()
        .with_resource("/tmp/test.xml", "<old/>", t(100))
        .with_fixed_clock(t(2_000));
    let file = FileRecord::buffer("test.xml", "<broken>").with_modified(t(1_000));

    store(&client, &file, &config()).await.unwrap_err();

    // the touched copy was removed, so the next run sends the file again
    assert!(client.modified("/tmp/test.xml").is_none());
    assert_eq!(is_newer(&client, &file, &config()).await.unwrap(), Freshness::Keep);
}
