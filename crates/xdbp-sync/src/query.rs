//! Run query scripts on the server and turn their results into records.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;
use xdbp_core::config::QueryOptions;
use xdbp_core::{path, Content, FileRecord};
use xdbp_remote::{QueryParams, RemoteClient, RemoteError};

use crate::error::SyncError;

/// Execute `script` and concatenate the result pages in the order returned.
pub async fn run_query(
    client: &dyn RemoteClient,
    script: Bytes,
    params: &QueryParams,
) -> Result<Bytes, RemoteError> {
    let result = client.query_all(script, params).await?;
    Ok(result.concat())
}

/// Run a script record and return the result as a new record.
///
/// Directory and null records produce nothing. The result record keeps the
/// script's name with its extension replaced by the execution time and the
/// configured output extension (`report.xql` → `report.<time>.xml`).
pub async fn query_file(
    client: &dyn RemoteClient,
    file: FileRecord,
    options: &QueryOptions,
) -> Result<Option<FileRecord>, SyncError> {
    query_file_at(client, file, options, Utc::now()).await
}

/// [`query_file`] with an explicit execution time.
pub async fn query_file_at(
    client: &dyn RemoteClient,
    file: FileRecord,
    options: &QueryOptions,
    executed_at: DateTime<Utc>,
) -> Result<Option<FileRecord>, SyncError> {
    if file.is_stream() {
        return Err(SyncError::StreamingUnsupported(file.relative));
    }
    let script = match file.content {
        Content::Buffer(ref b) if !b.is_empty() => b.clone(),
        _ => return Ok(None),
    };

    info!(script = %file.relative, "running query on server");

    let result = run_query(client, script, &options.params)
        .await
        .map_err(|source| SyncError::Query {
            relative: file.relative.clone(),
            source,
        })?;

    if options.print_results {
        info!(script = %file.relative, "{}", String::from_utf8_lossy(&result));
    }

    let relative = result_name(&file.relative, executed_at, &options.output_extension);
    let basename = relative.rsplit('/').next().unwrap_or(&relative).to_string();
    Ok(Some(FileRecord {
        path: file.path.with_file_name(basename),
        relative,
        content: Content::Buffer(result),
        modified: Some(executed_at),
    }))
}

/// Name of a result record: the script's extension is replaced by
/// `.<RFC 3339 time>.<output extension>`.
pub fn result_name(relative: &str, executed_at: DateTime<Utc>, output_extension: &str) -> String {
    let stamp = executed_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    let ext = output_extension.trim_start_matches('.');
    let stem = match path::extension(relative) {
        Some(current) => &relative[..relative.len() - current.len()],
        None => relative,
    };
    format!("{stem}.{stamp}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use xdbp_remote::{MemoryClient, Op};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_result_name() {
        assert_eq!(
            result_name("test.xql", at(), "xml"),
            "test.2024-03-01T12:30:00.000Z.xml"
        );
        assert_eq!(
            result_name("q/test.json.xql", at(), ".json"),
            "q/test.json.2024-03-01T12:30:00.000Z.json"
        );
        assert_eq!(result_name("script", at(), "xml"), "script.2024-03-01T12:30:00.000Z.xml");
    }

    #[tokio::test]
    async fn test_run_query_concatenates_pages() {
        let client = MemoryClient::new();
        client.push_query_result(["1", "2", "3"]);
        let out = run_query(&client, Bytes::from("(1, 2, 3)"), &QueryParams::new())
            .await
            .unwrap();
        assert_eq!(out, Bytes::from("123"));
    }

    #[tokio::test]
    async fn test_directory_and_null_produce_nothing() {
        let client = MemoryClient::new();
        let options = QueryOptions::default();
        assert!(query_file(&client, FileRecord::directory("q"), &options).await.unwrap().is_none());
        assert!(query_file(&client, FileRecord::null("q.xql"), &options).await.unwrap().is_none());
        assert_eq!(client.count(Op::QueryAll), 0);
    }

    #[tokio::test]
    async fn test_stream_rejected() {
        let client = MemoryClient::new();
        let rec = FileRecord::stream("q.xql", tokio::io::empty());
        let err = query_file(&client, rec, &QueryOptions::default()).await.unwrap_err();
        assert!(matches!(err, SyncError::StreamingUnsupported(_)));
    }
}
