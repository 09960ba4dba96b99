//! A session binds one shared client to resolved configuration and drives
//! record streams through the protocol, one record at a time.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};
use xdbp_core::config::{InstallOptions, QueryOptions, XdbpConfig};
use xdbp_core::{mime, FileRecord};
use xdbp_remote::RemoteClient;

use crate::error::SyncError;
use crate::install::{install_package, InstallReport};
use crate::newer::{is_newer, Freshness};
use crate::query::query_file;
use crate::resolver::Resolution;
use crate::store::{store, StoreOutcome, UploadConfig};

/// A record that could not be stored or checked.
#[derive(Debug)]
pub struct RecordFailure {
    pub relative: String,
    pub error: SyncError,
}

/// Totals of a [`Session::push`] run.
#[derive(Debug, Default)]
pub struct PushReport {
    pub stored: usize,
    /// Documents stored as binary after a parse failure
    pub stored_as_binary: usize,
    pub collections_created: usize,
    pub collections_existing: usize,
    /// Records with nothing to send
    pub skipped: usize,
    pub failures: Vec<RecordFailure>,
}

impl PushReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, outcome: &StoreOutcome) {
        match outcome {
            StoreOutcome::Stored { binary_fallback, .. } => {
                self.stored += 1;
                if *binary_fallback {
                    self.stored_as_binary += 1;
                }
            }
            StoreOutcome::Collection {
                resolution: Resolution::Created,
                ..
            } => self.collections_created += 1,
            StoreOutcome::Collection { .. } => self.collections_existing += 1,
            StoreOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Result of a [`Session::filter_newer`] run.
#[derive(Debug, Default)]
pub struct FilterReport {
    /// Records newer than their remote copies, in input order
    pub kept: Vec<FileRecord>,
    /// Records up to date on the server
    pub dropped: usize,
    pub failures: Vec<RecordFailure>,
}

impl FilterReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Session {
    client: Arc<dyn RemoteClient>,
    upload: UploadConfig,
    query: QueryOptions,
    install: InstallOptions,
    fail_fast: bool,
}

impl Session {
    /// Set up a session. Extra mime types from the config are merged into
    /// the process-wide table here, before any record is processed.
    pub fn new(client: Arc<dyn RemoteClient>, config: &XdbpConfig) -> Self {
        if !config.mime_types.is_empty() {
            mime::extend(config.mime_types.iter().map(|(ext, ty)| (ext, ty.clone())));
        }

        let upload = UploadConfig::from_options(&config.upload);
        info!(
            target_collection = %upload.target(),
            html5_as_binary = upload.html5_as_binary(),
            "session initialized"
        );

        Self {
            client,
            upload,
            query: config.query.clone(),
            install: config.install.clone(),
            fail_fast: false,
        }
    }

    pub fn with_upload_config(mut self, upload: UploadConfig) -> Self {
        self.upload = upload;
        self
    }

    /// Stop [`push`](Self::push) and [`filter_newer`](Self::filter_newer)
    /// at the first failed record.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn client(&self) -> &dyn RemoteClient {
        self.client.as_ref()
    }

    pub fn upload_config(&self) -> &UploadConfig {
        &self.upload
    }

    pub async fn store(&self, file: &FileRecord) -> Result<StoreOutcome, SyncError> {
        store(self.client(), file, &self.upload).await
    }

    pub async fn newer(&self, file: &FileRecord) -> Result<Freshness, SyncError> {
        is_newer(self.client(), file, &self.upload).await
    }

    pub async fn query(&self, file: FileRecord) -> Result<Option<FileRecord>, SyncError> {
        query_file(self.client(), file, &self.query).await
    }

    pub async fn install(&self, file: &FileRecord) -> Result<InstallReport, SyncError> {
        install_package(self.client(), file, &self.install).await
    }

    /// Store every record of `records`, in order.
    ///
    /// A failed record is logged and counted; the remaining records are
    /// still processed unless fail-fast is enabled.
    pub async fn push<S>(&self, records: S) -> PushReport
    where
        S: Stream<Item = FileRecord>,
    {
        let mut report = PushReport::default();
        let mut records = std::pin::pin!(records);

        while let Some(record) = records.next().await {
            match self.store(&record).await {
                Ok(outcome) => report.record(&outcome),
                Err(error) => {
                    warn!(file = %record.relative, "store failed: {error}");
                    report.failures.push(RecordFailure {
                        relative: record.relative,
                        error,
                    });
                    if self.fail_fast {
                        break;
                    }
                }
            }
        }

        info!(
            stored = report.stored,
            created = report.collections_created,
            skipped = report.skipped,
            failed = report.failures.len(),
            "push complete"
        );
        report
    }

    /// Keep only the records that are newer than their remote copies.
    ///
    /// A record whose check fails is counted as a failure and the rest are
    /// still checked, unless fail-fast is enabled.
    pub async fn filter_newer<S>(&self, records: S) -> FilterReport
    where
        S: Stream<Item = FileRecord>,
    {
        let mut report = FilterReport::default();
        let mut records = std::pin::pin!(records);

        while let Some(record) = records.next().await {
            match self.newer(&record).await {
                Ok(Freshness::Keep) => report.kept.push(record),
                Ok(Freshness::Drop) => report.dropped += 1,
                Err(error) => {
                    warn!(file = %record.relative, "newer check failed: {error}");
                    report.failures.push(RecordFailure {
                        relative: record.relative,
                        error,
                    });
                    if self.fail_fast {
                        break;
                    }
                }
            }
        }

        info!(
            kept = report.kept.len(),
            dropped = report.dropped,
            failed = report.failures.len(),
            "newer filter complete"
        );
        report
    }
}
