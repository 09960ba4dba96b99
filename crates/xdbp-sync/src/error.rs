use thiserror::Error;
use xdbp_remote::RemoteError;

/// Per-record failure of a protocol operation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Only fully materialized contents can be sent
    #[error("streaming not supported: {0}")]
    StreamingUnsupported(String),

    /// The server refused to parse the content and no fallback applied
    #[error("{remote_path} was not stored: {}", .source.summary())]
    Parse {
        remote_path: String,
        source: RemoteError,
    },

    /// The resource was stored but its permissions could not be set
    #[error("setting permissions {permissions} on {remote_path} failed: {source}")]
    Permissions {
        remote_path: String,
        permissions: String,
        source: RemoteError,
    },

    #[error("error running query {relative}: {source}")]
    Query {
        relative: String,
        source: RemoteError,
    },

    #[error("source \"{0}\" is a directory")]
    IsDirectory(String),

    #[error("source \"{0}\" is null")]
    IsNull(String),

    #[error("source \"{0}\" is not a XAR package")]
    NotAPackage(String),

    #[error("package {0} was not uploaded")]
    PackageRejected(String),

    #[error("package {0} installation failed")]
    InstallFailed(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl SyncError {
    /// The underlying remote fault, if the failure came from the server.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            SyncError::Parse { source, .. }
            | SyncError::Permissions { source, .. }
            | SyncError::Query { source, .. }
            | SyncError::Remote(source) => Some(source),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.remote().is_some_and(RemoteError::is_transport)
    }
}
