//! Install application packages (`.xar` archives) into the database.

use tracing::info;
use xdbp_core::config::InstallOptions;
use xdbp_core::FileRecord;
use xdbp_remote::RemoteClient;

use crate::error::SyncError;

/// Result of a successful installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub package: String,
    /// An older version was replaced
    pub updated: bool,
    /// Collection the package was deployed to
    pub target: Option<String>,
}

/// Upload a package record under its file name and install it.
pub async fn install_package(
    client: &dyn RemoteClient,
    file: &FileRecord,
    options: &InstallOptions,
) -> Result<InstallReport, SyncError> {
    let name = file.basename().to_string();

    if file.is_stream() {
        return Err(SyncError::StreamingUnsupported(name));
    }
    if file.is_directory() {
        return Err(SyncError::IsDirectory(name));
    }
    let content = match file.bytes() {
        Some(b) if !b.is_empty() => b.clone(),
        _ => return Err(SyncError::IsNull(name)),
    };
    if file.extension() != Some(".xar") {
        return Err(SyncError::NotAPackage(name));
    }

    info!(package = %name, bytes = content.len(), "uploading package");
    if !client.upload_package(&name, content).await? {
        return Err(SyncError::PackageRejected(name));
    }

    info!(package = %name, "installing package");
    let response = client
        .install_package(&name, options.custom_package_repo_url.as_deref())
        .await?;
    if !response.success {
        return Err(SyncError::InstallFailed(name));
    }

    if response.updated {
        info!(package = %name, target = ?response.target, "application was updated");
    } else {
        info!(package = %name, target = ?response.target, "application was installed");
    }

    Ok(InstallReport {
        package: name,
        updated: response.updated,
        target: response.target,
    })
}
