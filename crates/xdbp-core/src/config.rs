use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{XdbpError, XdbpResult};

/// Top-level configuration (loaded from xdbp.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XdbpConfig {
    pub connection: ConnectionConfig,
    pub upload: UploadOptions,
    pub query: QueryOptions,
    pub install: InstallOptions,
    /// Extra extension → content type entries merged into the mime table
    pub mime_types: BTreeMap<String, String>,
}

impl XdbpConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist. `EXISTDB_*` variables from the process
    /// environment override the `[connection]` section.
    pub async fn load(path: &Path) -> XdbpResult<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok()).await
    }

    /// [`load`](Self::load) with environment variables read through `lookup`.
    pub async fn load_with_env<F>(path: &Path, lookup: F) -> XdbpResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Self = if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading config: {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))?
        } else {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            Self::default()
        };
        config.connection.apply_env_from(lookup)?;
        Ok(config)
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            user: "guest".into(),
            pass: "guest".into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"[redacted]")
            .finish()
    }
}

/// Where the database's RPC endpoint lives and how to authenticate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Database host (default: localhost)
    pub host: String,
    /// Database port (default: 8443)
    pub port: u16,
    /// Use HTTPS (default: true)
    pub secure: bool,
    /// Path to the RPC endpoint (default: /exist/xmlrpc)
    pub path: String,
    pub credentials: Credentials,
    /// Refuse plaintext endpoints instead of warning about them
    pub enforce_tls: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8443,
            secure: true,
            path: "/exist/xmlrpc".into(),
            credentials: Credentials::default(),
            enforce_tls: false,
        }
    }
}

impl ConnectionConfig {
    /// Apply `EXISTDB_SERVER`, `EXISTDB_USER` and `EXISTDB_PASS` from the
    /// process environment.
    pub fn apply_env(&mut self) -> XdbpResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// `EXISTDB_SERVER` is a URL whose scheme, host and port replace the
    /// configured ones. The user is only taken over when a password is set too.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> XdbpResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(server) = lookup("EXISTDB_SERVER") {
            let url = url::Url::parse(&server)
                .map_err(|e| XdbpError::Endpoint(format!("EXISTDB_SERVER={server}: {e}")))?;
            let host = url
                .host_str()
                .ok_or_else(|| XdbpError::Endpoint(format!("EXISTDB_SERVER={server}: no host")))?;
            self.host = host.to_string();
            self.secure = url.scheme() == "https";
            if let Some(port) = url.port_or_known_default() {
                self.port = port;
            }
        }

        if let (Some(user), Some(pass)) = (lookup("EXISTDB_USER"), lookup("EXISTDB_PASS")) {
            self.credentials = Credentials { user, pass };
        }
        Ok(())
    }

    /// RPC endpoint URL.
    ///
    /// Plaintext endpoints are an error when `enforce_tls` is set and a
    /// warning otherwise.
    pub fn endpoint(&self) -> XdbpResult<String> {
        let scheme = if self.secure { "https" } else { "http" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        let endpoint = format!("{scheme}://{}:{}{path}", self.host, self.port);
        url::Url::parse(&endpoint).map_err(|e| XdbpError::Endpoint(format!("{endpoint}: {e}")))?;

        if !self.secure {
            if self.enforce_tls {
                return Err(XdbpError::Config(format!(
                    "endpoint uses plaintext HTTP ({endpoint}), but enforce_tls is enabled. \
                     Set connection.secure = true or connection.enforce_tls = false for local development."
                )));
            }
            tracing::warn!(
                endpoint = %endpoint,
                "RPC endpoint uses plaintext HTTP; credentials are transmitted unencrypted"
            );
        }
        Ok(endpoint)
    }
}

/// Options for storing files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadOptions {
    /// Collection to write to (default: "")
    pub target: String,
    /// Relative path → unix style permission string (e.g. "rwxr-xr-x")
    pub permissions: BTreeMap<String, String>,
    /// Store `.html` files the server cannot parse as binary
    pub html5_as_binary: bool,
}

/// Options for running query scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Parameters passed to the server with every script
    pub params: BTreeMap<String, serde_json::Value>,
    /// Log each result (default: true)
    pub print_results: bool,
    /// Extension of result records, e.g. "xml" or "json"
    pub output_extension: String,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            params: BTreeMap::new(),
            print_results: true,
            output_extension: "xml".into(),
        }
    }
}

/// Options for package installation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallOptions {
    /// Package repository used to resolve dependencies
    pub custom_package_repo_url: Option<String>,
}
