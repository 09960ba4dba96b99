//! In-process [`RemoteClient`] backed by maps.
//!
//! Behaves like the real database where the sync protocol depends on it:
//! collections are created with their ancestors, markup content is checked
//! for well-formedness, and a failed parse still bumps the modification time
//! of the resource it was aimed at. Every call is recorded, and faults can be
//! injected per operation, so protocol tests can assert on exact call
//! sequences without a live server.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use xdbp_core::path;

use crate::client::{CollectionInfo, InstallResponse, QueryParams, QueryResult, RemoteClient, ResourceInfo, UploadHandle};
use crate::error::{RemoteError, RemoteResult};

/// Root collection present in every database.
pub const ROOT_COLLECTION: &str = "/db";

const DEFAULT_PERMISSIONS: &str = "rw-r--r--";
const DEFAULT_COLLECTION_PERMISSIONS: &str = "rwxr-xr-x";

/// Operation kinds, used for the call log and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    DescribeCollection,
    CreateCollection,
    RemoveCollection,
    Upload,
    ParseLocal,
    DescribeResource,
    SetPermissions,
    RemoveResource,
    QueryAll,
    UploadPackage,
    InstallPackage,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    /// Remote path, package name or upload handle
    pub target: String,
    /// Mime type for parses, permission string for permission changes
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredResource {
    content: Bytes,
    mime_type: String,
    modified: DateTime<Utc>,
    permissions: String,
}

#[derive(Debug, Clone)]
struct StoredCollection {
    created: DateTime<Utc>,
    permissions: String,
}

#[derive(Default)]
struct State {
    collections: BTreeMap<String, StoredCollection>,
    resources: BTreeMap<String, StoredResource>,
    uploads: HashMap<String, Bytes>,
    next_handle: u64,
    packages: HashMap<String, Bytes>,
    installed: HashSet<String>,
    query_results: VecDeque<RemoteResult<Vec<Bytes>>>,
    faults: HashMap<Op, VecDeque<RemoteError>>,
    offline: bool,
    report_modified: bool,
    clock: Option<DateTime<Utc>>,
    calls: Vec<Call>,
}

impl State {
    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    fn has_collection(&self, path: &str) -> bool {
        path == "/" || self.collections.contains_key(path)
    }

    fn insert_collection_tree(&mut self, path: &str) -> bool {
        let now = self.now();
        let mut created = false;
        let mut current = String::new();
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(seg);
            if !self.collections.contains_key(&current) {
                self.collections.insert(
                    current.clone(),
                    StoredCollection {
                        created: now,
                        permissions: DEFAULT_COLLECTION_PERMISSIONS.to_string(),
                    },
                );
                created = true;
            }
        }
        created
    }

    /// Record the call, then apply connectivity and injected faults.
    fn enter(&mut self, op: Op, target: &str, detail: Option<&str>) -> RemoteResult<()> {
        self.calls.push(Call {
            op,
            target: target.to_string(),
            detail: detail.map(str::to_string),
        });
        if self.offline {
            return Err(RemoteError::Transport("connection refused".into()));
        }
        if let Some(err) = self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(())
    }
}

/// In-memory database. Cheap to construct; share it behind an `Arc`.
pub struct MemoryClient {
    state: Mutex<State>,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    /// Empty database containing only the root collection.
    pub fn new() -> Self {
        let mut state = State {
            report_modified: true,
            ..Default::default()
        };
        state.insert_collection_tree(ROOT_COLLECTION);
        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ── Setup ─────────────────────────────────────────────────────────────────

    pub fn with_collection(self, path: &str) -> Self {
        self.state().insert_collection_tree(&canonical(path));
        self
    }

    /// Seed a stored resource (its collection is created as needed).
    pub fn with_resource(self, path: &str, content: impl Into<Bytes>, modified: DateTime<Utc>) -> Self {
        let path = canonical(path);
        {
            let mut state = self.state();
            state.insert_collection_tree(&path::collection_of(&path));
            state.resources.insert(
                path,
                StoredResource {
                    content: content.into(),
                    mime_type: "application/xml".into(),
                    modified,
                    permissions: DEFAULT_PERMISSIONS.into(),
                },
            );
        }
        self
    }

    /// Pin the clock used for creation and modification times.
    pub fn with_fixed_clock(self, now: DateTime<Utc>) -> Self {
        self.state().clock = Some(now);
        self
    }

    /// Omit modification times from resource descriptions.
    pub fn without_modified(self) -> Self {
        self.state().report_modified = false;
        self
    }

    // ── Fault injection ───────────────────────────────────────────────────────

    /// Fail every subsequent call with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Fail the next call of `op` with `err`. Injections queue up per operation.
    pub fn inject(&self, op: Op, err: RemoteError) {
        self.state().faults.entry(op).or_default().push_back(err);
    }

    /// Queue the pages returned by the next query.
    pub fn push_query_result<I, B>(&self, pages: I)
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let pages = pages.into_iter().map(Into::into).collect();
        self.state().query_results.push_back(Ok(pages));
    }

    /// Queue a failure for the next query.
    pub fn push_query_error(&self, err: RemoteError) {
        self.state().query_results.push_back(Err(err));
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Operations issued so far, in order.
    pub fn ops(&self) -> Vec<Op> {
        self.state().calls.iter().map(|c| c.op).collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.state().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn has_collection(&self, path: &str) -> bool {
        self.state().has_collection(&canonical(path))
    }

    pub fn content(&self, path: &str) -> Option<Bytes> {
        self.state().resources.get(&canonical(path)).map(|r| r.content.clone())
    }

    pub fn mime_type(&self, path: &str) -> Option<String> {
        self.state().resources.get(&canonical(path)).map(|r| r.mime_type.clone())
    }

    pub fn permissions(&self, path: &str) -> Option<String> {
        self.state().resources.get(&canonical(path)).map(|r| r.permissions.clone())
    }

    pub fn modified(&self, path: &str) -> Option<DateTime<Utc>> {
        self.state().resources.get(&canonical(path)).map(|r| r.modified)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.state().installed.contains(name)
    }
}

fn canonical(p: &str) -> String {
    path::trim_trailing_slash(&path::normalize(p))
}

fn is_markup(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "application/xml" | "text/xml" | "text/html" | "application/xhtml+xml"
    ) || mime_type.ends_with("+xml")
}

/// Reject content that is not a single well-formed XML element tree.
fn check_well_formed(content: &[u8]) -> Result<(), String> {
    let mut reader = quick_xml::Reader::from_reader(content);
    let mut depth = 0usize;
    let mut roots = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Empty(_)) if depth == 0 => roots += 1,
            Ok(Event::Text(text)) if depth == 0 && !text.iter().all(u8::is_ascii_whitespace) => {
                return Err(format!(
                    "SAXParseException at offset {}: content is not allowed outside the root element",
                    reader.buffer_position()
                ));
            }
            Ok(Event::CData(_)) if depth == 0 => {
                return Err("SAXParseException: CDATA is not allowed outside the root element".into());
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "SAXParseException at offset {}: {e}",
                    reader.buffer_position()
                ))
            }
        }
    }
    if depth != 0 {
        return Err("SAXParseException: document ends inside an element".into());
    }
    match roots {
        1 => Ok(()),
        0 => Err("SAXParseException: content is not allowed in prolog".into()),
        _ => Err("SAXParseException: more than one root element".into()),
    }
}

#[async_trait::async_trait]
impl RemoteClient for MemoryClient {
    async fn describe_collection(&self, path: &str) -> RemoteResult<CollectionInfo> {
        let path = canonical(path);
        let mut state = self.state();
        state.enter(Op::DescribeCollection, &path, None)?;
        if !state.has_collection(&path) {
            return Err(RemoteError::NotFound(format!("collection {path} not found")));
        }

        let prefix = if path == "/" { "/".to_string() } else { format!("{path}/") };
        let collections = state
            .collections
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect();
        let stored = state.collections.get(&path);
        Ok(CollectionInfo {
            owner: "admin".into(),
            permissions: stored
                .map(|c| c.permissions.clone())
                .unwrap_or_else(|| DEFAULT_COLLECTION_PERMISSIONS.into()),
            created: stored.map(|c| c.created),
            path,
            collections,
        })
    }

    async fn create_collection(&self, path: &str) -> RemoteResult<()> {
        let path = canonical(path);
        let mut state = self.state();
        state.enter(Op::CreateCollection, &path, None)?;
        if !path.starts_with('/') {
            return Err(RemoteError::Fault(format!("invalid collection path: {path}")));
        }
        if state.resources.contains_key(&path) {
            return Err(RemoteError::Fault(format!("a resource already exists at {path}")));
        }
        if state.insert_collection_tree(&path) {
            debug!(collection = %path, "memory: collection created");
        }
        Ok(())
    }

    async fn remove_collection(&self, path: &str) -> RemoteResult<()> {
        let path = canonical(path);
        let mut state = self.state();
        state.enter(Op::RemoveCollection, &path, None)?;
        if !state.collections.contains_key(&path) {
            return Err(RemoteError::NotFound(format!("collection {path} not found")));
        }
        let prefix = format!("{path}/");
        state.collections.retain(|k, _| k != &path && !k.starts_with(&prefix));
        state.resources.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }

    async fn upload(&self, content: Bytes) -> RemoteResult<UploadHandle> {
        let mut state = self.state();
        let handle = format!("upload-{}", state.next_handle);
        state.enter(Op::Upload, &handle, None)?;
        state.next_handle += 1;
        state.uploads.insert(handle.clone(), content);
        Ok(UploadHandle(handle))
    }

    async fn parse_local(&self, handle: &UploadHandle, path: &str, mime_type: &str) -> RemoteResult<()> {
        let path = canonical(path);
        let mut state = self.state();
        state.enter(Op::ParseLocal, &path, Some(mime_type))?;

        let content = state
            .uploads
            .remove(&handle.0)
            .ok_or_else(|| RemoteError::Fault(format!("unknown upload handle {}", handle.0)))?;

        let collection = path::collection_of(&path);
        if !state.has_collection(&collection) {
            return Err(RemoteError::NotFound(format!("collection {collection} not found")));
        }

        let now = state.now();
        if is_markup(mime_type) {
            if let Err(msg) = check_well_formed(&content) {
                // The server touches the target before it gives up on parsing.
                if let Some(existing) = state.resources.get_mut(&path) {
                    existing.modified = now;
                }
                return Err(RemoteError::Parse(msg));
            }
        }

        let permissions = state
            .resources
            .get(&path)
            .map(|r| r.permissions.clone())
            .unwrap_or_else(|| DEFAULT_PERMISSIONS.into());
        state.resources.insert(
            path,
            StoredResource {
                content,
                mime_type: mime_type.to_string(),
                modified: now,
                permissions,
            },
        );
        Ok(())
    }

    async fn describe_resource(&self, path: &str) -> RemoteResult<ResourceInfo> {
        let path = canonical(path);
        let mut state = self.state();
        state.enter(Op::DescribeResource, &path, None)?;
        let report_modified = state.report_modified;
        let res = state
            .resources
            .get(&path)
            .ok_or_else(|| RemoteError::NotFound(format!("resource {path} not found")))?;
        Ok(ResourceInfo {
            mime_type: res.mime_type.clone(),
            size: res.content.len() as u64,
            owner: "admin".into(),
            permissions: res.permissions.clone(),
            modified: report_modified.then_some(res.modified),
            path,
        })
    }

    async fn set_permissions(&self, path: &str, permissions: &str) -> RemoteResult<()> {
        let path = canonical(path);
        let mut state = self.state();
        state.enter(Op::SetPermissions, &path, Some(permissions))?;

        let valid = permissions.len() == 9
            && permissions
                .chars()
                .all(|c| matches!(c, 'r' | 'w' | 'x' | '-' | 's' | 'S' | 't' | 'T'));
        if !valid {
            return Err(RemoteError::Fault(format!("invalid permission string: {permissions}")));
        }

        if let Some(res) = state.resources.get_mut(&path) {
            res.permissions = permissions.to_string();
            return Ok(());
        }
        if let Some(col) = state.collections.get_mut(&path) {
            col.permissions = permissions.to_string();
            return Ok(());
        }
        Err(RemoteError::NotFound(format!("{path} not found")))
    }

    async fn remove_resource(&self, path: &str) -> RemoteResult<()> {
        let path = canonical(path);
        let mut state = self.state();
        state.enter(Op::RemoveResource, &path, None)?;
        state
            .resources
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(format!("resource {path} not found")))
    }

    async fn query_all(&self, script: Bytes, _params: &QueryParams) -> RemoteResult<QueryResult> {
        let mut state = self.state();
        state.enter(Op::QueryAll, &format!("<{} bytes>", script.len()), None)?;
        match state.query_results.pop_front() {
            Some(Ok(pages)) => Ok(QueryResult { pages }),
            Some(Err(err)) => Err(err),
            None => Err(RemoteError::Fault("no query result available".into())),
        }
    }

    async fn upload_package(&self, name: &str, content: Bytes) -> RemoteResult<bool> {
        let mut state = self.state();
        state.enter(Op::UploadPackage, name, None)?;
        if content.is_empty() {
            return Ok(false);
        }
        state.packages.insert(name.to_string(), content);
        Ok(true)
    }

    async fn install_package(&self, name: &str, repo_url: Option<&str>) -> RemoteResult<InstallResponse> {
        let mut state = self.state();
        state.enter(Op::InstallPackage, name, repo_url)?;
        if !state.packages.contains_key(name) {
            return Ok(InstallResponse::default());
        }
        let stem = name.strip_suffix(".xar").unwrap_or(name);
        let target = format!("{ROOT_COLLECTION}/apps/{stem}");
        state.insert_collection_tree(&target);
        let updated = !state.installed.insert(name.to_string());
        Ok(InstallResponse {
            success: true,
            updated,
            target: Some(target),
        })
    }
}
