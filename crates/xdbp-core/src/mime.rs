//! Content type classification for stored resources.
//!
//! The server decides how to treat an upload from the mimetype hint, so
//! XQuery modules and XML-flavoured configuration files must be classified
//! explicitly; everything else falls back to the general extension database.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// Content type used when nothing more specific is known, and for the
/// binary fallback of documents the server refuses to parse.
pub const OCTET_STREAM: &str = "application/octet-stream";

pub const XQUERY: &str = "application/xquery";
pub const XML: &str = "application/xml";

const XQUERY_EXTENSIONS: &[&str] = &["xq", "xql", "xqm", "xquery", "xqy", "xqws"];
const XML_EXTENSIONS: &[&str] = &["xconf", "odd", "xml"];

/// Extension → content type registry.
#[derive(Debug, Clone)]
pub struct MimeTable {
    entries: HashMap<String, String>,
}

impl Default for MimeTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        for ext in XQUERY_EXTENSIONS {
            entries.insert((*ext).to_string(), XQUERY.to_string());
        }
        for ext in XML_EXTENSIONS {
            entries.insert((*ext).to_string(), XML.to_string());
        }
        Self { entries }
    }
}

impl MimeTable {
    /// A table with no registered entries (lookups use the extension database only).
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Merge entries into the table; later entries win.
    ///
    /// Extensions are accepted with or without a leading dot.
    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (ext, mime) in entries {
            self.entries.insert(canonical_ext(ext.as_ref()), mime.into());
        }
    }

    /// Registered type for an extension, if any.
    pub fn get(&self, ext: &str) -> Option<&str> {
        self.entries.get(&canonical_ext(ext)).map(String::as_str)
    }

    /// Content type for `path`. Never fails.
    pub fn classify(&self, path: &str) -> String {
        let Some(ext) = crate::path::extension(path) else {
            return OCTET_STREAM.to_string();
        };
        if let Some(mime) = self.get(ext) {
            return mime.to_string();
        }
        mime_guess::from_ext(ext.trim_start_matches('.'))
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn canonical_ext(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

// ── Process-wide table ───────────────────────────────────────────────────────

static GLOBAL: OnceLock<RwLock<MimeTable>> = OnceLock::new();

fn global() -> &'static RwLock<MimeTable> {
    GLOBAL.get_or_init(|| RwLock::new(MimeTable::default()))
}

/// Classify `path` against the process-wide table.
pub fn classify(path: &str) -> String {
    match global().read() {
        Ok(table) => table.classify(path),
        Err(poisoned) => poisoned.into_inner().classify(path),
    }
}

/// Merge entries into the process-wide table, overriding on conflict.
pub fn extend<I, K, V>(entries: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut table = match global().write() {
        Ok(table) => table,
        Err(poisoned) => poisoned.into_inner(),
    };
    table.extend(entries);
}

/// Copy of the process-wide table.
pub fn snapshot() -> MimeTable {
    match global().read() {
        Ok(table) => table.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_xquery_types() {
        let table = MimeTable::default();
        for name in ["a.xq", "a.xql", "lib/a.xqm", "a.xquery", "a.xqy", "a.xqws"] {
            assert_eq!(table.classify(name), XQUERY, "{name}");
        }
    }

    #[test]
    fn test_seeded_xml_types() {
        let table = MimeTable::default();
        assert_eq!(table.classify("collection.xconf"), XML);
        assert_eq!(table.classify("schema.odd"), XML);
        assert_eq!(table.classify("data/test.xml"), XML);
    }

    #[test]
    fn test_fallback_database_and_unknown() {
        let table = MimeTable::default();
        assert_eq!(table.classify("index.html"), "text/html");
        assert_eq!(table.classify("blob.zzzunknown"), OCTET_STREAM);
        assert_eq!(table.classify("Makefile"), OCTET_STREAM);
    }

    #[test]
    fn test_extend_overrides_and_ignores_case() {
        let mut table = MimeTable::default();
        table.extend([(".XQL", "text/plain"), ("tei", "application/tei+xml")]);
        assert_eq!(table.classify("a.xql"), "text/plain");
        assert_eq!(table.classify("A.TEI"), "application/tei+xml");
    }

    #[test]
    fn test_global_extend() {
        extend([("xdbpglobaltest", "application/x-global-test")]);
        assert_eq!(classify("a.xdbpglobaltest"), "application/x-global-test");
        assert_eq!(classify("a.xql"), XQUERY);
        assert!(snapshot().get("xdbpglobaltest").is_some());
    }
}
