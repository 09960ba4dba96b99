//! Remote path rules.
//!
//! Remote collection paths always use `/`, whatever the host platform uses
//! for local paths. Redundant segments (`//`, `.`, `..`) are collapsed the
//! same way a POSIX path normalizer does: a leading `/` and a trailing `/`
//! survive, and `..` never climbs above an absolute root.

/// Canonicalize a path into remote form.
pub fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    if unified.is_empty() {
        return ".".to_string();
    }

    let absolute = unified.starts_with('/');
    let trailing = unified.ends_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for seg in unified.split('/') {
        match seg {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            s => segments.push(s),
        }
    }

    let mut out = segments.join("/");
    if absolute {
        out.insert(0, '/');
    }
    if out.is_empty() {
        out.push('.');
    }
    if trailing && !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Join a remote root and a relative path, then normalize.
pub fn join(root: &str, relative: &str) -> String {
    normalize(&format!("{root}/{relative}"))
}

/// The collection containing `path` (no trailing slash; root stays `/`).
pub fn collection_of(path: &str) -> String {
    let normalized = normalize(path);
    let trimmed = normalized.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some(("", _)) => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
        None if normalized.starts_with('/') => "/".to_string(),
        None => ".".to_string(),
    }
}

/// Strip a trailing slash unless the path is the root.
pub fn trim_trailing_slash(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Final dot-extension of the last path segment, including the dot.
///
/// Dotfiles such as `.gitignore` have no extension.
pub fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_windows_separators() {
        assert_eq!(normalize("a\\b\\test.xml"), "a/b/test.xml");
        assert_eq!(normalize("/tmp\\sub\\"), "/tmp/sub/");
    }

    #[test]
    fn test_normalize_collapses_segments() {
        assert_eq!(normalize("/tmp//a/./b/../test.xml"), "/tmp/a/test.xml");
        assert_eq!(normalize("/../tmp"), "/tmp");
        assert_eq!(normalize("../a"), "../a");
        assert_eq!(normalize(""), ".");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn test_join_with_trailing_slash_target() {
        assert_eq!(join("/tmp", "a/b/test.xml"), "/tmp/a/b/test.xml");
        assert_eq!(join("/tmp/", "a/b/test.xml"), "/tmp/a/b/test.xml");
        assert_eq!(join("", "test.xml"), "/test.xml");
    }

    #[test]
    fn test_collection_of() {
        assert_eq!(collection_of("/tmp/a/b/test.xml"), "/tmp/a/b");
        assert_eq!(collection_of("/tmp/sub/"), "/tmp");
        assert_eq!(collection_of("/test.xml"), "/");
        assert_eq!(collection_of("test.xml"), ".");
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("a/b/index.html"), Some(".html"));
        assert_eq!(extension("test.json.xql"), Some(".xql"));
        assert_eq!(extension("dir.d/Makefile"), None);
        assert_eq!(extension(".gitignore"), None);
    }

    #[test]
    fn test_trim_trailing_slash() {
        assert_eq!(trim_trailing_slash("/tmp/sub/"), "/tmp/sub");
        assert_eq!(trim_trailing_slash("/"), "/");
    }
}

#[cfg(test)]
mod proptest_suite {
    use super::*;
    use proptest::prelude::*;

    fn arb_path() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof!["[a-z]{1,6}", Just(".".to_string()), Just("..".to_string()), Just(String::new())],
            0..8,
        )
        .prop_flat_map(|segs| {
            (Just(segs), any::<bool>(), any::<bool>()).prop_map(|(segs, lead, win)| {
                let sep = if win { "\\" } else { "/" };
                let body = segs.join(sep);
                if lead {
                    format!("{sep}{body}")
                } else {
                    body
                }
            })
        })
    }

    proptest! {
        #[test]
        fn normalize_idempotent(p in arb_path()) {
            let once = normalize(&p);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalize_uses_forward_slashes(p in arb_path()) {
            let out = normalize(&p);
            prop_assert!(!out.contains('\\'));
            prop_assert!(!out.contains("//"));
        }

        #[test]
        fn absolute_stays_absolute(p in arb_path()) {
            let abs = format!("/{p}");
            prop_assert!(normalize(&abs).starts_with('/'));
        }
    }
}
