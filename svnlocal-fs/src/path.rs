//! In-repository path helpers
//!
//! Absolute repository paths are canonical: they start with `/`, never end
//! with one (except the root itself) and contain no empty or `.` segments.
//! Relative paths, as used by editors and reports, are the same without
//! the leading slash; the empty string names the anchor itself.

/// Canonicalize an absolute repository path
pub fn canonicalize(path: &str) -> String {
    let mut out = String::from("/");
    for part in components(path) {
        if out.len() > 1 {
            out.push('/');
        }
        out.push_str(part);
    }
    out
}

/// Canonicalize a relative path (no leading slash, "" for the anchor)
pub fn canonicalize_relative(path: &str) -> String {
    components(path).collect::<Vec<_>>().join("/")
}

/// Iterate over the non-empty segments of a path
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|p| !p.is_empty() && *p != ".")
}

/// Join an absolute base with a relative path
pub fn join(base: &str, relative: &str) -> String {
    let base = canonicalize(base);
    let relative = canonicalize_relative(relative);
    if relative.is_empty() {
        base
    } else if base == "/" {
        format!("/{}", relative)
    } else {
        format!("{}/{}", base, relative)
    }
}

/// Join two relative paths
pub fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        parent.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Last segment of a path ("" for the root)
pub fn basename(path: &str) -> &str {
    components(path).last().unwrap_or("")
}

/// Parent of an absolute path; the root is its own parent
pub fn dirname(path: &str) -> String {
    let path = canonicalize(path);
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Parent of a relative path ("" for top-level entries)
pub fn dirname_relative(path: &str) -> String {
    let path = canonicalize_relative(path);
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

/// Whether `path` equals `ancestor` or lies below it (both canonical, same flavour)
pub fn is_ancestor(ancestor: &str, path: &str) -> bool {
    if ancestor.is_empty() || ancestor == "/" {
        return true;
    }
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

/// Path of `path` relative to `ancestor`, if it lies at or below it
pub fn relative_to<'a>(ancestor: &str, path: &'a str) -> Option<&'a str> {
    if !is_ancestor(ancestor, path) {
        return None;
    }
    let rest = if ancestor == "/" || ancestor.is_empty() {
        path
    } else {
        &path[ancestor.len()..]
    };
    Some(rest.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize(""), "/");
        assert_eq!(canonicalize("/"), "/");
        assert_eq!(canonicalize("a//b/./c/"), "/a/b/c");
        assert_eq!(canonicalize_relative("/a/b/"), "a/b");
        assert_eq!(canonicalize_relative(""), "");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", ""), "/");
        assert_eq!(join("/", "a.txt"), "/a.txt");
        assert_eq!(join("/trunk", ""), "/trunk");
        assert_eq!(join("/trunk", "src/lib.rs"), "/trunk/src/lib.rs");
        assert_eq!(join_relative("", "a"), "a");
        assert_eq!(join_relative("a", "b"), "a/b");
    }

    #[test]
    fn test_basename_dirname() {
        assert_eq!(basename("/trunk/a.txt"), "a.txt");
        assert_eq!(basename("/"), "");
        assert_eq!(dirname("/trunk/a.txt"), "/trunk");
        assert_eq!(dirname("/a.txt"), "/");
        assert_eq!(dirname("/"), "/");
        assert_eq!(dirname_relative("a/b"), "a");
        assert_eq!(dirname_relative("a"), "");
    }

    #[test]
    fn test_ancestry() {
        assert!(is_ancestor("/", "/anything"));
        assert!(is_ancestor("/trunk", "/trunk"));
        assert!(is_ancestor("/trunk", "/trunk/a"));
        assert!(!is_ancestor("/trunk", "/trunkish"));
        assert!(is_ancestor("", "a/b"));
        assert_eq!(relative_to("/trunk", "/trunk/a/b"), Some("a/b"));
        assert_eq!(relative_to("/", "/a"), Some("a"));
        assert_eq!(relative_to("/trunk", "/trunk"), Some(""));
        assert_eq!(relative_to("/trunk", "/branches"), None);
    }
}
