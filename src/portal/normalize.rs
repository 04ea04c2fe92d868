//! Route normalization
//!
//! A handler's base path and relative route are joined into one canonical
//! dispatch key: a single leading slash, exactly one slash between segments,
//! no trailing slash. `("/service/conf/", "/list/")` becomes
//! `/service/conf/list`.
//!
//! Paths and commands compare ASCII case-insensitively everywhere.

/// Join `base` and `route` into a canonical route key
pub fn normalize(base: &str, route: &str) -> String {
    let base = base.trim_matches('/');
    let route = route.trim_matches('/');

    let mut key = String::with_capacity(base.len() + route.len() + 2);
    for part in [base, route] {
        if !part.is_empty() {
            key.push('/');
            key.push_str(part);
        }
    }
    if key.is_empty() {
        key.push('/');
    }
    key
}

/// Reject keys that could never be addressed by a request path
pub fn validate_key(key: &str) -> Result<(), &'static str> {
    if key.contains("//") {
        return Err("empty path segment");
    }
    if key.chars().any(char::is_whitespace) {
        return Err("whitespace in path");
    }
    if key.contains(['?', '#']) {
        return Err("query or fragment in path");
    }
    Ok(())
}

/// Segment-aligned suffixes of a normalized key, longest first.
///
/// `/service/conf/list` yields `service/conf/list`, `conf/list`, `list`:
/// exactly the commands `c` for which the key ends with `"/" + c`.
pub fn segment_suffixes(key: &str) -> impl Iterator<Item = &str> {
    key.match_indices('/')
        .map(move |(idx, _)| &key[idx + 1..])
        .filter(|suffix| !suffix.is_empty())
}

/// Whether `path` addresses the shared entry path (trailing slash tolerated)
pub fn is_entry_path(path: &str, entry_path: &str) -> bool {
    path.trim_end_matches('/')
        .eq_ignore_ascii_case(entry_path.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_single_separator() {
        for base in ["service/conf", "/service/conf", "service/conf/", "/service/conf/", "//service/conf//"] {
            for route in ["list", "/list", "list/", "/list/"] {
                assert_eq!(normalize(base, route), "/service/conf/list", "{base:?} + {route:?}");
            }
        }
    }

    #[test]
    fn test_normalize_empty_parts() {
        assert_eq!(normalize("", "list"), "/list");
        assert_eq!(normalize("/echo", "/"), "/echo");
        assert_eq!(normalize("/echo", ""), "/echo");
        assert_eq!(normalize("", ""), "/");
        assert_eq!(normalize("/", "/"), "/");
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("/service/conf/list").is_ok());
        assert!(validate_key("/").is_ok());
        assert!(validate_key("/service//list").is_err());
        assert!(validate_key("/service/co nf").is_err());
        assert!(validate_key("/service/list?x=1").is_err());
    }

    #[test]
    fn test_segment_suffixes() {
        let suffixes: Vec<&str> = segment_suffixes("/service/conf/list").collect();
        assert_eq!(suffixes, vec!["service/conf/list", "conf/list", "list"]);
        assert_eq!(segment_suffixes("/").count(), 0);
        for suffix in segment_suffixes("/a/b/c") {
            assert!("/a/b/c".ends_with(&format!("/{suffix}")));
        }
    }

    #[test]
    fn test_is_entry_path() {
        assert!(is_entry_path("/portal", "/portal"));
        assert!(is_entry_path("/portal/", "/portal"));
        assert!(is_entry_path("/PORTAL", "/portal"));
        assert!(is_entry_path("/Portal/", "/portal/"));
        assert!(!is_entry_path("/portal/commands", "/portal"));
        assert!(!is_entry_path("/portals", "/portal"));
        assert!(!is_entry_path("/", "/portal"));
    }
}
