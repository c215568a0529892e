//! Version patterns.
//!
//! A pattern is a dotted version where any part may be `*`. `*` alone
//! matches every version; otherwise a version matches when it has the
//! same number of parts and every non-wildcard part is equal. The highest
//! matching version wins.

use std::cmp::Ordering;

const WILDCARD: &str = "*";

/// Whether `version` matches `pattern`.
pub fn matches(pattern: &str, version: &str) -> bool {
    let pattern = collapse_wildcards(pattern);
    if pattern == WILDCARD {
        return true;
    }
    if !pattern.contains(WILDCARD) {
        return pattern == version;
    }

    let pattern_parts: Vec<&str> = pattern.split('.').collect();
    let version_parts: Vec<&str> = version.split('.').collect();
    pattern_parts.len() == version_parts.len()
        && pattern_parts
            .iter()
            .zip(&version_parts)
            .all(|(p, v)| *p == WILDCARD || p == v)
}

/// The highest version matching `pattern`.
pub fn resolve<'a, I>(pattern: &str, versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .filter(|v| matches(pattern, v))
        .max_by(|a, b| compare(a, b))
}

/// Order two versions part by part, numerically where both parts are numbers.
pub fn compare(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn collapse_wildcards(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '*' && out.ends_with('*') {
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSIONS: [&str; 5] = ["1.0.0", "1.2.0", "1.10.3", "2.0.0", "1.2"];

    #[test]
    fn test_static_pattern() {
        assert_eq!(resolve("1.2.0", VERSIONS), Some("1.2.0"));
        assert_eq!(resolve("3.0.0", VERSIONS), None);
    }

    #[test]
    fn test_latest() {
        assert_eq!(resolve("*", VERSIONS), Some("2.0.0"));
        assert_eq!(resolve("**", VERSIONS), Some("2.0.0"));
    }

    #[test]
    fn test_wildcard_parts() {
        assert_eq!(resolve("1.*.*", VERSIONS), Some("1.10.3"));
        assert_eq!(resolve("1.*", VERSIONS), Some("1.2"));
        assert_eq!(resolve("*.0.0", VERSIONS), Some("2.0.0"));
        assert_eq!(resolve("4.*.*", VERSIONS), None);
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare("1.0", "1.0.1"), Ordering::Less);
        assert_eq!(compare("1.0-beta", "1.0-alpha"), Ordering::Greater);
    }
}
