//! Version string handling.
//!
//! Versions are compared per dot-separated component, numerically where both
//! sides are numeric, so `0.1.10` sorts after `0.1.9`.

use std::cmp::Ordering;
use std::path::{Component, Path};

use crate::error::{InstallError, Result};

/// Strip an optional leading `v` (e.g. "v0.1.5" -> "0.1.5").
pub fn normalize_version(version: &str) -> &str {
    let trimmed = version.trim();
    trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed)
}

/// Normalize `version` and require it to be usable as one directory name.
///
/// Rejects empty strings, `.`, `..` and anything containing a path separator.
pub fn validate_version(version: &str) -> Result<&str> {
    let normalized = normalize_version(version);
    let mut components = Path::new(normalized).components();
    let single_name = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if single_name && !normalized.contains(['/', '\\']) {
        Ok(normalized)
    } else {
        Err(InstallError::InvalidVersion {
            version: version.to_string(),
        })
    }
}

/// Compare two version strings component by component.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = normalize_version(a).split('.');
    let mut right = normalize_version(b).split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
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
