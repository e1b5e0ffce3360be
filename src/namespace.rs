//! Folder-style view over a flat key namespace.
//!
//! Object stores hold a flat `key -> bytes` map. Browsing treats `/` as a
//! path separator: for a queried prefix, every key either sits directly
//! under it (a file) or below one of its immediate child folders.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Hierarchy separator used for every prefix operation.
pub const DELIMITER: char = '/';

/// Two-tier view of the keys under one prefix.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Projection {
    /// Immediate child folders, each ending in `/`. Iterates sorted.
    pub folders: BTreeSet<String>,

    /// Keys sitting directly under the prefix, in listing order.
    pub files: Vec<String>,
}

impl Projection {
    /// Fold folder groupings reported by the store into the view.
    ///
    /// Returns how many of them the key projection had not already found.
    pub fn merge_common_prefixes<I>(&mut self, prefixes: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        prefixes
            .into_iter()
            .filter(|prefix| self.folders.insert(prefix.clone()))
            .count()
    }
}

/// Partition `keys` into child folders and direct files of `query_prefix`.
///
/// The key equal to `query_prefix` is its own directory marker and is
/// dropped. Keys that do not start with `query_prefix` cannot come back
/// from a prefix-filtered listing; if one does it is left out of the
/// view and logged.
pub fn project<'a, I>(keys: I, query_prefix: &str) -> Projection
where
    I: IntoIterator<Item = &'a str>,
{
    let mut projection = Projection::default();

    for key in keys {
        if key == query_prefix {
            continue;
        }
        let Some(relative) = key.strip_prefix(query_prefix) else {
            warn!(key, prefix = query_prefix, "listing returned key outside prefix");
            continue;
        };

        match child_folder(query_prefix, relative) {
            Some(folder) => {
                projection.folders.insert(folder);
            }
            None if !key.ends_with(DELIMITER) => projection.files.push(key.to_string()),
            None => {}
        }
    }

    projection
}

/// Compute the immediate child folder of `prefix` containing `key`.
///
/// Returns `None` when `key` is not under `prefix` or sits directly in it.
pub fn common_prefix(key: &str, prefix: &str) -> Option<String> {
    key.strip_prefix(prefix)
        .and_then(|relative| child_folder(prefix, relative))
}

fn child_folder(prefix: &str, relative: &str) -> Option<String> {
    relative
        .find(DELIMITER)
        .map(|pos| format!("{}{}", prefix, &relative[..=pos]))
}

/// Prefix of the folder one level up; the bucket root is its own parent.
pub fn parent_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches(DELIMITER);
    match trimmed.rfind(DELIMITER) {
        Some(pos) => trimmed[..=pos].to_string(),
        None => String::new(),
    }
}

/// Navigation trail for `prefix` as `(label, prefix up to here)` pairs.
pub fn breadcrumbs(prefix: &str) -> Vec<(String, String)> {
    let mut trail = Vec::new();
    let mut walked = String::new();
    for part in prefix.split(DELIMITER).filter(|part| !part.is_empty()) {
        walked.push_str(part);
        walked.push(DELIMITER);
        trail.push((part.to_string(), walked.clone()));
    }
    trail
}

/// Last path component of an object key.
pub fn file_name(key: &str) -> &str {
    match key.rsplit(DELIMITER).next() {
        Some(name) if !name.is_empty() => name,
        _ => key,
    }
}
