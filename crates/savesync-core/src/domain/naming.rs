//! Filesystem naming rules for world directories

use std::path::{Path, PathBuf};

/// Fallback directory name when sanitizing leaves nothing usable
const FALLBACK_NAME: &str = "world";

fn is_reserved(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

/// Trims `name` and replaces every run of reserved characters with `_`
pub fn sanitize_folder_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.trim().chars() {
        if is_reserved(c) || c.is_control() {
            if !in_run {
                out.push('_');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }

    // "." and ".." would resolve outside the parent directory
    if out.is_empty() || out == "." || out == ".." {
        FALLBACK_NAME.to_string()
    } else {
        out
    }
}

/// Returns `parent/base`, or `parent/base-1`, `parent/base-2`, ... if taken
pub fn unique_child_dir(parent: &Path, base: &str) -> PathBuf {
    let first = parent.join(base);
    if !first.exists() {
        return first;
    }
    let mut n: u32 = 1;
    loop {
        let candidate = parent.join(format!("{}-{}", base, n));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Case-insensitive match of a remote name against a candidate world name
///
/// The candidate matches on its raw form or its sanitized form.
pub fn names_collide(existing: &str, candidate: &str) -> bool {
    let existing = existing.trim().to_lowercase();
    existing == candidate.trim().to_lowercase()
        || existing == sanitize_folder_name(candidate).to_lowercase()
}
