//! Common-root detection and zip-slip safe extraction
//!
//! Archives produced by other tools often wrap the world in a single top
//! folder (`World/level.dat`). [`detect_common_root`] finds that folder so
//! [`extract`] can strip it. Every entry is resolved and checked against the
//! destination before the first file is written.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::ArchiveError;

fn open(zip_path: &Path) -> Result<ZipArchive<BufReader<File>>, ArchiveError> {
    let file = File::open(zip_path)?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

/// Entry name with `\` treated as a separator
fn normalized_name(raw: &str) -> String {
    raw.replace('\\', "/")
}

/// First path segment shared by all names
///
/// Returns `None` if the names disagree, if any name has no directory
/// segment, or if there are no non-empty names.
pub fn common_root<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut root: Option<&str> = None;
    for name in names {
        let name = name.trim_start_matches('/');
        if name.is_empty() {
            continue;
        }
        let (first, _) = name.split_once('/')?;
        if first.is_empty() {
            return None;
        }
        match root {
            None => root = Some(first),
            Some(existing) if existing == first => {}
            Some(_) => return None,
        }
    }
    root.map(str::to_string)
}

/// Resolves `relative` under `dest` lexically
///
/// Returns `None` if the path climbs above `dest`. `.` and empty segments
/// are dropped.
pub fn resolve_inside(dest: &Path, relative: &str) -> Option<PathBuf> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            // drive prefixes such as `C:` would replace the base on Windows
            s if s.contains(':') => return None,
            s => parts.push(s),
        }
    }
    let mut path = dest.to_path_buf();
    path.extend(parts);
    Some(path)
}

/// Reads the zip directory and returns its common root, if any
pub fn detect_common_root(zip_path: &Path) -> Result<Option<String>, ArchiveError> {
    let archive = open(zip_path)?;
    let names: Vec<String> = archive.file_names().map(normalized_name).collect();
    let root = common_root(names.iter().map(String::as_str));
    debug!(zip = %zip_path.display(), root = ?root, entries = names.len(), "Detected archive root");
    Ok(root)
}

/// Name of an entry after stripping `root/`
fn strip_root<'a>(name: &'a str, root: Option<&str>) -> &'a str {
    let name = name.trim_start_matches('/');
    match root {
        Some(root) => match name.strip_prefix(root) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => name,
        },
        None => name,
    }
}

/// Extracts `zip_path` into `dest_dir`, stripping `root/` when given
///
/// Directory entries are skipped; parents are created as needed and existing
/// files are overwritten. Returns the number of files written.
///
/// # Errors
/// [`ArchiveError::UnsafeEntry`] if any entry resolves outside `dest_dir`.
/// Nothing is written in that case.
pub fn extract(zip_path: &Path, root: Option<&str>, dest_dir: &Path) -> Result<usize, ArchiveError> {
    let mut archive = open(zip_path)?;

    let mut plan: Vec<(usize, PathBuf)> = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = normalized_name(entry.name());
        let stripped = strip_root(&name, root);
        if stripped.trim_matches('/').is_empty() {
            continue;
        }
        match resolve_inside(dest_dir, stripped) {
            Some(target) if target != dest_dir => plan.push((index, target)),
            Some(_) => continue,
            None => {
                warn!(entry = %name, dest = %dest_dir.display(), "Rejected archive entry outside destination");
                return Err(ArchiveError::UnsafeEntry(name));
            }
        }
    }

    for (index, target) in &plan {
        let mut entry = archive.by_index(*index)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(target)?;
        io::copy(&mut entry, &mut out)?;
    }

    debug!(zip = %zip_path.display(), dest = %dest_dir.display(), files = plan.len(), "Extracted archive");
    Ok(plan.len())
}
