//! Packing a world directory into a temporary zip

use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};

use savesync_core::domain::sanitize_folder_name;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::ArchiveError;

/// A zip written by [`pack_dir`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArchive {
    /// Temporary zip owned by the caller
    pub path: PathBuf,
    pub file_count: usize,
    /// Uncompressed bytes read from the source tree
    pub source_bytes: u64,
}

/// Returns true if `file_name` matches one of `exclude`, ignoring case
pub fn is_excluded(file_name: &str, exclude: &[String]) -> bool {
    exclude
        .iter()
        .any(|pattern| pattern.eq_ignore_ascii_case(file_name))
}

/// Zip entry name of `path` relative to `root`, always `/`-separated
fn entry_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Zips every regular file under `source_dir` into a new file in `scratch_dir`
///
/// The file is named `savesync-<name>-XXXX.zip`. Entries are deflated and
/// written in sorted walk order. If anything fails the partial file is
/// removed before the error is returned.
pub fn pack_dir(
    source_dir: &Path,
    scratch_dir: &Path,
    name_hint: &str,
    exclude: &[String],
) -> Result<PackedArchive, ArchiveError> {
    if !source_dir.is_dir() {
        return Err(ArchiveError::SourceMissing(source_dir.to_path_buf()));
    }
    std::fs::create_dir_all(scratch_dir)?;

    let prefix = format!("savesync-{}-", sanitize_folder_name(name_hint));
    // Deleted on drop until kept below
    let tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".zip")
        .tempfile_in(scratch_dir)?;

    let mut writer = ZipWriter::new(tmp);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut file_count = 0usize;
    let mut source_bytes = 0u64;

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if is_excluded(&file_name, exclude) {
            debug!(path = %entry.path().display(), "Skipping excluded file");
            continue;
        }
        let Some(name) = entry_name(source_dir, entry.path()) else {
            continue;
        };

        let mut source = File::open(entry.path())?;
        writer.start_file(name, options)?;
        source_bytes += io::copy(&mut source, &mut writer)?;
        file_count += 1;
    }

    let tmp = writer.finish()?;
    let path = tmp.into_temp_path().keep().map_err(io::Error::from)?;

    debug!(
        source = %source_dir.display(),
        zip = %path.display(),
        files = file_count,
        bytes = source_bytes,
        "Packed world"
    );

    Ok(PackedArchive {
        path,
        file_count,
        source_bytes,
    })
}
