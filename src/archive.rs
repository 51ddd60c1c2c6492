//! Zip a local directory before uploading it as a single file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{DriveError, Result};

/// Archive name for `dir`: `<dir name>.zip` by default, `.zip` appended to
/// custom names that lack it.
pub fn zip_name_for(dir: &Path, custom: Option<&str>) -> Result<String> {
    match custom.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) if name.ends_with(".zip") => Ok(name.to_string()),
        Some(name) => Ok(format!("{}.zip", name)),
        None => {
            let base = dir
                .canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .or_else(|| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
                .ok_or_else(|| {
                    DriveError::InvalidArgument(format!("Cannot derive a zip name from {}", dir.display()))
                })?;
            Ok(format!("{}.zip", base))
        }
    }
}

/// Every regular file under `dir`, recursively, sorted.
fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*", Pattern::escape(&dir.to_string_lossy()));
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Deflate every file under `dir` into a new archive at `dest`.
///
/// Entry names are relative to `dir` and use forward slashes. Returns the
/// archived entry names.
pub fn zip_directory(dir: &Path, dest: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(DriveError::InvalidArgument(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let files = collect_files(dir)?;
    let mut writer = ZipWriter::new(BufWriter::new(File::create(dest)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let dest_abs = dest.canonicalize().ok();

    let mut entries = Vec::with_capacity(files.len());
    for path in files {
        if dest_abs.is_some() && path.canonicalize().ok() == dest_abs {
            continue;
        }
        let relative = path.strip_prefix(dir).unwrap_or(&path);
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        writer.start_file(name.as_str(), options)?;
        let mut source = File::open(&path)?;
        io::copy(&mut source, &mut writer)?;
        debug!(entry = %name, "added to archive");
        entries.push(name);
    }

    writer.finish()?.flush()?;
    Ok(entries)
}
