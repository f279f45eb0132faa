//! Project archive construction.
//!
//! Packs a job directory (or a single file) into the zip layout the server
//! expects: entry names relative to the source root, forward slashes, no
//! leading directory component.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// Number of files packed.
    pub files: usize,
    /// Uncompressed bytes packed.
    pub bytes: u64,
}

fn io_err(err: io::Error, path: &Path) -> Error {
    Error::internal_io(err.to_string(), Some(path.display().to_string()))
}

fn zip_err(err: zip::result::ZipError, path: &Path) -> Error {
    Error::internal_io(err.to_string(), Some(path.display().to_string()))
}

/// Build a zip archive at `dest` from `source` (a file or a directory).
/// Refuses to clobber an existing archive unless `overwrite` is set.
pub fn build_archive(source: &Path, dest: &Path, overwrite: bool) -> Result<ArchiveSummary> {
    if !source.exists() {
        return Err(Error::internal_io(
            "no such file or directory",
            Some(source.display().to_string()),
        ));
    }
    if dest.exists() && !overwrite {
        return Err(Error::validation_invalid_argument(
            "output",
            format!("'{}' already exists", dest.display()),
            None,
        )
        .with_hint("Pass --force to overwrite it"));
    }

    let file = File::create(dest).map_err(|e| io_err(e, dest))?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = 0usize;
    let mut bytes = 0u64;
    if source.is_dir() {
        pack_dir(&mut writer, options, source, "", &mut files, &mut bytes)?;
    } else {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::internal_io("unrepresentable file name", Some(source.display().to_string())))?;
        pack_file(&mut writer, options, source, name, &mut files, &mut bytes)?;
    }

    writer.finish().map_err(|e| zip_err(e, dest))?;
    Ok(ArchiveSummary {
        path: dest.to_path_buf(),
        files,
        bytes,
    })
}

fn pack_dir(
    writer: &mut ZipWriter<File>,
    options: FileOptions,
    dir: &Path,
    prefix: &str,
    files: &mut usize,
    bytes: &mut u64,
) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| io_err(e, dir))?
        .collect::<io::Result<_>>()
        .map_err(|e| io_err(e, dir))?;
    // Deterministic archive layout regardless of directory order.
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_str().ok_or_else(|| {
            Error::internal_io("unrepresentable file name", Some(path.display().to_string()))
        })?;
        let entry_name = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        };
        if path.is_dir() {
            pack_dir(writer, options, &path, &entry_name, files, bytes)?;
        } else {
            pack_file(writer, options, &path, &entry_name, files, bytes)?;
        }
    }
    Ok(())
}

fn pack_file(
    writer: &mut ZipWriter<File>,
    options: FileOptions,
    path: &Path,
    entry_name: &str,
    files: &mut usize,
    bytes: &mut u64,
) -> Result<()> {
    writer
        .start_file(entry_name, options)
        .map_err(|e| zip_err(e, path))?;
    let mut source = File::open(path).map_err(|e| io_err(e, path))?;
    let copied = io::copy(&mut source, writer).map_err(|e| io_err(e, path))?;
    writer.flush().map_err(|e| io_err(e, path))?;
    *files += 1;
    *bytes += copied;
    Ok(())
}
