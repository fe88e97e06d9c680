//! Zip a model folder for transfer

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Files at or above this size need zip64 headers
const ZIP64_THRESHOLD: u64 = 0xFFFF_FFFF;

/// Errors raised while building an archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The folder to archive does not exist
    #[error("Folder not found: {}", .0.display())]
    MissingFolder(PathBuf),

    /// Reading the folder or writing the archive failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The zip writer rejected an entry
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// What went into the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Number of files stored
    pub files: usize,
    /// Uncompressed bytes stored
    pub bytes: u64,
}

/// Default archive name for `folder`: its last component plus `.zip`
pub fn default_output(folder: &Path) -> PathBuf {
    let name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    PathBuf::from(format!("{}.zip", name))
}

/// Write every file under `folder` into a deflate-compressed zip at `output`
///
/// Entries are named `<folder name>/<relative path>`, so extracting the
/// archive recreates the folder. An `output` inside `folder` is skipped.
pub fn zip_folder(folder: &Path, output: &Path) -> Result<ArchiveSummary, ArchiveError> {
    if !folder.is_dir() {
        return Err(ArchiveError::MissingFolder(folder.to_path_buf()));
    }

    let root = folder.canonicalize()?;
    let prefix = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut writer = ZipWriter::new(File::create(output)?);
    let output = output.canonicalize()?;
    let mut summary = ArchiveSummary { files: 0, bytes: 0 };

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() || entry.path() == output {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(&root)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut name = prefix.clone();
        for component in relative.components() {
            if !name.is_empty() {
                name.push('/');
            }
            name.push_str(&component.as_os_str().to_string_lossy());
        }

        let size = entry.metadata().map_err(io::Error::from)?.len();
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(size >= ZIP64_THRESHOLD);

        debug!("Adding {} ({} bytes)", name, size);
        writer.start_file(name, options)?;
        io::copy(&mut File::open(entry.path())?, &mut writer)?;

        summary.files += 1;
        summary.bytes += size;
    }

    writer.finish()?;
    info!(
        "Archived {} files ({} bytes) into {}",
        summary.files,
        summary.bytes,
        output.display()
    );
    Ok(summary)
}
