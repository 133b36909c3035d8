use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Zips the contents of `source_dir` into `archive`, replacing any prior archive.
///
/// Entries are relative to `source_dir`, sorted by path, and carry a fixed
/// timestamp, so identical trees produce identical archives. The archive is
/// written next to its destination and renamed into place when complete.
///
/// Returns the number of files written.
pub fn write_archive(source_dir: &Path, archive: &Path) -> Result<usize, ArchiveError> {
    if let Some(parent) = archive.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ArchiveError::Create {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let partial = partial_path(archive);
    let file = File::create(&partial).map_err(|e| ArchiveError::Create {
        path: partial.clone(),
        source: e,
    })?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let base = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut count = 0;
    for entry in WalkDir::new(source_dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ArchiveError::Walk { source: e })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry_name(source_dir, path)?;
        let options = match unix_mode(&entry) {
            Some(mode) => base.unix_permissions(mode),
            None => base,
        };

        zip.start_file(name, options)
            .map_err(|e| ArchiveError::Zip {
                path: archive.to_path_buf(),
                source: e,
            })?;
        let mut input = File::open(path).map_err(|e| ArchiveError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::io::copy(&mut input, &mut zip).map_err(|e| ArchiveError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        count += 1;
    }

    let mut writer = zip.finish().map_err(|e| ArchiveError::Zip {
        path: archive.to_path_buf(),
        source: e,
    })?;
    writer.flush().map_err(|e| ArchiveError::Create {
        path: partial.clone(),
        source: e,
    })?;
    drop(writer);

    if archive.exists() {
        std::fs::remove_file(archive).map_err(|e| ArchiveError::Replace {
            path: archive.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::rename(&partial, archive).map_err(|e| ArchiveError::Replace {
        path: archive.to_path_buf(),
        source: e,
    })?;

    tracing::debug!(archive = %archive.display(), files = count, "archive written");
    Ok(count)
}

/// `a/b/c.py` with forward slashes on every platform.
fn entry_name(source_dir: &Path, path: &Path) -> Result<String, ArchiveError> {
    let relative = path
        .strip_prefix(source_dir)
        .map_err(|_| ArchiveError::InvalidPath(path.to_path_buf()))?;
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ArchiveError::InvalidPath(path.to_path_buf()))?;
    Ok(parts.join("/"))
}

fn partial_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

#[cfg(unix)]
fn unix_mode(entry: &walkdir::DirEntry) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    entry
        .metadata()
        // arch-lint: allow(no-silent-result-drop) reason="entries without readable metadata get the zip default mode"
        .ok()
        .map(|m| m.permissions().mode())
}

#[cfg(not(unix))]
fn unix_mode(_entry: &walkdir::DirEntry) -> Option<u32> {
    None
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to create {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to walk build directory")]
    Walk { source: walkdir::Error },
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write archive {path}")]
    Zip {
        path: PathBuf,
        source: zip::result::ZipError,
    },
    #[error("failed to replace archive at {path}")]
    Replace {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("path cannot be stored in an archive: {0}")]
    InvalidPath(PathBuf),
}
