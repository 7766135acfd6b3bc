//! Filesystem operations
//!
//! Handles file and directory operations, including tree copies and
//! write-then-replace persistence.

use std::io::Write;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{FilesystemError, PersistError};

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove a directory and all its contents
pub fn remove_dir_all(path: &Path) -> Result<(), FilesystemError> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| FilesystemError::RemoveDir {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// Write content to a file
pub fn write_file(path: &Path, content: &str) -> Result<(), FilesystemError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    std::fs::write(path, content).map_err(|e| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Read content from a file
pub fn read_file(path: &Path) -> Result<String, FilesystemError> {
    std::fs::read_to_string(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Copy a single file, creating the destination's parent directories
pub fn copy_file(from: &Path, to: &Path) -> Result<u64, FilesystemError> {
    if let Some(parent) = to.parent() {
        create_dir_all(parent)?;
    }
    std::fs::copy(from, to).map_err(|e| FilesystemError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        error: e.to_string(),
    })
}

/// Copy a directory tree verbatim.
///
/// Returns the number of files copied.
pub fn copy_tree(from: &Path, to: &Path) -> Result<usize, FilesystemError> {
    let copy_err = |error: String| FilesystemError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        error,
    };

    let mut copied = 0;
    for entry in WalkDir::new(from).follow_links(true) {
        let entry = entry.map_err(|e| copy_err(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| copy_err(e.to_string()))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            create_dir_all(&target)?;
        } else {
            copy_file(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Atomically replace `path` with `content`
pub fn write_atomic(path: &Path, content: &str) -> Result<(), PersistError> {
    write_atomic_with(path, |file| file.write_all(content.as_bytes()))
}

/// Atomically replace `to` with a copy of `from`
pub fn copy_file_atomic(from: &Path, to: &Path) -> Result<(), PersistError> {
    let mut source = std::fs::File::open(from).map_err(|e| PersistError::Write {
        path: to.to_path_buf(),
        error: format!("cannot open '{}': {e}", from.display()),
    })?;
    write_atomic_with(to, |file| std::io::copy(&mut source, file).map(|_| ()))
}

/// Atomically replace `path` with whatever `write` produces.
///
/// The data goes to a temporary file in the same directory, is flushed to
/// disk, and only then renamed over `path`. If `write` fails, the temporary
/// file is discarded and `path` keeps its previous content.
pub fn write_atomic_with<F>(path: &Path, write: F) -> Result<(), PersistError>
where
    F: FnOnce(&mut std::fs::File) -> std::io::Result<()>,
{
    let write_err = |error: String| PersistError::Write {
        path: path.to_path_buf(),
        error,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".gamestack-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| write_err(e.to_string()))?;

    write(temp.as_file_mut()).map_err(|e| write_err(e.to_string()))?;
    temp.as_file_mut()
        .sync_all()
        .map_err(|e| write_err(e.to_string()))?;

    temp.persist(path).map_err(|e| PersistError::Replace {
        path: path.to_path_buf(),
        error: e.error.to_string(),
    })?;
    Ok(())
}
