// crates/endpoints-deploy/src/workspace.rs
// ============================================================================
// Module: Working Copy
// Description: Isolated temporary clone of the application source tree.
// Purpose: Keep templating and deployment away from checked-in files.
// Dependencies: std, tempfile, thiserror
// ============================================================================

//! ## Overview
//! [`WorkingCopy::clone_from`] recursively copies a source directory into a
//! fresh temporary directory. The directory is removed when the working copy
//! is dropped. Symlinks are skipped; build output (`target/`) and VCS metadata
//! (`.git/`) are never copied.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use tempfile::TempDir;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Directory names excluded from the clone.
const SKIPPED_DIRS: &[&str] = &["target", ".git"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Working copy failures.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Source directory does not exist or is not a directory.
    #[error("source directory {0} is not a directory")]
    MissingSource(PathBuf),
    /// Temporary directory creation failed.
    #[error("failed to create temporary directory: {0}")]
    TempDir(io::Error),
    /// Copying an entry failed.
    #[error("failed to copy {path}: {source}")]
    Copy {
        /// Entry being copied.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

// ============================================================================
// SECTION: Working Copy
// ============================================================================

/// Temporary clone of an application directory.
#[derive(Debug)]
pub struct WorkingCopy {
    /// Owned temporary directory; deleted on drop.
    dir: TempDir,
}

impl WorkingCopy {
    /// Clones `source` into a new temporary directory.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when the source is missing or any entry
    /// fails to copy.
    pub fn clone_from(source: &Path) -> Result<Self, WorkspaceError> {
        if !source.is_dir() {
            return Err(WorkspaceError::MissingSource(source.to_path_buf()));
        }
        let dir = tempfile::Builder::new()
            .prefix("endpoints-deploy-")
            .tempdir()
            .map_err(WorkspaceError::TempDir)?;
        copy_dir(source, dir.path())?;
        Ok(Self {
            dir,
        })
    }

    /// Returns the working copy root.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Recursively copies regular files and directories from `from` into `to`.
fn copy_dir(from: &Path, to: &Path) -> Result<(), WorkspaceError> {
    let entries = fs::read_dir(from).map_err(|source| WorkspaceError::Copy {
        path: from.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| WorkspaceError::Copy {
            path: from.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| WorkspaceError::Copy {
            path: path.clone(),
            source,
        })?;
        let target = to.join(entry.file_name());
        if file_type.is_dir() {
            if SKIPPED_DIRS.iter().any(|skipped| entry.file_name() == *skipped) {
                continue;
            }
            fs::create_dir(&target).map_err(|source| WorkspaceError::Copy {
                path: path.clone(),
                source,
            })?;
            copy_dir(&path, &target)?;
        } else if file_type.is_file() {
            fs::copy(&path, &target).map_err(|source| WorkspaceError::Copy {
                path: path.clone(),
                source,
            })?;
        }
    }
    Ok(())
}
