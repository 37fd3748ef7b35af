//! Materializing a runnable copy of a function's source for a job.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use fnkit_core::paths::RUN_DATA_DIR;
use fnkit_core::CollaboratorError;

const SKIPPED_DIRS: &[&str] = &[RUN_DATA_DIR, ".git", ".hg", ".svn"];

/// Writes a self-contained, runnable project for the function at `root`
/// into `dest`.
#[async_trait]
pub trait Scaffolding: Send + Sync {
    async fn write(
        &self,
        dest: &Path,
        root: &Path,
        runtime: &str,
        invoke: &str,
    ) -> Result<(), CollaboratorError>;
}

/// Copies the function's source tree verbatim, skipping runtime data and
/// VCS directories.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceScaffolding;

#[async_trait]
impl Scaffolding for SourceScaffolding {
    async fn write(
        &self,
        dest: &Path,
        root: &Path,
        runtime: &str,
        _invoke: &str,
    ) -> Result<(), CollaboratorError> {
        let dest = dest.to_path_buf();
        let root = root.to_path_buf();
        tracing::debug!(runtime, src = %root.display(), dest = %dest.display(), "scaffolding job");
        tokio::task::spawn_blocking(move || copy_tree(&root, &dest))
            .await
            .map_err(|err| CollaboratorError::other(format!("scaffold task join error: {err}")))?
            .map_err(|err| CollaboratorError::Other(Box::new(err)))
    }
}

fn copy_tree(src: &Path, dest: &Path) -> std::io::Result<()> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(src.to_path_buf(), dest.to_path_buf())];
    while let Some((from, to)) = pending.pop() {
        std::fs::create_dir_all(&to)?;
        for entry in std::fs::read_dir(&from)? {
            let entry = entry?;
            let ty = entry.file_type()?;
            let name = entry.file_name();
            if ty.is_dir() {
                if SKIPPED_DIRS.iter().any(|d| name == *d) {
                    continue;
                }
                pending.push((entry.path(), to.join(&name)));
            } else if ty.is_file() {
                std::fs::copy(entry.path(), to.join(&name))?;
            } else if ty.is_symlink() {
                let target = std::fs::read_link(entry.path())?;
                link(&target, &to.join(&name))?;
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn link(target: &Path, at: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, at)
}

#[cfg(not(unix))]
fn link(target: &Path, at: &Path) -> std::io::Result<()> {
    std::fs::copy(target, at).map(|_| ())
}
