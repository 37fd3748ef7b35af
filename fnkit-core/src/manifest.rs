//! Function manifest persistence.
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   func.yaml              (user-authored fields)
//!   .func/
//!     built-image          (Build.Image)
//!     image-digest         (digest from the last push)
//!     deployed-image       (Deploy.Image)
//!     deployed-namespace   (Deploy.Namespace)
//! ```
//!
//! Everything under `.func/` is excluded from build fingerprints, so
//! recording build or deploy results never makes a function look stale.
//! `func.yaml` is only rewritten when its serialized content changes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, FunctionError};
use crate::function::Function;
use crate::paths::{
    manifest_path, run_data_dir, BUILT_IMAGE_FILE, DEPLOYED_IMAGE_FILE, DEPLOYED_NAMESPACE_FILE,
    IMAGE_DIGEST_FILE,
};

// ---------------------------------------------------------------------------
// 1. Load
// ---------------------------------------------------------------------------

/// Load the function rooted at `root`.
///
/// A missing `func.yaml` is not an error: the result is an uninitialized
/// function (see [`Function::initialized`]). A malformed manifest returns
/// `FunctionError::Parse` with the file path.
pub fn load(root: impl AsRef<Path>) -> Result<Function, FunctionError> {
    let root = absolute(root.as_ref())?;
    let path = manifest_path(&root);

    let mut f = match std::fs::read_to_string(&path) {
        Ok(contents) if contents.trim().is_empty() => Function::default(),
        Ok(contents) => serde_yaml::from_str::<Function>(&contents)
            .map_err(|source| FunctionError::Parse { path, source })?,
        Err(err) if err.kind() == ErrorKind::NotFound => Function::default(),
        Err(err) => return Err(io_err(&path, err)),
    };
    f.root = root;
    load_runtime_metadata(&mut f)?;
    Ok(f)
}

/// Whether `root` holds an initialized function.
pub fn has_initialized_function(root: impl AsRef<Path>) -> Result<bool, FunctionError> {
    let path = manifest_path(root.as_ref());
    if !path.exists() {
        return Ok(false);
    }
    Ok(load(root)?.initialized())
}

fn load_runtime_metadata(f: &mut Function) -> Result<(), FunctionError> {
    let dir = run_data_dir(&f.root);
    f.build.image = read_metadata(&dir.join(BUILT_IMAGE_FILE))?;
    f.image_digest = read_metadata(&dir.join(IMAGE_DIGEST_FILE))?;
    f.deploy.image = read_metadata(&dir.join(DEPLOYED_IMAGE_FILE))?;
    f.deploy.namespace = read_metadata(&dir.join(DEPLOYED_NAMESPACE_FILE))?;
    Ok(())
}

fn read_metadata(path: &Path) -> Result<String, FunctionError> {
    match std::fs::read_to_string(path) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

// ---------------------------------------------------------------------------
// 2. Write (atomic)
// ---------------------------------------------------------------------------

impl Function {
    /// Load the function rooted at `root`; see [`load`].
    pub fn load(root: impl AsRef<Path>) -> Result<Function, FunctionError> {
        load(root)
    }

    /// Validate and persist the function.
    ///
    /// Write flow for each file: serialize → `.tmp` sibling → `rename`,
    /// skipped when the on-disk content already matches.
    pub fn write(&self) -> Result<(), FunctionError> {
        self.validate()?;

        let yaml = serde_yaml::to_string(self)?;
        write_if_changed(&manifest_path(&self.root), &yaml)?;

        let dir = run_data_dir(&self.root);
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        write_metadata(&dir.join(BUILT_IMAGE_FILE), &self.build.image)?;
        write_metadata(&dir.join(IMAGE_DIGEST_FILE), &self.image_digest)?;
        write_metadata(&dir.join(DEPLOYED_IMAGE_FILE), &self.deploy.image)?;
        write_metadata(&dir.join(DEPLOYED_NAMESPACE_FILE), &self.deploy.namespace)?;
        Ok(())
    }
}

fn write_metadata(path: &Path, value: &str) -> Result<(), FunctionError> {
    if value.is_empty() {
        return match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_err(path, err)),
        };
    }
    write_if_changed(path, value)
}

fn write_if_changed(path: &Path, contents: &str) -> Result<(), FunctionError> {
    match std::fs::read_to_string(path) {
        Ok(existing) if existing == contents => return Ok(()),
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(path, err)),
    }
    let tmp = tmp_path(path);
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.tmp"))
}

fn absolute(root: &Path) -> Result<PathBuf, FunctionError> {
    std::path::absolute(root).map_err(|e| io_err(root, e))
}
