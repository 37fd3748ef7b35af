//! Preparing a function root for init.

use std::io::ErrorKind;
use std::path::Path;

use fnkit_core::paths::{run_data_dir, RUN_DATA_DIR};

use crate::error::{io_err, ClientError};

pub const GITIGNORE_FILE: &str = ".gitignore";
pub const FUNCIGNORE_FILE: &str = ".funcignore";

const GITIGNORE_BLOCK: &str = "
# Functions use the .func directory for local runtime data which should
# generally not be tracked in source control. To instruct the system to track
# .func in source control, comment the following line (prefix it with '# ').
/.func
";

const FUNCIGNORE_CONTENT: &str = "
# Use the .funcignore file to exclude files which should not be
# tracked in the image build. To instruct the system not to track
# files in the image build, add the regex pattern or file information
# to this file.
";

/// Fail when `root` holds anything init could clobber.
///
/// Hidden entries are allowed so an init into a fresh git checkout works.
pub fn assert_empty_root(root: &Path) -> Result<(), ClientError> {
    let mut contentious = Vec::new();
    for entry in std::fs::read_dir(root).map_err(|e| io_err(root, e))? {
        let entry = entry.map_err(|e| io_err(root, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            contentious.push(name);
        }
    }
    if contentious.is_empty() {
        return Ok(());
    }
    contentious.sort();
    Err(ClientError::Contentious {
        path: root.to_path_buf(),
        files: contentious,
    })
}

/// Create `.func` and make sure git ignores it.
///
/// A `/.func` line the user commented out (`# /.func` or `#/.func`) is left
/// alone: they asked for runtime data to be tracked.
pub fn ensure_run_data_dir(root: &Path) -> Result<(), ClientError> {
    let dir = run_data_dir(root);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let path = root.join(GITIGNORE_FILE);
    let existing = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
        Err(err) => return Err(io_err(&path, err)),
    };
    let directive = format!("/{RUN_DATA_DIR}");
    let mentioned = existing.lines().map(str::trim).any(|line| {
        line == directive || line.strip_prefix('#').map(str::trim) == Some(directive.as_str())
    });
    if mentioned {
        return Ok(());
    }

    let mut contents = existing;
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(GITIGNORE_BLOCK);
    std::fs::write(&path, contents).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// Write a starter `.funcignore` unless one exists.
pub fn ensure_funcignore(root: &Path) -> Result<(), ClientError> {
    let path = root.join(FUNCIGNORE_FILE);
    if path.exists() {
        return Ok(());
    }
    std::fs::write(&path, FUNCIGNORE_CONTENT).map_err(|e| io_err(&path, e))
}
