use std::path::{Path, PathBuf};

/// Manifest file name at a function's root.
pub const FUNCTION_FILE: &str = "func.yaml";

/// Runtime-data directory; excluded from fingerprints and source control.
pub const RUN_DATA_DIR: &str = ".func";

pub const BUILT_IMAGE_FILE: &str = "built-image";
pub const IMAGE_DIGEST_FILE: &str = "image-digest";
pub const DEPLOYED_IMAGE_FILE: &str = "deployed-image";
pub const DEPLOYED_NAMESPACE_FILE: &str = "deployed-namespace";
pub const RUNS_DIR: &str = "runs";

pub const DEFAULT_REGISTRY: &str = "index.docker.io";
pub const DEFAULT_TEMPLATE: &str = "http";
pub const DEFAULT_INVOKE: &str = "http";

/// Manifest schema version written by `Init`.
pub const LAST_SPEC_VERSION: &str = "1.0.0";

pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(FUNCTION_FILE)
}

pub fn run_data_dir(root: &Path) -> PathBuf {
    root.join(RUN_DATA_DIR)
}

pub fn runs_dir(root: &Path) -> PathBuf {
    run_data_dir(root).join(RUNS_DIR)
}

/// `<root>/.func/runs/<port>`
pub fn job_dir(root: &Path, port: u16) -> PathBuf {
    runs_dir(root).join(port.to_string())
}
