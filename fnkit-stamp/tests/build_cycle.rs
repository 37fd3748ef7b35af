use std::fs;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use filetime::{set_file_mtime, FileTime};
use fnkit_core::{paths, Function};
use fnkit_stamp::{built, check, fingerprint, stamp, StalenessSignal};
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn init_function(root: &TempDir) -> Function {
    let f = Function {
        name: "hello".into(),
        runtime: "go".into(),
        created: Some(Utc::now()),
        ..Function::new(root.path())
    };
    f.write().expect("write function");
    fs::write(root.path().join("handle.go"), "package function\n").expect("write source");
    f
}

#[test]
fn built_state_follows_the_source_tree() {
    init_logging();
    let root = TempDir::new().expect("root");
    let mut f = init_function(&root);
    assert!(!built(root.path()).expect("built"), "fresh function is not built");

    stamp(root.path(), false).expect("stamp");
    f.build.image = "example.com/alice/hello:latest".into();
    f.write().expect("record built image");
    assert!(built(root.path()).expect("built"), "recording the image must not invalidate");

    let later = FileTime::from_system_time(SystemTime::now() + Duration::from_secs(120));
    set_file_mtime(paths::manifest_path(root.path()), later).expect("touch func.yaml");
    assert!(!built(root.path()).expect("built"), "touching func.yaml invalidates");

    stamp(root.path(), false).expect("restamp");
    assert!(built(root.path()).expect("built"));
}

#[test]
fn unchanged_rewrite_keeps_stamp_current() {
    init_logging();
    let root = TempDir::new().expect("root");
    let f = init_function(&root);
    stamp(root.path(), false).expect("stamp");

    f.write().expect("rewrite identical function");
    assert_eq!(check(root.path()).expect("check"), StalenessSignal::Current);
}

#[test]
fn new_file_makes_function_stale() {
    init_logging();
    let root = TempDir::new().expect("root");
    init_function(&root);
    stamp(root.path(), false).expect("stamp");

    fs::create_dir_all(root.path().join("pkg")).expect("mkdir");
    fs::write(root.path().join("pkg/util.go"), "package pkg\n").expect("write");

    match check(root.path()).expect("check") {
        StalenessSignal::Stale { .. } => {}
        other => panic!("expected stale, got {other:?}"),
    }
}

#[test]
fn journal_matches_fingerprint_log() {
    init_logging();
    let root = TempDir::new().expect("root");
    init_function(&root);
    stamp(root.path(), true).expect("stamp");

    let journal = fs::read_to_string(root.path().join(".func/built-log")).expect("journal");
    assert_eq!(journal, fingerprint(root.path()).expect("fingerprint").log);
}
