//! Watch mode rebuild triggers

mod common;

use std::collections::BTreeSet;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use common::TestEnvironment;
use permutator::app;
use permutator_config::Config;
use permutator_core::mock::MockBackend;

#[test]
fn test_save_during_build_is_reported() {
    let env = TestEnvironment::new();
    let source = env.write_source("Live.hlsl", "MODE\n");

    // The first compile saves the shader again, as an editor would mid-build
    let edited = source.clone();
    let saved = AtomicBool::new(false);
    let backend = MockBackend::new().with_output(move |permutation| {
        if !saved.swap(true, Ordering::SeqCst) {
            fs::write(&edited, "MODE\n// edited\n").expect("Failed to edit source");
        }
        permutation.key.to_le_bytes().to_vec()
    });

    let args = env.args(&["-DMODE={0,1}"], &source);
    let job = env.job(&args, &Config::default());
    let files = BTreeSet::from([source.clone()]);
    let (watcher, next) = app::watched_build(&job, &backend, &files).unwrap();

    assert!(next.iter().any(|p| p.ends_with("Live.hlsl")));
    assert!(env.output("Live_permutations.h").exists());

    let canonical = source.canonicalize().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut changed = BTreeSet::new();
    while !changed.contains(&canonical) && Instant::now() < deadline {
        changed.extend(watcher.drain());
        thread::sleep(Duration::from_millis(20));
    }
    assert!(changed.contains(&canonical));
}

#[test]
fn test_failed_build_still_watches_include_closure() {
    let env = TestEnvironment::new();
    env.write_source("common.hlsl", "float4 tint;\n");
    let source = env.write_source("Bad.hlsl", "#include \"common.hlsl\"\nMODE\n");
    let backend = MockBackend::new().fail_when("MODE", "1");

    let args = env.args(&["-DMODE={0,1}"], &source);
    let job = env.job(&args, &Config::default());
    let files = BTreeSet::from([source.clone()]);
    let (_watcher, next) = app::watched_build(&job, &backend, &files).unwrap();

    assert_eq!(next.len(), 2);
    assert!(next.iter().any(|p| p.ends_with("common.hlsl")));
    assert!(!env.output("Bad_permutations.h").exists());
}
