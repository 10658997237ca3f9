//! Common test utilities for Bunker integration tests

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// An isolated store plus a scratch area for source fixtures.
#[allow(dead_code)]
pub struct TestStore {
    /// Temporary directory holding the store and fixtures
    pub temp: TempDir,
    /// Path passed to the binary as BUNKER_STORE
    pub store: PathBuf,
}

#[allow(dead_code)]
impl TestStore {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let store = temp.path().join("store");
        Self { temp, store }
    }

    /// Command wired to this store.
    #[allow(deprecated)]
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("bunker").unwrap();
        cmd.env("BUNKER_STORE", &self.store);
        cmd
    }

    /// Create a bundle source directory outside the store.
    pub fn create_bundle(&self, name: &str) -> PathBuf {
        let path = self.temp.path().join("sources").join(name);
        std::fs::create_dir_all(&path).expect("Failed to create bundle directory");
        std::fs::write(path.join("bundle.yaml"), format!("name: {name}\n"))
            .expect("Failed to write bundle manifest");
        std::fs::write(path.join("README.md"), format!("# {name}\n"))
            .expect("Failed to write bundle file");
        path
    }

    /// Add a file to a previously created fixture.
    pub fn write_file(&self, dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
    }

    /// Whether a path exists inside the store.
    pub fn installed(&self, relative: &str) -> bool {
        self.store.join(relative).exists()
    }
}
