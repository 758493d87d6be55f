//! Scripted stand-ins for a container engine CLI.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory holding a fake engine script and its side files.
pub struct FakeEngine {
    dir: TempDir,
    program: PathBuf,
}

impl FakeEngine {
    /// Writes `body` as an executable POSIX shell script.
    ///
    /// `$STATE` inside the script expands to the temporary directory, so
    /// scripts can leave marker files for assertions.
    pub fn new(body: &str) -> Self {
        let dir = TempDir::new().expect("temporary directory");
        let program = dir.path().join("fake-engine");
        let script = format!(
            "#!/bin/sh\nSTATE='{}'\n{body}\n",
            dir.path().display()
        );
        fs::write(&program, script).expect("write fake engine");
        let mut permissions = fs::metadata(&program)
            .expect("fake engine metadata")
            .permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&program, permissions).expect("make fake engine executable");
        Self { dir, program }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn state_file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn read_state(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.state_file(name)).ok()
    }
}
