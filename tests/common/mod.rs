//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Input document staged by most tests. Deliberately not pretty-printed so a
/// reformatting copy would be noticed.
pub const STORY_JSON: &str = "{\"rows\":[{\"id\":\"r1\",\"title\":\"Start\",\"objects\":[]}]}";

/// A scratch working directory with fake format/build/status stages.
///
/// Every stage appends `<name> <args>` to `calls.log` so tests can assert
/// which stages ran and with which arguments.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_exit_codes(0, 0, 0)
    }

    pub fn with_exit_codes(format: i32, build: i32, status: i32) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let workspace = Workspace { dir };
        workspace.write("story.json", STORY_JSON);
        // The format stage snapshots what it was handed before "formatting".
        workspace.write_stage(
            "format",
            &format!("cp \"$1\" seen-by-format.json\nexit {format}"),
        );
        workspace.write_stage("build", &format!("exit {build}"));
        workspace.write_stage("status", &format!("echo 'nothing to commit'\nexit {status}"));
        workspace.write(
            "cyoa-build.json",
            r#"{
  "schema_version": 1,
  "format_command": "sh format.sh",
  "build_command": "sh build.sh",
  "status_command": "sh status.sh"
}"#,
        );
        workspace
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, rel: &str) -> PathBuf {
        self.path().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.file(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent directory");
        }
        std::fs::write(path, contents.as_bytes()).expect("write file");
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.file(rel)).expect("read file")
    }

    /// Write a `#!/bin/sh` script that can be run directly as `./<rel>`.
    #[cfg(unix)]
    pub fn write_executable(&self, rel: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        self.write(rel, &format!("#!/bin/sh\n{body}\n"));
        std::fs::set_permissions(self.file(rel), std::fs::Permissions::from_mode(0o755))
            .expect("make script executable");
    }

    fn write_stage(&self, name: &str, body: &str) {
        self.write(
            &format!("{name}.sh"),
            &format!("echo \"{name} $*\" >> calls.log\n{body}\n"),
        );
    }

    /// Stage invocations recorded so far, in order.
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.file("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(|line| line.trim_end().to_string())
            .collect()
    }

    /// Run the binary inside the workspace with a clean stage environment.
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_cyoa-build"))
            .args(args)
            .current_dir(self.path())
            .env_remove("CYOA_FORMAT_COMMAND")
            .env_remove("CYOA_BUILD_COMMAND")
            .env_remove("CYOA_STATUS_COMMAND")
            .env_remove("RUST_LOG")
            .output()
            .expect("run cyoa-build")
    }
}
