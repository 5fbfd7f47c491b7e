#![allow(deprecated)] // Command::cargo_bin is deprecated in assert_cmd 2.1

use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Fast retry and waiter timings so failing paths finish quickly
const SETTINGS: &str = "\
retry:
  initial_delay_ms: 1
  max_delay_ms: 5
waiter:
  max_retries: 20
  initial_delay_ms: 1
  max_delay_ms: 5
  multiplier: 1.0
";

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("strata.yaml"), SETTINGS).unwrap();
        Self { root }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn write_resources(&self, content: &str) {
        fs::write(self.path().join("resources.yaml"), content).unwrap();
    }

    /// `strata` running inside the project, isolated from the caller's environment
    pub fn strata(&self) -> Command {
        let mut cmd = Command::cargo_bin("strata").unwrap();
        cmd.current_dir(self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".config"))
            .env("NO_COLOR", "1")
            .env_remove("STRATA_CONFIG_PATH")
            .env_remove("STRATA_BACKEND")
            .env_remove("STRATA_RESOURCES")
            .env_remove("STRATA_STATE_DIR")
            .env_remove("AWS_REGION")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run a command that must succeed and return its stdout
    pub fn run(&self, args: &[&str]) -> String {
        let output = self.strata().args(args).assert().success();
        String::from_utf8(output.get_output().stdout.clone()).unwrap()
    }

    /// Value printed as `key: value` by a sandbox command
    #[allow(dead_code)]
    pub fn sandbox_value(&self, args: &[&str], key: &str) -> String {
        let stdout = self.run(args);
        let prefix = format!("{}: ", key);
        stdout
            .lines()
            .find_map(|line| line.strip_prefix(&prefix))
            .unwrap_or_else(|| panic!("{} missing from output: {}", key, stdout))
            .trim()
            .to_string()
    }
}
