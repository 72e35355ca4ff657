use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

/// Test harness for running CLI commands with temporary databases
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
    initial_horizon: usize,
}

impl CliTestHarness {
    /// Create a new test harness with a temporary database. New recurring
    /// tasks get five instances so assertions stay small.
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self {
            temp_dir,
            db_path,
            initial_horizon: 5,
        }
    }

    /// Get a Command instance configured for testing
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("cadence").expect("Failed to find cadence binary");

        // Run inside the temp dir so no stray cadence.toml is picked up
        cmd.current_dir(self.temp_dir.path())
            .env_remove("CADENCE_LOG")
            .env("CADENCE_DATABASE_PATH", &self.db_path)
            .env(
                "CADENCE_MATERIALIZATION__INITIAL_HORIZON",
                self.initial_horizon.to_string(),
            );

        cmd
    }

    /// Get the database path for this test instance
    #[allow(dead_code)]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Helper to run a command and assert success
    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    /// Helper to run a command and assert failure
    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Runs `add` and returns the new task's ID from its output.
    pub fn add_task(&self, args: &[&str]) -> String {
        let mut full = vec!["add"];
        full.extend_from_slice(args);
        let output = self.run_success(&full).get_output().stdout.clone();
        let stdout = String::from_utf8(output).expect("stdout is UTF-8");
        extract_id(&stdout).expect("add prints the task ID")
    }

    /// `list --json` for one task, parsed.
    pub fn instances_json(&self, task_id: &str, from: &str, to: &str) -> Vec<serde_json::Value> {
        let output = self
            .run_success(&["list", "--task", task_id, "--from", from, "--to", to, "--json"])
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("list --json prints a JSON array")
    }
}

/// Finds the first UUID in (possibly colored) output.
pub fn extract_id(output: &str) -> Option<String> {
    (0..output.len()).find_map(|start| {
        output
            .get(start..start + 36)
            .and_then(|candidate| candidate.parse::<Uuid>().ok())
            .map(|id| id.to_string())
    })
}
