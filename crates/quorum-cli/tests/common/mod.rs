//! Shared E2E test helpers for `quorum` binary tests.

use assert_cmd::cargo::cargo_bin_cmd;
use quorum_types::{Identity, Role, Survey, Tenant};
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for CLI tests.
pub const TIMEOUT_BASIC: Duration = Duration::from_secs(10);

pub const ADMIN_TOKEN: &str = "admin-token";

/// Environment that would otherwise leak into the merged config.
const CONFIG_VARS: &[&str] = &[
    "QUORUM_RATE_LIMIT",
    "QUORUM_RATE_LIMIT_CAPACITY",
    "QUORUM_RATE_LIMIT_REFILL",
    "QUORUM_MAX_BATCH_SIZE",
    "QUORUM_MAX_PAGE_SIZE",
    "QUORUM_SESSION_TIMEOUT_SECS",
    "QUORUM_BUS_BUFFER",
    "RUST_LOG",
];

/// A seeded project directory: one tenant, its admin and a draft survey.
pub struct Project {
    pub dir: tempfile::TempDir,
    pub seed: PathBuf,
    pub survey: Survey,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp project dir");
        let tenant = Tenant::new("Acme");
        let admin = Identity::new("admin@acme.io", Role::TenantAdmin, Some(tenant.id));
        let survey = Survey::new(tenant.id, "Customer pulse");
        let seed = serde_json::json!({
            "tenants": [tenant],
            "identities": [admin],
            "surveys": [survey],
            "tokens": { ADMIN_TOKEN: admin.id },
        });
        let path = dir.path().join("seed.json");
        std::fs::write(&path, seed.to_string()).expect("write seed file");
        Self {
            dir,
            seed: path,
            survey,
        }
    }

    /// Command rooted in this project, isolated from the user's config.
    pub fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = quorum_cmd_raw();
        cmd.arg("-C")
            .arg(self.dir.path())
            .arg("--config")
            .arg(self.dir.path().join("no-global.toml"))
            .arg("--seed")
            .arg(&self.seed);
        cmd
    }
}

/// Build a bare Command for the `quorum` binary.
pub fn quorum_cmd_raw() -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("quorum");
    cmd.timeout(TIMEOUT_BASIC);
    for var in CONFIG_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Parse the JSON document printed on stdout.
pub fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}
