#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use fleetsync::fleet::{Catalog, ManagedNamespace, RunOptions, VerifyOptions, WorkerSpec};
use fleetsync::platform::{InMemoryPlatform, LiveWorker};

pub const OWNER: &str = "admin@example.com";
pub const PREFIX: &str = "Matt 2.0";

pub fn namespace() -> ManagedNamespace {
    ManagedNamespace::new(PREFIX)
}

pub fn spec(name: &str, schedule: &str) -> WorkerSpec {
    WorkerSpec::new(
        name,
        schedule,
        format!("Agent.createEvent({{ source: '{name}' }});"),
    )
}

pub fn catalog(specs: Vec<WorkerSpec>) -> Catalog {
    Catalog::from_specs(specs, &namespace()).unwrap()
}

/// The catalog shipped under `demos/`.
pub fn demo_catalog() -> Catalog {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join("matt_fleet.toml");
    Catalog::load(path.to_str().unwrap(), &namespace()).unwrap()
}

pub fn write_catalog(dir: &TempDir, file_name: &str, contents: &str) -> String {
    let path = dir.path().join(file_name);
    std::fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

pub fn fast_options() -> RunOptions {
    RunOptions {
        verify: VerifyOptions {
            timeout: Duration::from_millis(300),
            poll_interval: Duration::from_millis(10),
            concurrency: 4,
        },
        skip_verify: false,
    }
}

/// Insert a live worker matching `spec` exactly, schedule included.
pub async fn seed_spec(platform: &InMemoryPlatform, spec: &WorkerSpec) -> String {
    platform
        .seed_worker(
            OWNER,
            LiveWorker {
                id: String::new(),
                name: spec.name.clone(),
                schedule: spec.schedule.clone(),
                disabled: false,
                output_count: 0,
                last_output_at: None,
                code_body: spec.code_body.clone(),
                retention_seconds: spec.retention_seconds,
                language: spec.language.clone(),
            },
        )
        .await
}
