use tempfile::TempDir;

use fleetsync::error::{CatalogError, SpecViolation};
use fleetsync::fleet::Catalog;
use fleetsync::platform::InMemoryPlatform;

use crate::fleet_harness::{demo_catalog, namespace, write_catalog};

#[tokio::test]
async fn duplicate_names_abort_before_any_platform_call() {
    let dir = TempDir::new().unwrap();
    let path = write_catalog(
        &dir,
        "fleet.toml",
        r#"
        [[workers]]
        name = "Matt 2.0 X"
        schedule = "every_1h"
        code = "Agent.createEvent({ n: 1 });"

        [[workers]]
        name = "Matt 2.0 X"
        schedule = "every_2h"
        code = "Agent.createEvent({ n: 2 });"
        "#,
    );
    let platform = InMemoryPlatform::new();

    let err = Catalog::load(&path, &namespace()).unwrap_err();

    assert_eq!(err.duplicate_names(), vec!["Matt 2.0 X"]);
    assert!(platform.calls().await.is_empty());
}

#[test]
fn json_catalog_is_loaded_by_extension() {
    let dir = TempDir::new().unwrap();
    let path = write_catalog(
        &dir,
        "fleet.json",
        r#"{
            "version": 1,
            "workers": [
                { "name": "Matt 2.0 A", "schedule": "every_5m", "code": "1;", "keep_events_for": 86400 }
            ]
        }"#,
    );

    let catalog = Catalog::load(&path, &namespace()).unwrap();
    let spec = catalog.get("Matt 2.0 A").unwrap();
    assert_eq!(spec.retention_seconds, 86_400);
    assert_eq!(spec.schedule, "every_5m");
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_catalog(&dir, "fleet.yaml", "workers: []");

    let err = Catalog::load(&path, &namespace()).unwrap_err();
    assert!(matches!(err, CatalogError::UnsupportedFormat(_)));
}

#[test]
fn names_outside_the_prefix_are_rejected_with_index() {
    let dir = TempDir::new().unwrap();
    let path = write_catalog(
        &dir,
        "fleet.toml",
        r#"
        [[workers]]
        name = "Matt 2.0 A"
        schedule = "never"
        code = ""

        [[workers]]
        name = "XKCD Source"
        schedule = "every_1d"
        code = ""
        "#,
    );

    let err = Catalog::load(&path, &namespace()).unwrap_err();
    let CatalogError::Invalid(violations) = err else {
        panic!("expected validation failure");
    };
    assert_eq!(
        violations,
        vec![SpecViolation::OutsideNamespace {
            index: 1,
            name: "XKCD Source".into(),
            prefix: "Matt 2.0".into(),
        }]
    );
}

#[test]
fn demo_catalog_is_valid() {
    let catalog = demo_catalog();
    assert_eq!(catalog.len(), 3);
    assert!(catalog.specs().iter().all(|s| s.retention_seconds == 604_800));
}
