use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleetsync::fleet::{self, Action, ActionKind};
use fleetsync::platform::HttpPlatform;

use crate::fleet_harness::{OWNER, catalog, namespace, spec};

#[tokio::test]
async fn plan_against_remote_host_repairs_legacy_schedule() {
    let server = MockServer::start().await;
    let desired = spec("Matt 2.0 Market Intelligence", "every_2_minutes");
    Mock::given(method("GET"))
        .and(path(format!("/api/users/{OWNER}/agents")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "agents": [
                {
                    "id": "11",
                    "name": desired.name,
                    "schedule": "every_3m",
                    "code_body": desired.code_body,
                    "retention_seconds": desired.retention_seconds,
                    "language": "javascript"
                },
                { "id": "12", "name": "XKCD Source", "schedule": "every_1d" }
            ]
        })))
        .mount(&server)
        .await;

    let platform = HttpPlatform::new(&format!("{}/api", server.uri()), Some("t"), 100, 5).unwrap();
    let plan = fleet::dry_run(&platform, OWNER, &catalog(vec![desired]), &namespace())
        .await
        .unwrap();

    assert_eq!(plan.actions.len(), 1);
    assert_eq!(plan.count(ActionKind::Update), 1);
    let Action::Update { id, spec, .. } = &plan.actions[0] else {
        panic!("expected update");
    };
    assert_eq!(id, "11");
    assert_eq!(spec.schedule, "every_2_minutes");
}

#[tokio::test]
async fn apply_against_remote_host_creates_and_verifies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/users/{OWNER}/agents")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "agents": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/api/users/{OWNER}/agents")))
        .and(body_partial_json(json!({ "schedule": "every_1_hour" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "21",
            "name": "Matt 2.0 New",
            "schedule": "every_1_hour",
            "output_count": 0
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/agents/21/run"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    // Baseline read returns 0; every later poll sees the forced run's event.
    Mock::given(method("GET"))
        .and(path("/api/agents/21/events/count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 0 })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/agents/21/events/count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 1 })))
        .mount(&server)
        .await;

    let platform = std::sync::Arc::new(
        HttpPlatform::new(&format!("{}/api/", server.uri()), None, 100, 5).unwrap(),
    );
    let report = fleet::run(
        platform,
        OWNER,
        &catalog(vec![spec("Matt 2.0 New", "every_1h")]),
        &namespace(),
        crate::fleet_harness::fast_options(),
        &tokio_util::sync::CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.counts.created, 1);
    assert_eq!(report.counts.verified, 1, "{report}");
}
