//! API regression tests.
//!
//! Drives the full router the daemon serves: metric and value lifecycle,
//! interval changes, the scrape endpoint and store mirroring.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use mocktrics_api::{ApiState, build_router};
use mocktrics_metrics::{Exporter, MetricRegistry, Scheduler};
use mocktrics_state::StateStore;

fn test_state(store: Option<StateStore>) -> ApiState {
    let registry = MetricRegistry::new(Exporter::new());
    let scheduler = Scheduler::new(registry.clone(), 10, false).unwrap();
    ApiState {
        registry,
        scheduler,
        store,
    }
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

const VALUES_URI: &str = "/metric/requests_total/value";

fn requests_total() -> serde_json::Value {
    serde_json::json!({
        "name": "requests_total",
        "documentation": "Demo requests.",
        "labels": ["method"],
    })
}

#[tokio::test]
async fn metric_lifecycle() {
    let router = build_router(test_state(None));

    let (status, _) = send(&router, json_request("POST", "/metric", requests_total())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&router, json_request("POST", "/metric", requests_total())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&router, empty_request("GET", "/metric/requests_total")).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["data"]["documentation"], "Demo requests.");

    let (status, body) = send(&router, empty_request("GET", "/metric/all")).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(body["data"]["requests_total"].is_object());

    let (status, _) = send(&router, empty_request("DELETE", "/metric/requests_total")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, empty_request("GET", "/metric/requests_total")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn value_lifecycle_and_scrape() {
    let state = test_state(None);
    let registry = state.registry.clone();
    let router = build_router(state);

    send(&router, json_request("POST", "/metric", requests_total())).await;

    let value = serde_json::json!({ "kind": "static", "labels": ["GET"], "value": 42 });
    let (status, _) = send(&router, json_request("POST", VALUES_URI, value)).await;
    assert_eq!(status, StatusCode::CREATED);

    let dup = serde_json::json!({ "kind": "static", "labels": ["GET"], "value": 1 });
    let (status, _) = send(&router, json_request("POST", VALUES_URI, dup)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let wide = serde_json::json!({ "kind": "static", "labels": ["GET", "x"], "value": 1 });
    let (status, _) = send(&router, json_request("POST", VALUES_URI, wide)).await;
    assert_eq!(status.as_u16(), 419);

    let sine = serde_json::json!({
        "kind": "sine", "labels": ["POST"], "period": "2m", "amplitude": "1k"
    });
    let (status, _) = send(&router, json_request("POST", VALUES_URI, sine)).await;
    assert_eq!(status, StatusCode::CREATED);

    registry.collect_all();
    let (status, body) = send(&router, empty_request("GET", "/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("# TYPE requests_total gauge"));
    assert!(text.contains("requests_total{method=\"GET\"} 42"));
    assert!(text.contains("requests_total{method=\"POST\"}"));

    let (status, _) = send(
        &router,
        empty_request("DELETE", "/metric/requests_total/value?labels=PUT"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &router,
        empty_request("DELETE", "/metric/requests_total/value?labels=GET"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&router, empty_request("GET", "/metrics")).await;
    let text = String::from_utf8(body).unwrap();
    assert!(!text.contains("requests_total{method=\"GET\"}"));
}

#[tokio::test]
async fn delete_value_requires_matching_label_count() {
    let router = build_router(test_state(None));
    let metric = serde_json::json!({
        "name": "pairs",
        "labels": ["a", "b"],
        "values": [{ "kind": "static", "labels": ["x", "y"], "value": 1 }],
    });
    send(&router, json_request("POST", "/metric", metric)).await;

    let (status, _) = send(&router, empty_request("DELETE", "/metric/pairs/value?labels=x")).await;
    assert_eq!(status.as_u16(), 419);

    let (status, _) = send(
        &router,
        empty_request("DELETE", "/metric/pairs/value?labels=y&labels=x"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn collect_interval_endpoints() {
    let state = test_state(None);
    let scheduler = state.scheduler.clone();
    let router = build_router(state);

    let (status, body) = send(&router, empty_request("GET", "/collect-interval")).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["data"]["seconds"], 10);

    let (status, _) = send(&router, empty_request("POST", "/collect-interval/30s")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scheduler.get_interval(), 30);

    let (status, _) = send(&router, empty_request("POST", "/collect-interval/0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(scheduler.get_interval(), 30);
}

#[tokio::test]
async fn fixed_interval_is_forbidden() {
    let registry = MetricRegistry::new(Exporter::new());
    let scheduler = Scheduler::new(registry.clone(), 5, true).unwrap();
    let router = build_router(ApiState {
        registry,
        scheduler,
        store: None,
    });

    let (status, _) = send(&router, empty_request("POST", "/collect-interval/30")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn mutations_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("mocktrics.redb");

    {
        let router = build_router(test_state(Some(StateStore::open(&db_path).unwrap())));
        send(&router, json_request("POST", "/metric", requests_total())).await;
        let value = serde_json::json!({
            "kind": "gaussian", "labels": ["GET"], "mean": 5, "sigma": 1
        });
        let (status, _) = send(&router, json_request("POST", VALUES_URI, value)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let store = StateStore::open(&db_path).unwrap();
    let records = store.load_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "requests_total");
    assert_eq!(records[0].values.len(), 1);
    assert!(!records[0].read_only);
}
