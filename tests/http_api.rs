use std::{fs, sync::Arc};

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use metrical::{
    http::build_router,
    storage::{Config, DiskConfig, Storage},
    DataPoint, EncodeStrategy,
};
use rand::Rng;
use serde_json::{json, Value};
use tower::ServiceExt;

fn in_memory_router() -> Router {
    build_router(Arc::new(Storage::new(Config::default()).unwrap()))
}

async fn post(app: &Router, body: String) -> StatusCode {
    let req = Request::builder()
        .method("POST")
        .uri("/metrics")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    app.clone().oneshot(req).await.unwrap().status()
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = match bytes.is_empty() {
        true => Value::Null,
        false => serde_json::from_slice(&bytes).unwrap(),
    };
    (status, body)
}

#[tokio::test]
async fn thousand_points_are_stored_and_retrievable() {
    let app = in_memory_router();
    let mut rng = rand::thread_rng();
    let start = 1_700_000_000_000u64;

    let mut sent = vec![];
    for i in 0..1000 {
        let value = rng.gen_range(0..1000);
        let body = json!({
            "name": "test",
            "key": "test",
            "timestamp": start + i,
            "value": value,
        });
        assert_eq!(post(&app, body.to_string()).await, StatusCode::CREATED);
        sent.push((start + i, value as f64));
    }

    let (status, body) = get(&app, "/metrics?name=test&key=test").await;
    assert_eq!(status, StatusCode::OK);
    let points: Vec<DataPoint> = serde_json::from_value(body).unwrap();
    assert_eq!(points.len(), 1000);
    let received: Vec<(u64, f64)> = points.iter().map(|p| (p.timestamp, p.value)).collect();
    assert_eq!(received, sent);
}

#[tokio::test]
async fn colliding_timestamps_are_all_kept() {
    let app = in_memory_router();
    let body = json!({"name": "test", "key": "test", "timestamp": 42, "value": 1.5}).to_string();
    for _ in 0..3 {
        assert_eq!(post(&app, body.clone()).await, StatusCode::CREATED);
    }
    let (_, body) = get(&app, "/metrics?name=test&key=test").await;
    assert_eq!(
        body,
        json!([
            {"timestamp": 42, "value": 1.5},
            {"timestamp": 42, "value": 1.5},
            {"timestamp": 42, "value": 1.5},
        ])
    );
}

#[tokio::test]
async fn empty_series_returns_empty_array() {
    let app = in_memory_router();
    let (status, body) = get(&app, "/metrics?name=missing&key=missing").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn rejected_post_does_not_change_count() {
    let app = in_memory_router();
    let valid = json!({"name": "cpu", "key": "a", "timestamp": 1, "value": 0.5});
    assert_eq!(post(&app, valid.to_string()).await, StatusCode::CREATED);

    let missing_value = json!({"name": "cpu", "key": "a", "timestamp": 2});
    assert_eq!(
        post(&app, missing_value.to_string()).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(post(&app, "{".to_string()).await, StatusCode::BAD_REQUEST);

    let (_, body) = get(&app, "/metrics?name=cpu&key=a").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_query_parameters() {
    let app = in_memory_router();
    for uri in ["/metrics", "/metrics?name=cpu", "/metrics?key=a"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn malformed_query_string_has_json_error() {
    let app = in_memory_router();
    let (status, body) = get(&app, "/metrics?name=cpu&name=mem&key=a").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn series_are_isolated() {
    let app = in_memory_router();
    for (name, key, value) in [("cpu", "a", 1.0), ("cpu", "b", 2.0), ("mem", "a", 3.0)] {
        let body = json!({"name": name, "key": key, "timestamp": 1, "value": value});
        assert_eq!(post(&app, body.to_string()).await, StatusCode::CREATED);
    }
    for (uri, value) in [
        ("/metrics?name=cpu&key=a", 1.0),
        ("/metrics?name=cpu&key=b", 2.0),
        ("/metrics?name=mem&key=a", 3.0),
    ] {
        let (_, body) = get(&app, uri).await;
        assert_eq!(body, json!([{"timestamp": 1, "value": value}]));
    }
}

#[tokio::test]
async fn points_survive_restart() {
    let data_path = "./test_http_points_survive_restart";
    let config = || Config {
        disk: Some(DiskConfig {
            data_path: data_path.into(),
            encode_strategy: EncodeStrategy::Gorilla,
        }),
        ..Default::default()
    };

    let storage = Arc::new(Storage::new(config()).unwrap());
    let app = build_router(storage.clone());
    for i in 0..10u64 {
        let body = json!({"name": "test", "key": "test", "timestamp": 100 - i, "value": i});
        assert_eq!(post(&app, body.to_string()).await, StatusCode::CREATED);
    }
    storage.close().unwrap();
    drop(app);
    drop(storage);

    let app = build_router(Arc::new(Storage::new(config()).unwrap()));
    let (_, body) = get(&app, "/metrics?name=test&key=test").await;
    let points: Vec<DataPoint> = serde_json::from_value(body).unwrap();
    let timestamps: Vec<u64> = points.iter().map(|p| p.timestamp).collect();
    assert_eq!(timestamps, (0..10).map(|i| 100 - i).collect::<Vec<u64>>());

    fs::remove_dir_all(data_path).unwrap();
}
