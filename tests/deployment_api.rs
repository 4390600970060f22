mod common;

use promoter::helpers::remote::RecordingExecutor;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

async fn wait_for_completion(app: &common::TestApp, id: &str) -> Value {
    for _ in 0..200 {
        let body: Value = app
            .client
            .get(app.url(&format!("/api/deploy/status/{}", id)))
            .send()
            .await
            .expect("Failed to execute request.")
            .json()
            .await
            .unwrap();
        if body["item"]["status"] != "running" {
            return body["item"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("deployment {} never finished", id);
}

#[tokio::test]
async fn tracked_deployment_is_single_flight() {
    let app = common::spawn_app(RecordingExecutor::new().with_latency(Duration::from_millis(30))).await;

    let response = app
        .client
        .post(app.url("/api/deploy"))
        .header("X-Triggered-By", "alice")
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body: Value = response.json().await.unwrap();
    let id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["item"]["status"], "running");
    assert_eq!(body["item"]["triggeredBy"], "alice");

    let second = app
        .client
        .post(app.url("/api/deploy"))
        .json(&json!({"dryRun": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let second: Value = second.json().await.unwrap();
    assert!(second["message"].as_str().unwrap().contains(&id));

    // direct endpoints are refused while a tracked run is in flight
    let direct = app
        .client
        .post(app.url("/api/deployment/sync-files"))
        .send()
        .await
        .unwrap();
    assert_eq!(direct.status(), StatusCode::CONFLICT);

    let current: Value = app
        .client
        .get(app.url("/api/deploy/current"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["id"], id.as_str());

    let finished = wait_for_completion(&app, &id).await;
    assert_eq!(finished["status"], "success");
    assert_eq!(finished["result"]["success"], true);
    assert!(finished["finishedAt"].is_string());

    let history: Value = app
        .client
        .get(app.url("/api/deploy/history"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["list"].as_array().unwrap().len(), 1);

    let current: Value = app
        .client
        .get(app.url("/api/deploy/current"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["message"], "No deployment running");
    assert!(current.get("item").is_none());
}

#[tokio::test]
async fn concurrent_direct_and_tracked_runs_are_single_flight() {
    let app = common::spawn_app(RecordingExecutor::new().with_latency(Duration::from_millis(100))).await;

    let deploy = || app.client.post(app.url("/api/deployment/deploy")).send();
    let (first, second, tracked) = tokio::join!(deploy(), deploy(), async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        app.client.post(app.url("/api/deploy")).send().await
    });

    let mut statuses = vec![
        first.unwrap().status(),
        second.unwrap().status(),
        tracked.unwrap().status(),
    ];
    statuses.sort();
    assert_eq!(
        statuses,
        vec![StatusCode::OK, StatusCode::CONFLICT, StatusCode::CONFLICT]
    );

    let backups = app
        .executor
        .commands()
        .into_iter()
        .filter(|command| command.starts_with("pg_dump"))
        .count();
    assert_eq!(backups, 1);

    // the gate is released once the synchronous run answered
    let after = app.client.post(app.url("/api/deploy")).send().await.unwrap();
    assert_eq!(after.status(), StatusCode::ACCEPTED);
    let body: Value = after.json().await.unwrap();
    wait_for_completion(&app, body["id"].as_str().unwrap()).await;
}

#[tokio::test]
async fn cancellation_is_refused() {
    let app = common::spawn_app(RecordingExecutor::new().with_latency(Duration::from_millis(30))).await;

    let body: Value = app
        .client
        .post(app.url("/api/deploy"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = body["id"].as_str().unwrap().to_string();

    let running = app
        .client
        .delete(app.url(&format!("/api/deploy/cancel/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(running.status(), StatusCode::CONFLICT);

    wait_for_completion(&app, &id).await;
    let finished = app
        .client
        .delete(app.url(&format!("/api/deploy/cancel/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(finished.status(), StatusCode::BAD_REQUEST);

    let unknown = app
        .client
        .delete(app.url("/api/deploy/cancel/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_deployment_is_not_found() {
    let app = common::spawn_app(RecordingExecutor::new()).await;

    let response = app
        .client
        .get(app.url("/api/deploy/status/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sync_database_backs_up_then_imports() {
    let app = common::spawn_app(RecordingExecutor::new()).await;

    let response = app
        .client
        .post(app.url("/api/deployment/sync-database"))
        .json(&json!({"includeBlog": false, "includeNews": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["item"]["success"], true);

    let commands = app.executor.commands();
    assert!(commands[0].starts_with("pg_dump"));
    assert!(commands[1].starts_with("psql"));
    let script = &app.executor.uploads()[0];
    assert!(script.contains("'O''Connell Street'"));
    assert!(!script.contains("blog_posts"));
}

#[tokio::test]
async fn failed_file_sync_returns_result_with_500() {
    let app = common::spawn_app(RecordingExecutor::new().fail_on("npm ci", "npm ERR! network")).await;

    let response = app
        .client
        .post(app.url("/api/deployment/sync-files"))
        .json(&json!({"includeUploads": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["item"]["success"], false);
    assert!(body["item"]["errors"][0]
        .as_str()
        .unwrap()
        .contains("Dependency install failed"));
}

#[tokio::test]
async fn dry_run_deploy_changes_nothing() {
    let app = common::spawn_app(RecordingExecutor::new()).await;

    let response = app
        .client
        .post(app.url("/api/deployment/deploy"))
        .json(&json!({"dryRun": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["item"]["success"], true);
    assert!(app.executor.mutating_invocations().is_empty());
}

#[tokio::test]
async fn malformed_options_are_rejected() {
    let app = common::spawn_app(RecordingExecutor::new()).await;

    let response = app
        .client
        .post(app.url("/api/deployment/sync-database"))
        .header("Content-Type", "application/json")
        .body("{\"dryRun\": tru")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.executor.invocations().is_empty());
}

#[tokio::test]
async fn status_and_connection_check() {
    let app = common::spawn_app(
        RecordingExecutor::new().fail_on("echo", "ssh: Could not resolve hostname prod.example.com"),
    )
    .await;

    let connection: Value = app
        .client
        .get(app.url("/api/deployment/test-connection"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(connection["item"]["success"], false);
    assert!(connection["message"]
        .as_str()
        .unwrap()
        .contains("host unreachable"));

    let status: Value = app
        .client
        .get(app.url("/api/deployment/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let item = &status["item"];
    assert_eq!(item["production"]["host"], "prod.example.com");
    assert_eq!(item["production"]["reachable"], false);
    assert_eq!(item["deploymentRunning"], false);
    assert!(item["lastDeployment"].is_null());
}
