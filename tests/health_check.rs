mod common;

use promoter::helpers::remote::RecordingExecutor;

#[tokio::test]
async fn health_check_works() {
    let app = common::spawn_app(RecordingExecutor::new()).await;

    let response = app
        .client
        .get(app.url("/health_check"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
    assert!(app.executor.invocations().is_empty());
}
