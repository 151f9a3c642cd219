//! End-to-end runs against a mock timeline API.
//!
//! Each test starts a wiremock server, points the HTTP client at it, and
//! drives `JobRunner::run_once()` with a real cursor store.

use std::sync::Arc;

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use update_name::channels::{HttpTimelineClient, TimelineConfig};
use update_name::error::PipelineError;
use update_name::pipeline::rules::RuleSet;
use update_name::pipeline::runner::{FailurePolicy, JobRunner, RunOptions};
use update_name::pipeline::types::ActionKind;
use update_name::store::{CursorStore, JsonFileCursorStore, LibSqlCursorStore};

const RULES: &str = r##"{
    "matchMode": "first",
    "lengthGate": "exempt-ng",
    "rules": [
        {"triggerType": "suffix", "triggerWord": "#rename", "omitTriggerWord": true, "replyFormat": "done: %s"},
        {"triggerType": "ng", "triggerWord": "#rename!!", "replyFormat": "too loud"}
    ]
}"##;

fn runner(server: &MockServer, cursors: Arc<dyn CursorStore>) -> JobRunner {
    let client = Arc::new(HttpTimelineClient::new(TimelineConfig {
        base_url: server.uri(),
        access_token: SecretString::from("it-token".to_string()),
        page_size: 200,
    }));
    JobRunner::new(
        "alice",
        RuleSet::from_json(RULES).unwrap(),
        client.clone(),
        client,
        cursors,
    )
}

async fn mount_ok(server: &MockServer, endpoint: &str) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn first_run_renames_and_second_run_resumes_from_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/statuses/home_timeline.json"))
        .and(query_param_is_missing("since_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 42, "full_text": "@bob hello#rename", "user": {"screen_name": "carol"}},
            {"id": 41, "full_text": "unrelated", "user": {"screen_name": "dan"}}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/statuses/home_timeline.json"))
        .and(query_param("since_id", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/favorites/create.json"))
        .and(query_param("id", "42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/account/update_profile.json"))
        .and(query_param("name", "hello"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/statuses/update.json"))
        .and(query_param("status", "@carol done: hello"))
        .and(query_param("in_reply_to_status_id", "42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let cursors: Arc<dyn CursorStore> = Arc::new(LibSqlCursorStore::new_memory().await.unwrap());
    let runner = runner(&server, Arc::clone(&cursors));

    let first = runner.run_once().await.unwrap();
    assert_eq!(first.fetched, 2);
    assert_eq!(first.matched_items, 1);
    assert_eq!(first.actions_executed, 3);
    assert_eq!(first.new_cursor, Some(42));
    assert!(first.cursor_persisted);
    assert_eq!(cursors.get_cursor("alice").await.unwrap(), Some(42));

    let second = runner.run_once().await.unwrap();
    assert_eq!(second.fetched, 0);
    assert_eq!(second.new_cursor, None);
    assert_eq!(cursors.get_cursor("alice").await.unwrap(), Some(42));
}

#[tokio::test]
async fn rename_failure_leaves_cursor_for_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/statuses/home_timeline.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 7, "full_text": "new name#rename", "user": {"screen_name": "carol"}}
        ])))
        .expect(2)
        .mount(&server)
        .await;
    mount_ok(&server, "/favorites/create.json").await;
    Mock::given(method("POST"))
        .and(path("/account/update_profile.json"))
        .respond_with(ResponseTemplate::new(403).set_body_string("suspended"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/statuses/update.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cursors: Arc<dyn CursorStore> =
        Arc::new(JsonFileCursorStore::new(dir.path().join("cursors.json")));
    let runner = runner(&server, Arc::clone(&cursors));

    for _ in 0..2 {
        let err = runner.run_once().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Action {
                kind: ActionKind::UpdateProfileName,
                ..
            }
        ));
        assert_eq!(cursors.get_cursor("alice").await.unwrap(), None);
    }
}

#[tokio::test]
async fn continue_policy_advances_past_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/statuses/home_timeline.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 9, "full_text": "shout#rename!!", "user": {"screen_name": "erin"}},
            {"id": 8, "full_text": "quiet#rename", "user": {"screen_name": "frank"}}
        ])))
        .mount(&server)
        .await;
    mount_ok(&server, "/favorites/create.json").await;
    mount_ok(&server, "/account/update_profile.json").await;
    Mock::given(method("POST"))
        .and(path("/statuses/update.json"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cursors.json");
    std::fs::write(&path, r#"{"someone-else": 1234}"#).unwrap();
    let cursors: Arc<dyn CursorStore> = Arc::new(JsonFileCursorStore::new(&path));

    let report = runner(&server, Arc::clone(&cursors))
        .with_options(RunOptions {
            failure_policy: FailurePolicy::Continue,
            ..Default::default()
        })
        .run_once()
        .await
        .unwrap();

    // NG reply for 9 (fails), favorite + rename + reply for 8 (reply fails).
    assert_eq!(report.actions_planned, 4);
    assert_eq!(report.actions_executed, 2);
    assert_eq!(report.actions_failed, 2);
    assert_eq!(report.new_cursor, Some(9));

    let all = cursors.all_cursors().await.unwrap();
    assert_eq!(all["alice"], 9);
    assert_eq!(all["someone-else"], 1234);
}
