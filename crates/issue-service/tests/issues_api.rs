use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use issue_service::auth::StaticTokenVerifier;
use issue_service::services::issues::IssueService;
use issue_service::storage::StorageManager;
use issue_service::store::{IssueStore, MemoryIssueStore};
use issue_service::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for oneshot

fn test_app() -> Router {
    let store: Arc<dyn IssueStore> = Arc::new(MemoryIssueStore::default());
    let service = Arc::new(IssueService::new(
        store,
        StorageManager::mock("http://localhost:9000", "issue-attachments"),
        Duration::from_secs(300),
    ));
    let verifier = Arc::new(StaticTokenVerifier::new(vec![
        ("tok-u1".into(), "U1".into()),
        ("tok-u2".into(), "U2".into()),
        ("tok-u3".into(), "U3".into()),
    ]));
    build_router(AppState { service, verifier })
}

fn request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"));
    match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_issue(app: &Router, token: &str, body: Value) -> Value {
    let res = app
        .clone()
        .oneshot(request("POST", "/issues/new", token, Some(body)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    json_body(res).await["item"].clone()
}

async fn list_issues(app: &Router, token: &str) -> Vec<Value> {
    let res = app
        .clone()
        .oneshot(request("GET", "/issues", token, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    json_body(res).await["items"].as_array().unwrap().clone()
}

#[tokio::test]
async fn creation_forces_server_assigned_fields() {
    let app = test_app();
    // status and reporterId in the request body must be ignored
    let item = create_issue(
        &app,
        "tok-u1",
        json!({"title": "Bug A", "status": "CLOSED", "reporterId": "U9"}),
    )
    .await;

    assert_eq!(item["reporterId"], "U1");
    assert_eq!(item["status"], "TO DO");
    assert_eq!(item["assigneeId"], Value::Null);
    assert_eq!(item["attachments"], json!([]));
    assert_eq!(item["title"], "Bug A");
    assert!(item["issueId"].as_str().is_some());
    assert!(item["createdAt"].as_str().is_some());
}

#[tokio::test]
async fn create_then_list_round_trips() {
    let app = test_app();
    let item = create_issue(&app, "tok-u1", json!({"title": "Bug A", "description": "boom"})).await;
    let items = list_issues(&app, "tok-u1").await;
    assert_eq!(items, vec![item]);
}

#[tokio::test]
async fn listing_concatenates_assigned_then_reported_with_duplicates() {
    let app = test_app();
    let reported = create_issue(&app, "tok-u1", json!({"title": "mine", "assigneeId": "U2"})).await;
    let assigned = create_issue(&app, "tok-u2", json!({"title": "theirs", "assigneeId": "U1"})).await;

    let items = list_issues(&app, "tok-u1").await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["issueId"], assigned["issueId"]);
    assert_eq!(items[1]["issueId"], reported["issueId"]);

    // reporter == assignee: the issue appears twice, by design
    let both = create_issue(&app, "tok-u3", json!({"title": "self", "assigneeId": "U3"})).await;
    let items = list_issues(&app, "tok-u3").await;
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i["issueId"] == both["issueId"]));
}

#[tokio::test]
async fn filtered_listing_by_user_type() {
    let app = test_app();
    let reported = create_issue(&app, "tok-u1", json!({"title": "mine", "assigneeId": "U2"})).await;
    let assigned = create_issue(&app, "tok-u2", json!({"title": "theirs", "assigneeId": "U1"})).await;

    let res = app
        .clone()
        .oneshot(request("POST", "/issues", "tok-u1", Some(json!({"userType": "reporter"}))))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let items = json_body(res).await["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["issueId"], reported["issueId"]);

    let res = app
        .clone()
        .oneshot(request("POST", "/issues", "tok-u1", Some(json!({"userType": "assignee"}))))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let items = json_body(res).await["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["issueId"], assigned["issueId"]);
}

#[tokio::test]
async fn unknown_user_type_is_rejected_before_touching_the_store() {
    let app = test_app();
    let res = app
        .clone()
        .oneshot(request("POST", "/issues", "tok-u1", Some(json!({"userType": "manager"}))))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json_body(res).await;
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn partial_update_keeps_omitted_fields() {
    let app = test_app();
    let item = create_issue(&app, "tok-u1", json!({"title": "Bug A", "description": "boom"})).await;
    let id = item["issueId"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/issues/{id}"),
            "tok-u1",
            Some(json!({"status": "IN PROGRESS"})),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let items = list_issues(&app, "tok-u1").await;
    assert_eq!(items[0]["status"], "IN PROGRESS");
    assert_eq!(items[0]["title"], "Bug A");
    assert_eq!(items[0]["description"], "boom");
}

#[tokio::test]
async fn update_defaults_missing_description_to_empty_string() {
    let app = test_app();
    let item = create_issue(&app, "tok-u1", json!({"title": "Bug A"})).await;
    let id = item["issueId"].as_str().unwrap();
    assert_eq!(item["description"], Value::Null);

    let res = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/issues/{id}"),
            "tok-u1",
            Some(json!({"title": "Bug A!"})),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let items = list_issues(&app, "tok-u1").await;
    assert_eq!(items[0]["title"], "Bug A!");
    assert_eq!(items[0]["description"], "");
}

#[tokio::test]
async fn third_party_update_is_denied_and_leaves_record_intact() {
    let app = test_app();
    let item = create_issue(&app, "tok-u1", json!({"title": "Bug A"})).await;
    let id = item["issueId"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/issues/{id}"),
            "tok-u2",
            Some(json!({"status": "IN PROGRESS"})),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let items = list_issues(&app, "tok-u1").await;
    assert_eq!(items[0]["status"], "TO DO");
}

#[tokio::test]
async fn missing_issue_and_forbidden_issue_are_indistinguishable() {
    let app = test_app();
    let item = create_issue(&app, "tok-u1", json!({"title": "Bug A"})).await;
    let id = item["issueId"].as_str().unwrap();

    let forbidden = app
        .clone()
        .oneshot(request("PATCH", &format!("/issues/{id}"), "tok-u3", Some(json!({"title": "x"}))))
        .await
        .unwrap();
    let missing = app
        .clone()
        .oneshot(request(
            "PATCH",
            "/issues/00000000-0000-4000-8000-000000000000",
            "tok-u3",
            Some(json!({"title": "x"})),
        ))
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(forbidden).await["code"], json_body(missing).await["code"]);
}

#[tokio::test]
async fn only_the_reporter_may_delete() {
    let app = test_app();
    let item = create_issue(&app, "tok-u1", json!({"title": "Bug A", "assigneeId": "U2"})).await;
    let id = item["issueId"].as_str().unwrap();

    // the assignee can update...
    let res = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/issues/{id}"),
            "tok-u2",
            Some(json!({"status": "IN REVIEW"})),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    // ...but not delete
    let res = app
        .clone()
        .oneshot(request("DELETE", &format!("/issues/{id}"), "tok-u2", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(list_issues(&app, "tok-u1").await.len(), 1);

    let res = app
        .clone()
        .oneshot(request("DELETE", &format!("/issues/{id}"), "tok-u1", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(list_issues(&app, "tok-u1").await.is_empty());
}

#[tokio::test]
async fn attachment_upload_records_public_url() {
    let app = test_app();
    let item = create_issue(&app, "tok-u1", json!({"title": "Bug A"})).await;
    let id = item["issueId"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(request("POST", &format!("/issues/{id}/attachment"), "tok-u1", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let upload_url = json_body(res).await["uploadUrl"].as_str().unwrap().to_string();
    assert!(upload_url.contains('?'), "upload URL should carry signature parameters");
    assert!(upload_url.contains(id), "upload URL should be scoped to the issue");

    let public_url = upload_url.split('?').next().unwrap().to_string();
    let items = list_issues(&app, "tok-u1").await;
    assert_eq!(items[0]["attachments"], json!([public_url]));

    // a second upload appends, never replaces
    let res = app
        .clone()
        .oneshot(request("POST", &format!("/issues/{id}/attachment"), "tok-u1", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let items = list_issues(&app, "tok-u1").await;
    let attachments = items[0]["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 2);
    assert_eq!(attachments[0], json!(public_url));
}

#[tokio::test]
async fn attachment_for_unknown_issue_is_denied() {
    let app = test_app();
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/issues/00000000-0000-4000-8000-000000000000/attachment",
            "tok-u1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = test_app();
    let res = app
        .clone()
        .oneshot(Request::builder().uri("/issues").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/issues/new")
                .header("content-type", "application/json")
                .body(Body::from(json!({"title": "x"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_issue_id_is_a_client_error() {
    let app = test_app();
    let res = app
        .clone()
        .oneshot(request("DELETE", "/issues/not-a-uuid", "tok-u1", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
