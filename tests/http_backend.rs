//! Wire-level checks for the GraphQL client: auth header, payload
//! shape, and error mapping.

use httpmock::prelude::*;
use serde_json::json;

use trailfs::api::{ApiError, Backend, IssuePatch, OpCtx};
use trailfs::api::http::HttpBackend;

fn backend_for(server: &MockServer) -> HttpBackend {
    HttpBackend::with_endpoint(
        "lin_api_test".to_string(),
        server.url("/graphql"),
        true,
    )
}

#[tokio::test]
async fn teams_query_is_authenticated_and_decoded() {
    let server = MockServer::start_async().await;
    let mock = server.mock_async(|when, then| {
        when.method(POST)
            .path("/graphql")
            .header("authorization", "lin_api_test")
            .body_contains("teams");
        then.status(200).json_body(json!({
            "data": { "teams": { "nodes": [{
                "id": "team-1",
                "key": "ENG",
                "name": "Engineering",
                "icon": null,
                "createdAt": "2026-01-01T00:00:00.000Z",
                "updatedAt": "2026-01-02T00:00:00.000Z"
            }]}}
        }));
    }).await;

    let backend = backend_for(&server);
    let teams = backend.teams(OpCtx::read()).await.unwrap();
    mock.assert_async().await;
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].key, "ENG");

    let stats = backend.stats();
    assert_eq!(stats, vec![("teams", 1)]);
}

#[tokio::test]
async fn issue_update_translates_patch_keys_to_wire_fields() {
    let server = MockServer::start_async().await;
    let mock = server.mock_async(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_contains("issueUpdate")
            .body_contains("\"stateId\":\"state-2\"")
            .body_contains("\"removedLabelIds\":[\"label-1\"]");
        then.status(200).json_body(json!({
            "data": { "issueUpdate": { "success": true, "issue": {
                "id": "issue-1",
                "identifier": "ENG-1",
                "title": "T",
                "description": "",
                "priority": 0,
                "dueDate": null,
                "estimate": null,
                "team": { "id": "team-1" },
                "state": { "id": "state-2" },
                "assignee": null,
                "creator": null,
                "project": null,
                "projectMilestone": null,
                "cycle": null,
                "parent": null,
                "labels": { "nodes": [] },
                "createdAt": "2026-01-01T00:00:00.000Z",
                "updatedAt": "2026-01-03T00:00:00.000Z"
            }}}
        }));
    }).await;

    let backend = backend_for(&server);
    let mut patch = IssuePatch::new();
    patch.set("status", json!("state-2"));
    patch.set("removed_labels", json!(["label-1"]));
    let issue = backend.update_issue(OpCtx::mutation(), "issue-1", &patch).await.unwrap();
    mock.assert_async().await;
    assert_eq!(issue.state_id, "state-2");
    assert!(issue.label_ids.is_empty());
}

#[tokio::test]
async fn graphql_errors_become_backend_errors() {
    let server = MockServer::start_async().await;
    server.mock_async(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(json!({
            "data": null,
            "errors": [{ "message": "rate limited" }]
        }));
    }).await;

    let backend = backend_for(&server);
    let err = backend.teams(OpCtx::read()).await.unwrap_err();
    match err {
        ApiError::Backend(message) => assert!(message.contains("rate limited")),
        other => panic!("expected backend error, got {other:?}"),
    }
}
