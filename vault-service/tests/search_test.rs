mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::Value;
use vault_service::models::{Role, User};

async fn seeded() -> (TestApp, User, String) {
    let app = TestApp::new();
    let (alice, token) = app.create_user("Alice", "alice@example.com", Role::User).await;
    let (bob, _) = app.create_user("Bob", "bob@example.com", Role::User).await;

    app.seed_file(&alice, "Report-2024.pdf", "application/pdf", 300).await;
    app.seed_file(&alice, "report-draft.docx", "application/msword", 100).await;
    app.seed_file(&alice, "holiday.png", "image/png", 200).await;
    app.seed_file(&bob, "report-bob.pdf", "application/pdf", 50).await;

    (app, alice, token)
}

fn names(body: &Value) -> Vec<String> {
    body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_search_is_scoped_to_caller() {
    let (app, _, token) = seeded().await;

    let (status, body) = app.get("/api/files/search/user", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 20);
    assert_eq!(body["total_pages"], 1);
    assert!(!names(&body).contains(&"report-bob.pdf".to_string()));
}

#[tokio::test]
async fn test_name_prefix_is_case_insensitive() {
    let (app, _, token) = seeded().await;

    let (status, body) = app
        .get("/api/files/search/user?q=REPORT&sortBy=name&sortOrder=asc", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["Report-2024.pdf", "report-draft.docx"]);
}

#[tokio::test]
async fn test_regex_metacharacters_match_literally() {
    let (app, _, token) = seeded().await;

    let (status, body) = app.get("/api/files/search/user?q=.*", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_type_and_size_filters_combine() {
    let (app, _, token) = seeded().await;

    let uri = concat!(
        "/api/files/search/user?fileTypes=application&sizeRange=small",
        "&sortBy=size&sortOrder=desc"
    );
    let (status, body) = app.get(uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["Report-2024.pdf", "report-draft.docx"]);

    let (_, body) = app
        .get("/api/files/search/user?sizeRange=large", Some(&token))
        .await;
    assert_eq!(body["total"], 0);

    let (_, body) = app
        .get("/api/files/search/user?dateRange=today", Some(&token))
        .await;
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn test_paging_reports_totals() {
    let (app, _, token) = seeded().await;

    let (status, body) = app
        .get("/api/files/search/user?limit=2&page=2&sortBy=name&sortOrder=asc", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(names(&body), vec!["report-draft.docx"]);
}

#[tokio::test]
async fn test_invalid_parameters_are_bad_requests() {
    let (app, _, token) = seeded().await;

    for query in [
        "sizeRange=huge",
        "dateRange=decade",
        "sortBy=owner",
        "sortOrder=sideways",
        "page=0",
        "limit=0",
        "limit=101",
        "page=18446744073709551615&limit=100",
    ] {
        let (status, _) = app
            .get(&format!("/api/files/search/user?{}", query), Some(&token))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {}", query);
    }
}

#[tokio::test]
async fn test_search_filters_lists_caller_types() {
    let (app, _, token) = seeded().await;

    let (status, body) = app.get("/api/users/search/filters", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["file_types"],
        serde_json::json!(["application/msword", "application/pdf", "image/png"])
    );
    assert_eq!(
        body["date_ranges"],
        serde_json::json!(["today", "week", "month", "year"])
    );
    assert_eq!(body["size_ranges"].as_array().unwrap().len(), 4);
    assert_eq!(body["size_ranges"][0]["value"], "small");
}
