mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, PUBLIC_URL};
use serde_json::json;
use vault_service::models::Role;
use vault_service::services::FileStore;

#[tokio::test]
async fn test_non_owner_cannot_delete() {
    let app = TestApp::new();
    let (alice, _) = app.create_user("Alice", "alice@example.com", Role::User).await;
    let (_, bob_token) = app.create_user("Bob", "bob@example.com", Role::User).await;
    let file = app.seed_file(&alice, "report.pdf", "application/pdf", 10).await;

    let (status, _) = app
        .delete(&format!("/api/files/{}", file.id), Some(&bob_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert!(app.files.find_by_id(&file.id).await.unwrap().is_some());
    assert!(app.objects.contains(&file.storage_key));
}

#[tokio::test]
async fn test_owner_delete_removes_record_and_object() {
    let app = TestApp::new();
    let (alice, token) = app.create_user("Alice", "alice@example.com", Role::User).await;
    let file = app.seed_file(&alice, "report.pdf", "application/pdf", 10).await;

    let (status, body) = app
        .delete(&format!("/api/files/{}", file.id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "File deleted successfully");

    assert!(app.files.find_by_id(&file.id).await.unwrap().is_none());
    assert!(!app.objects.contains(&file.storage_key));
}

#[tokio::test]
async fn test_admin_may_delete_any_file() {
    let app = TestApp::new();
    let (_, admin_token) = app.create_user("Root", "root@example.com", Role::Admin).await;
    let (bob, _) = app.create_user("Bob", "bob@example.com", Role::User).await;
    let file = app.seed_file(&bob, "notes.txt", "text/plain", 4).await;

    let (status, _) = app
        .delete(&format!("/api/files/{}", file.id), Some(&admin_token))
        .await;
    assert_eq!(status, StatusCode::OK);

    assert!(app.files.find_by_id(&file.id).await.unwrap().is_none());
    assert!(!app.objects.contains(&file.storage_key));
}

#[tokio::test]
async fn test_demoted_admin_loses_override() {
    let app = TestApp::new();
    let (mut admin, admin_token) = app.create_user("Root", "root@example.com", Role::Admin).await;
    let (bob, _) = app.create_user("Bob", "bob@example.com", Role::User).await;
    let file = app.seed_file(&bob, "notes.txt", "text/plain", 4).await;

    admin.role = Role::User;
    vault_service::services::UserStore::update(app.users.as_ref(), &admin)
        .await
        .unwrap();

    let (status, _) = app
        .get(&format!("/api/files/{}", file.id), Some(&admin_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_file_is_not_found() {
    let app = TestApp::new();
    let (_, token) = app.create_user("Alice", "alice@example.com", Role::User).await;

    let (status, body) = app.get("/api/files/does-not-exist", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "File not found");

    let (status, _) = app.delete("/api/files/does-not-exist", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_file_includes_owner() {
    let app = TestApp::new();
    let (alice, token) = app.create_user("Alice", "alice@example.com", Role::User).await;
    let file = app.seed_file(&alice, "report.pdf", "application/pdf", 10).await;

    let (status, body) = app
        .get(&format!("/api/files/{}", file.id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], file.id.as_str());
    assert_eq!(body["name"], "report.pdf");
    assert_eq!(body["owner"]["email"], "alice@example.com");
    assert!(body.get("storage_key").is_none());
}

#[tokio::test]
async fn test_update_renames_file() {
    let app = TestApp::new();
    let (alice, token) = app.create_user("Alice", "alice@example.com", Role::User).await;
    let (_, bob_token) = app.create_user("Bob", "bob@example.com", Role::User).await;
    let file = app.seed_file(&alice, "report.pdf", "application/pdf", 10).await;
    let uri = format!("/api/files/{}", file.id);

    let (status, _) = app
        .request(Method::PUT, &uri, Some(&bob_token), Some(json!({ "name": "mine.pdf" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(Method::PUT, &uri, Some(&token), Some(json!({ "name": "final.pdf" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file"]["name"], "final.pdf");

    let stored = app.files.find_by_id(&file.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "final.pdf");

    let (status, _) = app
        .request(Method::PUT, &uri, Some(&token), Some(json!({ "name": "" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_share_link_points_at_download_route() {
    let app = TestApp::new();
    let (alice, token) = app.create_user("Alice", "alice@example.com", Role::User).await;
    let file = app.seed_file(&alice, "report.pdf", "application/pdf", 10).await;

    let (status, body) = app
        .post(&format!("/api/files/{}/share", file.id), Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["link"],
        format!("{}/api/files/{}/download", PUBLIC_URL, file.id)
    );
}

#[tokio::test]
async fn test_download_url_serves_object_until_tampered() {
    let app = TestApp::new();
    let (alice, token) = app.create_user("Alice", "alice@example.com", Role::User).await;
    let (_, bob_token) = app.create_user("Bob", "bob@example.com", Role::User).await;
    let file = app.seed_file(&alice, "report.pdf", "application/pdf", 10).await;
    let uri = format!("/api/files/{}/download", file.id);

    let (status, _) = app.get(&uri, Some(&bob_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expires_in"], 300);

    let url = body["download_url"].as_str().unwrap();
    let path = url.strip_prefix(PUBLIC_URL).unwrap();
    assert!(path.starts_with("/storage/"));

    let (status, body) = app.get(path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_str().map(str::len), Some(10));

    let tampered = format!("{}0", path);
    let (status, _) = app.get(&tampered, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let stored = app.files.find_by_id(&file.id).await.unwrap().unwrap();
    assert_eq!(stored.download_count, 1);
}
