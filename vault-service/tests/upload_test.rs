mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::TestApp;
use vault_service::models::Role;
use vault_service::services::{FileStore, ObjectStore};

#[tokio::test]
async fn test_upload_creates_record_and_object() {
    let app = TestApp::new();
    let (user, token) = app.create_user("Alice", "alice@example.com", Role::User).await;

    let (status, body) = app
        .upload(&token, "hello.txt", "text/plain", b"hello world")
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "hello.txt");
    assert_eq!(body["size"], 11);
    assert_eq!(body["content_type"], "text/plain");
    assert_eq!(body["owner_id"], user.id.as_str());
    assert_eq!(
        body["checksum"],
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );

    let id = body["id"].as_str().unwrap();
    let record = app.files.find_by_id(id).await.unwrap().unwrap();
    assert!(record.storage_key.starts_with(&format!("{}/", user.id)));
    assert_eq!(
        app.objects.get(&record.storage_key).await.unwrap(),
        b"hello world".to_vec()
    );

    let (status, body) = app.get("/api/files", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_failed_record_insert_removes_object() {
    let app = TestApp::new();
    let (_, token) = app.create_user("Alice", "alice@example.com", Role::User).await;
    app.files.set_fail_inserts(true);

    let (status, body) = app.upload(&token, "hello.txt", "text/plain", b"hello").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Upstream storage failure");

    assert!(app.objects.is_empty());
    assert_eq!(app.files.count_all().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_object_delete_keeps_record() {
    let app = TestApp::new();
    let (user, token) = app.create_user("Alice", "alice@example.com", Role::User).await;
    let file = app.seed_file(&user, "keep.bin", "application/octet-stream", 8).await;
    app.objects.set_fail_deletes(true);

    let (status, _) = app
        .delete(&format!("/api/files/{}", file.id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    assert!(app.files.find_by_id(&file.id).await.unwrap().is_some());
    assert!(app.objects.contains(&file.storage_key));
}

#[tokio::test]
async fn test_upload_without_file_field_is_bad_request() {
    let app = TestApp::new();
    let (_, token) = app.create_user("Alice", "alice@example.com", Role::User).await;

    let body = "--b\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--b--\r\n";
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/files/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=b")
        .body(Body::from(body))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file uploaded");
    assert!(app.objects.is_empty());
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = TestApp::new();
    let (_, token) = app.create_user("Alice", "alice@example.com", Role::User).await;

    let (status, _) = app
        .upload(&token, "big.bin", "application/octet-stream", &[7u8; 1025])
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.objects.is_empty());
    assert_eq!(app.files.count_all().await.unwrap(), 0);

    let (status, _) = app
        .upload(&token, "edge.bin", "application/octet-stream", &[7u8; 1024])
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_upload_requires_token() {
    let app = TestApp::new();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/files/upload")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=b")
        .body(Body::from("--b--\r\n"))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.objects.is_empty());
}
