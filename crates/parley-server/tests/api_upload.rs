mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{get, new_user, send, unconfigured_app};
use parley_server::api_upload::MAX_UPLOAD_SIZE;

const BOUNDARY: &str = "parley-test-boundary";

fn multipart(user_id: Option<&str>, field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(user_id) = user_id {
        builder = builder.header(header::COOKIE, common::cookie(user_id));
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn upload_stores_markdown_under_the_sanitized_name() {
    let app = unconfigured_app();
    let user = new_user();

    let (status, body) = send(
        &app.router,
        multipart(Some(&user), "file", "../../notes/menu.txt", b"Soup\nSalad\n"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "File uploaded successfully");
    assert_eq!(body["filename"], "menu.txt");

    let conn = app.pool.get().unwrap();
    let markdown: String = conn
        .query_row(
            "SELECT content_markdown FROM uploaded_files WHERE user_id = ?1",
            [&user],
            |row| row.get(0),
        )
        .unwrap();
    assert!(markdown.starts_with("# File: menu.txt\n\n```"));
    assert!(markdown.contains("Soup\nSalad"));
}

#[tokio::test]
async fn invalid_utf8_is_replaced_not_rejected() {
    let app = unconfigured_app();
    let (status, _) = send(
        &app.router,
        multipart(Some(&new_user()), "file", "blob.bin", &[0x66, 0x6f, 0xff, 0x6f]),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn upload_requires_identity() {
    let app = unconfigured_app();
    let (status, body) = send(&app.router, multipart(None, "file", "a.txt", b"x")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "User not authenticated");
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let app = unconfigured_app();
    let (status, body) = send(
        &app.router,
        multipart(Some(&new_user()), "attachment", "a.txt", b"x"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file uploaded");
}

#[tokio::test]
async fn empty_file_is_rejected() {
    let app = unconfigured_app();
    let (status, body) = send(&app.router, multipart(Some(&new_user()), "file", "a.txt", b"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Uploaded file is empty");
}

#[tokio::test]
async fn oversize_file_is_rejected() {
    let app = unconfigured_app();
    let content = vec![b'a'; MAX_UPLOAD_SIZE + 1];
    let (status, body) = send(
        &app.router,
        multipart(Some(&new_user()), "file", "big.txt", &content),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("too large"));
}

#[tokio::test]
async fn uploads_are_listed_newest_first_per_user() {
    let app = unconfigured_app();
    let user = new_user();
    for name in ["first.txt", "second.txt", "third.txt"] {
        let (status, _) = send(&app.router, multipart(Some(&user), "file", name, b"data")).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    send(&app.router, multipart(Some(&new_user()), "file", "other.txt", b"data")).await;

    let (status, body) = send(&app.router, get("/api/uploads", Some(&user))).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["filename"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["third.txt", "second.txt", "first.txt"]);
    assert!(body[0]["content_markdown"].is_null());
    assert!(body[0]["contentMarkdown"].is_null());
}
