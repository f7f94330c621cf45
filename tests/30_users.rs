mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;
use studio_api::database::StoreError;
use studio_api::storage::{BlobStore, MemoryBlobStore};

/// Blob store whose deletes always fail.
struct UndeletableBlobs(MemoryBlobStore);

#[async_trait]
impl BlobStore for UndeletableBlobs {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        self.0.put(key, bytes, content_type).await
    }

    fn public_url(&self, key: &str) -> String {
        self.0.public_url(key)
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Remote {
            status: 503,
            message: "storage offline".to_string(),
        })
    }
}

const PNG_BASE64: &str = "iVBORw0KGgo=";

#[tokio::test]
async fn created_profile_reads_back() {
    let app = TestApp::new();
    let token = app.token("u1", "Alice@Example.com");

    let created = app
        .post("/users", Some(&token), json!({"username": "alice", "fullName": "Alice"}))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["data"]["email"], "alice@example.com");

    let fetched = app.get("/users/u1", Some(&token)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["data"], created.body["data"]);

    let own = app.get("/users", Some(&token)).await;
    assert_eq!(own.body["data"]["id"], "u1");
}

#[tokio::test]
async fn duplicate_profiles_conflict() {
    let app = TestApp::new();
    let token = app.signed_up("u1", "alice").await;

    let again = app.post("/users", Some(&token), json!({"username": "alice2"})).await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(again.body["message"], "User profile already exists");

    let bob = app.token("u2", "bob@example.com");
    let taken = app.post("/users", Some(&bob), json!({"username": "alice"})).await;
    assert_eq!(taken.status, StatusCode::CONFLICT);
    assert_eq!(taken.body["message"], "Username already taken");
}

#[tokio::test]
async fn updating_someone_else_is_forbidden() {
    let app = TestApp::new();
    app.signed_up("u1", "alice").await;
    let bob = app.signed_up("u2", "bob").await;

    let res = app
        .call(Method::PATCH, "/users/u1", Some(&bob), Some(json!({"fullName": "Mallory"})))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn patch_with_null_full_name_clears_it() {
    let app = TestApp::new();
    let token = app.token("u1", "alice@example.com");
    app.post("/users", Some(&token), json!({"username": "alice", "fullName": "Alice"}))
        .await;

    let renamed = app
        .call(Method::PATCH, "/users/u1", Some(&token), Some(json!({"username": "alice2"})))
        .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.body["data"]["full_name"], "Alice");

    let cleared = app
        .call(Method::PATCH, "/users/u1", Some(&token), Some(json!({"fullName": null})))
        .await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.body["data"]["full_name"], serde_json::Value::Null);
}

#[tokio::test]
async fn unconfirmed_delete_is_refused_without_deleting() {
    let app = TestApp::new();
    let token = app.signed_up("u1", "alice").await;

    let res = app
        .call(Method::DELETE, "/users/u1", Some(&token), Some(json!({"confirmDelete": false})))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        res.body["message"],
        "Account deletion must be confirmed with confirmDelete: true"
    );
    assert!(!app
        .store
        .operations()
        .await
        .iter()
        .any(|op| op.starts_with("delete")));
    assert_eq!(app.get("/users/u1", Some(&token)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn avatar_cleanup_failure_still_deletes_user() {
    let blobs = UndeletableBlobs(MemoryBlobStore::new("http://blobs.test"));
    let app = TestApp::with_blobs(Arc::new(blobs));
    let token = app.signed_up("u1", "alice").await;

    let uploaded = app
        .post(
            "/users/u1/avatar",
            Some(&token),
            json!({"contentType": "image/png", "data": PNG_BASE64}),
        )
        .await;
    assert_eq!(uploaded.status, StatusCode::OK);
    assert!(uploaded.body["data"]["user"]["avatar_url"]
        .as_str()
        .unwrap()
        .starts_with("http://blobs.test/avatars/u1/"));

    let res = app
        .call(Method::DELETE, "/users/u1", Some(&token), Some(json!({"confirmDelete": true})))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["id"], "u1");
    assert_eq!(res.body["data"]["cascade"]["status"], "partial");

    assert_eq!(app.get("/users/u1", Some(&token)).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn avatar_rejects_non_images() {
    let app = TestApp::new();
    let token = app.signed_up("u1", "alice").await;

    let res = app
        .post("/users/u1/avatar", Some(&token), json!({"contentType": "text/html", "data": "PGI+"}))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Validation failed");
}

#[tokio::test]
async fn availability_is_public() {
    let app = TestApp::new();
    app.signed_up("u1", "alice").await;

    let res = app
        .get("/users/availability?username=alice&email=new@example.com", None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"], json!({"emailAvailable": true, "usernameAvailable": false}));

    let missing = app.get("/users/availability", None).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}
