use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use quill_api::app::{build_app, services::AppServices};
use quill_auth::JwtClaims;
use quill_core::UserId;
use quill_infra::InMemoryBlogStore;
use reqwest::StatusCode;
use serde_json::{json, Value};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, backed by the in-memory store, on an ephemeral port.
        let services = AppServices::new(Arc::new(InMemoryBlogStore::new()));
        let app = build_app(services, JWT_SECRET);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create_post(&self, token: &str, title: &str, hashtags: &[&str]) -> Value {
        let res = self
            .client
            .post(self.url("/posts"))
            .bearer_auth(token)
            .json(&json!({ "title": title, "content": "body", "hashtags": hashtags }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        res.json().await.unwrap()
    }

    async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(user: UserId) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_open() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_reads_are_allowed_but_writes_need_a_token() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get_json("/posts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let res = srv
        .client
        .post(srv.url("/posts"))
        .json(&json!({ "title": "t", "content": "c" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "authentication_required");
}

#[tokio::test]
async fn invalid_token_is_rejected_even_on_reads() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .get(srv.url("/posts"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let now = Utc::now();
    let expired = JwtClaims {
        sub: UserId::new(),
        issued_at: now - ChronoDuration::hours(2),
        expires_at: now - ChronoDuration::hours(1),
    };
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &expired,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();
    let res = srv
        .client
        .get(srv.url("/posts"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_forces_author_to_caller() {
    let srv = TestServer::spawn().await;
    let user = UserId::new();
    let token = mint_jwt(user);

    let res = srv
        .client
        .post(srv.url("/posts"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Hello",
            "content": "World",
            "author": UserId::new().to_string(),
            "hashtags": ["#rust", "axum"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let created: Value = res.json().await.unwrap();
    assert_eq!(created["author"], user.to_string());
    assert_eq!(created["view_count"], 0);
    assert_eq!(created["like_users_count"], 0);
    assert_eq!(created["hashtags"], json!([{ "name": "rust" }, { "name": "axum" }]));
    assert_eq!(created["comments"], json!([]));
}

#[tokio::test]
async fn create_rejects_invalid_bodies() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new());

    let cases = [
        json!({ "content": "no title" }),
        json!({ "title": "   ", "content": "blank title" }),
        json!({ "title": "t", "content": "c", "hashtags": ["two words"] }),
    ];
    for body in cases {
        let res = srv
            .client
            .post(srv.url("/posts"))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error"], "validation_error");
    }
}

#[tokio::test]
async fn retrieve_increments_view_count_for_every_caller() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new());
    let id = id_of(&srv.create_post(&token, "Counted", &[]).await);

    let (status, first) = srv.get_json(&format!("/posts/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["view_count"], 1);

    let res = srv
        .client
        .get(srv.url(&format!("/posts/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let second: Value = res.json().await.unwrap();
    assert_eq!(second["view_count"], 2);

    // The list projection carries no view count.
    let (_, list) = srv.get_json("/posts").await;
    assert!(list[0].get("view_count").is_none());
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get_json(&format!("/posts/{}", UserId::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = srv.get_json("/posts/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn only_the_author_may_update_or_delete() {
    let srv = TestServer::spawn().await;
    let owner = mint_jwt(UserId::new());
    let stranger = mint_jwt(UserId::new());
    let id = id_of(&srv.create_post(&owner, "Mine", &["a"]).await);
    let path = srv.url(&format!("/posts/{id}"));

    let res = srv
        .client
        .put(&path)
        .bearer_auth(&stranger)
        .json(&json!({ "title": "Stolen", "content": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");
    assert_eq!(body["message"], "수정 권한이 없습니다.");

    // Authorization is decided before the body is looked at.
    let res = srv
        .client
        .patch(&path)
        .bearer_auth(&stranger)
        .json(&json!({ "title": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv.client.delete(&path).bearer_auth(&stranger).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "삭제 권한이 없습니다.");

    let res = srv.client.delete(&path).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .put(&path)
        .json(&json!({ "title": "Anon", "content": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "authentication_required");

    let res = srv
        .client
        .patch(&path)
        .json(&json!({ "title": "Anon" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let (_, unchanged) = srv.get_json(&format!("/posts/{id}")).await;
    assert_eq!(unchanged["title"], "Mine");

    let res = srv.client.delete(&path).bearer_auth(&owner).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (status, _) = srv.get_json(&format!("/posts/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_and_patch_update_fields_and_hashtags() {
    let srv = TestServer::spawn().await;
    let user = UserId::new();
    let token = mint_jwt(user);
    let created = srv.create_post(&token, "Draft", &["a", "b"]).await;
    let id = id_of(&created);
    let path = srv.url(&format!("/posts/{id}"));

    // PUT without hashtags keeps the current set.
    let res = srv
        .client
        .put(&path)
        .bearer_auth(&token)
        .json(&json!({ "title": "Final", "content": "done" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["title"], "Final");
    assert_eq!(updated["author"], user.to_string());
    assert_eq!(updated["hashtags"], json!([{ "name": "a" }, { "name": "b" }]));
    assert_eq!(updated["created_date"], created["created_date"]);

    // PUT needs both title and content.
    let res = srv
        .client
        .put(&path)
        .bearer_auth(&token)
        .json(&json!({ "title": "Only title" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // PATCH replaces the hashtag set.
    let res = srv
        .client
        .patch(&path)
        .bearer_auth(&token)
        .json(&json!({ "hashtags": ["c"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let patched: Value = res.json().await.unwrap();
    assert_eq!(patched["title"], "Final");
    assert_eq!(patched["author"], user.to_string());
    assert_eq!(patched["hashtags"], json!([{ "name": "c" }]));

    // An empty list clears it.
    let res = srv
        .client
        .patch(&path)
        .bearer_auth(&token)
        .json(&json!({ "hashtags": [] }))
        .send()
        .await
        .unwrap();
    let cleared: Value = res.json().await.unwrap();
    assert_eq!(cleared["hashtags"], json!([]));
}

#[tokio::test]
async fn hashtags_are_reused_by_name() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new());

    srv.create_post(&token, "First", &["a", "b"]).await;
    srv.create_post(&token, "Second", &["a", "c"]).await;

    let (status, tags) = srv.get_json("/hashtags").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tags, json!([{ "name": "a" }, { "name": "b" }, { "name": "c" }]));
}

#[tokio::test]
async fn list_filters_by_exact_hashtag_name() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new());

    let tagged = id_of(&srv.create_post(&token, "Tagged", &["rust"]).await);
    srv.create_post(&token, "Other", &["rustacean"]).await;
    srv.create_post(&token, "Untagged", &[]).await;

    let (status, list) = srv.get_json("/posts?hashtags__name=rust").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, [tagged.as_str()]);

    let (_, none) = srv.get_json("/posts?hashtags__name=missing").await;
    assert_eq!(none, json!([]));

    let (_, all) = srv.get_json("/posts?hashtags__name=").await;
    assert_eq!(all.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn malformed_query_string_gets_a_json_error() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .get(srv.url("/posts?hashtags__name=a&hashtags__name=b"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let content_type = res.headers()[reqwest::header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("application/json"), "{content_type}");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("hashtags__name"));
}

#[tokio::test]
async fn nul_text_and_oversized_tag_lists_are_validation_errors() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new());
    let id = id_of(&srv.create_post(&token, "Target", &[]).await);

    let too_many: Vec<String> = (0..=quill_blog::MAX_HASHTAGS_PER_POST)
        .map(|i| format!("t{i}"))
        .collect();
    let cases = [
        ("/posts".to_string(), json!({ "title": "t", "content": "a\0b" })),
        ("/posts".to_string(), json!({ "title": "t", "content": "c", "hashtags": too_many })),
        (format!("/posts/{id}/comments"), json!({ "content": "\0" })),
    ];
    for (path, body) in cases {
        let res = srv
            .client
            .post(srv.url(&path))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{path}: {body}");
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error"], "validation_error");
    }
}

#[tokio::test]
async fn comments_attach_to_existing_posts_only() {
    let srv = TestServer::spawn().await;
    let author = mint_jwt(UserId::new());
    let commenter_id = UserId::new();
    let commenter = mint_jwt(commenter_id);
    let id = id_of(&srv.create_post(&author, "Discuss", &[]).await);

    let res = srv
        .client
        .post(srv.url(&format!("/posts/{id}/comments")))
        .bearer_auth(&commenter)
        .json(&json!({
            "content": "first!",
            "author": UserId::new().to_string(),
            "post": UserId::new().to_string(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let comment: Value = res.json().await.unwrap();
    assert_eq!(comment["author"], commenter_id.to_string());
    assert_eq!(comment["post"], id);

    let (_, detail) = srv.get_json(&format!("/posts/{id}")).await;
    assert_eq!(detail["comments"].as_array().unwrap().len(), 1);
    assert_eq!(detail["comments"][0]["content"], "first!");

    let res = srv
        .client
        .post(srv.url(&format!("/posts/{}/comments", UserId::new())))
        .bearer_auth(&commenter)
        .json(&json!({ "content": "hello?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv
        .client
        .post(srv.url(&format!("/posts/{id}/comments")))
        .json(&json!({ "content": "anonymous" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deleting_a_post_removes_its_comments() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new());
    let id = id_of(&srv.create_post(&token, "Short lived", &["gone"]).await);

    for content in ["one", "two"] {
        let res = srv
            .client
            .post(srv.url(&format!("/posts/{id}/comments")))
            .bearer_auth(&token)
            .json(&json!({ "content": content }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = srv
        .client
        .delete(srv.url(&format!("/posts/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    // Commenting on the deleted post now fails; the hashtag itself survives.
    let res = srv
        .client
        .post(srv.url(&format!("/posts/{id}/comments")))
        .bearer_auth(&token)
        .json(&json!({ "content": "three" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let (_, tags) = srv.get_json("/hashtags").await;
    assert_eq!(tags, json!([{ "name": "gone" }]));
}

#[tokio::test]
async fn like_toggles_back_to_the_starting_count() {
    let srv = TestServer::spawn().await;
    let author = mint_jwt(UserId::new());
    let fan = mint_jwt(UserId::new());
    let id = id_of(&srv.create_post(&author, "Likeable", &[]).await);
    let like_url = srv.url(&format!("/posts/{id}/like"));

    let res = srv.client.post(&like_url).bearer_auth(&fan).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let liked: Value = res.json().await.unwrap();
    assert_eq!(liked["liked"], true);
    assert_eq!(liked["like_users_count"], 1);

    let (_, list) = srv.get_json("/posts").await;
    assert_eq!(list[0]["like_users_count"], 1);

    let res = srv.client.post(&like_url).bearer_auth(&fan).send().await.unwrap();
    let unliked: Value = res.json().await.unwrap();
    assert_eq!(unliked["liked"], false);
    assert_eq!(unliked["like_users_count"], 0);

    let res = srv.client.post(&like_url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
