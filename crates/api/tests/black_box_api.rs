use chrono::{Duration as ChronoDuration, Utc};
use invcfg_api::config::AppConfig;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Same router as prod (in-memory store), bound to an ephemeral port.
        let app = invcfg_api::app::build_app(&AppConfig::with_jwt_secret(jwt_secret))
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, sub: &str, groups: &[&str]) -> String {
    let now = Utc::now();
    let claims = json!({
        "sub": sub,
        "username": format!("{sub}-name"),
        "cognito:groups": groups,
        "scope": "rules/read rules/write",
        "iat": now.timestamp(),
        "exp": (now + ChronoDuration::minutes(10)).timestamp(),
    });

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

const SECRET: &str = "test-secret";

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();

    for path in ["/public/health", "/actuator/health"] {
        let res = client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{path}");
        assert!(res.headers().contains_key("x-request-id"));

        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["status"], "OK");
        assert_eq!(body["service"], "inventory-config-service");
        assert!(body["timestamp"].is_string());
    }
}

#[tokio::test]
async fn auth_required_for_rule_reads() {
    let srv = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/api/rules")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], 401);
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["message"], "Authentication required");
    assert_eq!(body["path"], "/api/rules");

    let viewer = mint_jwt(SECRET, "viewer-1", &["VIEWER"]);
    let res = client
        .get(srv.url("/api/rules"))
        .bearer_auth(&viewer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn token_signed_with_other_secret_is_rejected() {
    let srv = TestServer::spawn(SECRET).await;
    let token = mint_jwt("some-other-secret", "admin-1", &["ADMIN"]);

    let res = reqwest::Client::new()
        .get(srv.url("/api/rules"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn writes_require_admin_role() {
    let srv = TestServer::spawn(SECRET).await;
    let viewer = mint_jwt(SECRET, "viewer-1", &["VIEWER"]);

    let res = reqwest::Client::new()
        .post(srv.url("/api/rules"))
        .bearer_auth(&viewer)
        .json(&json!({ "name": "Reorder" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Access denied. Insufficient permissions.");
}

#[tokio::test]
async fn whoami_reflects_token() {
    let srv = TestServer::spawn(SECRET).await;
    let token = mint_jwt(SECRET, "user-42", &["admin"]);

    let res = reqwest::Client::new()
        .get(srv.url("/api/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["userId"], "user-42");
    assert_eq!(body["username"], "user-42-name");
    assert_eq!(body["isAdmin"], true);
    assert_eq!(body["scopes"], json!(["rules/read", "rules/write"]));
}

#[tokio::test]
async fn rule_lifecycle_create_conflict_toggle_delete() {
    let srv = TestServer::spawn(SECRET).await;
    let admin = mint_jwt(SECRET, "admin-1", &["ADMIN"]);
    let client = reqwest::Client::new();

    // Create
    let res = client
        .post(srv.url("/api/rules"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Reorder", "description": "x", "isActive": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["updatedBy"], "admin-1");
    assert_eq!(created["isActive"], true);

    // Same name, different case
    let res = client
        .post(srv.url("/api/rules"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "reorder" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Bad Request");
    assert_eq!(body["message"], "A rule with name 'reorder' already exists");

    // Read back
    let res = client
        .get(srv.url(&format!("/api/rules/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: serde_json::Value = res.json().await.unwrap();
    assert_eq!(fetched, created);

    // Toggle twice
    for expected in [false, true] {
        let res = client
            .patch(srv.url(&format!("/api/rules/{id}/toggle")))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["isActive"], expected);
    }

    // Delete, then it is gone
    let res = client
        .delete(srv.url(&format!("/api/rules/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(srv.url(&format!("/api/rules/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], format!("Inventory rule with id {id} not found"));
    assert_eq!(body["path"], format!("/api/rules/{id}"));
}

#[tokio::test]
async fn update_validates_and_reports_every_field() {
    let srv = TestServer::spawn(SECRET).await;
    let admin = mint_jwt(SECRET, "admin-1", &["ADMIN"]);
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/rules"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Reorder" }))
        .send()
        .await
        .unwrap();
    let id = res.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    let res = client
        .put(srv.url(&format!("/api/rules/{id}")))
        .bearer_auth(&admin)
        .json(&json!({ "name": "x", "description": "d".repeat(501) }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Validation Error");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("name: Name must be between 2 and 100 characters"));
    assert!(message.contains("description: Description cannot exceed 500 characters"));

    // Missing id wins over invalid input.
    let res = client
        .put(srv.url("/api/rules/999"))
        .bearer_auth(&admin)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let other = mint_jwt(SECRET, "admin-2", &["ADMIN"]);
    let res = client
        .put(srv.url(&format!("/api/rules/{id}")))
        .bearer_auth(&other)
        .json(&json!({ "name": "REORDER", "isActive": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["name"], "REORDER");
    assert_eq!(body["isActive"], false);
    assert_eq!(body["updatedBy"], "admin-2");
}

#[tokio::test]
async fn active_and_search_listings() {
    let srv = TestServer::spawn(SECRET).await;
    let admin = mint_jwt(SECRET, "admin-1", &["ADMIN"]);
    let client = reqwest::Client::new();

    for (name, active) in [("Weekly Reorder", true), ("Restock", false)] {
        let res = client
            .post(srv.url("/api/rules"))
            .bearer_auth(&admin)
            .json(&json!({ "name": name, "isActive": active }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let active: serde_json::Value = client
        .get(srv.url("/api/rules/active"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(active.as_array().unwrap().len(), 1);
    assert_eq!(active[0]["name"], "Weekly Reorder");

    let hits: serde_json::Value = client
        .get(srv.url("/api/rules/search?name=REORD"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(hits.as_array().unwrap().len(), 1);

    let all: serde_json::Value = client
        .get(srv.url("/api/rules/search"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.as_array().unwrap().len(), 2);
}
