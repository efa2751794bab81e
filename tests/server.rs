//! HTTP API tests against a live server on an ephemeral port.

use std::sync::Arc;

use dapa_checker::app::App;
use dapa_checker::config::{AuthUser, Config};
use dapa_checker::domain_age::DisabledDomainAge;
use dapa_checker::server::serve;
use dapa_checker_core::metrics::RandomMetrics;
use dapa_checker_core::store::memory::InMemoryStore;
use reqwest::StatusCode;
use serde_json::{json, Value};

// ─── Helpers ────────────────────────────────────────────────────────

const USER_TOKEN: &str = "user-token";
const ADMIN_TOKEN: &str = "admin-token";

fn test_config() -> Config {
    let mut cfg = Config::in_memory();
    cfg.auth.users = vec![
        AuthUser {
            token: USER_TOKEN.into(),
            identity: "alice".into(),
            email: "alice@example.com".into(),
            admin: false,
        },
        AuthUser {
            token: ADMIN_TOKEN.into(),
            identity: "root".into(),
            email: "root@example.com".into(),
            admin: true,
        },
    ];
    cfg
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let cfg = test_config();
        let app = App::with_parts(
            &cfg,
            Arc::new(InMemoryStore::new()),
            Arc::new(RandomMetrics),
            Arc::new(DisabledDomainAge),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            serve(app, listener).await.ok();
        });
        let server = Self {
            base: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
            handle,
        };
        server.wait_ready().await;
        server
    }

    async fn wait_ready(&self) {
        for _ in 0..50 {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status().is_success() {
                    return;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready within 5 seconds");
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn check(&self, url: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self
            .client
            .post(self.url("/metrics"))
            .json(&json!({ "url": url }));
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        req.send().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn error_code(resp: reqwest::Response) -> String {
    let body: Value = resp.json().await.unwrap();
    body["error"]["code"].as_str().unwrap_or_default().to_string()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let srv = TestServer::start().await;
    let body: Value = srv
        .client
        .get(srv.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_metrics_quota_and_history_flow() {
    let srv = TestServer::start().await;

    for _ in 0..3 {
        let resp = srv.check("https://example.com/page", Some(USER_TOKEN)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let rec: Value = resp.json().await.unwrap();
        assert_eq!(rec["domain"], "example.com");
        assert_eq!(rec["identity"], "alice");
        assert!(rec["domain_authority"].as_u64().unwrap() <= 100);
        assert!(rec["spam_score"].as_u64().unwrap() <= 15);
    }

    let resp = srv.check("https://example.com", Some(USER_TOKEN)).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "quota_exceeded");
    assert!(body["error"]["message"].as_str().unwrap().contains('3'));

    let quota: Value = srv
        .client
        .get(srv.url("/quota"))
        .bearer_auth(USER_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quota["used"], 3);
    assert_eq!(quota["remaining"], 0);

    let history: Vec<Value> = srv
        .client
        .get(srv.url("/history"))
        .bearer_auth(USER_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 3);

    let cleared: Value = srv
        .client
        .delete(srv.url("/history"))
        .bearer_auth(USER_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["removed"], 3);
}

#[tokio::test]
async fn test_anonymous_caller() {
    let srv = TestServer::start().await;

    for _ in 0..5 {
        assert_eq!(srv.check("https://example.com", None).await.status(), StatusCode::OK);
    }

    let history: Vec<Value> = srv
        .client
        .get(srv.url("/history"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(history.is_empty());

    let quota: Value = srv
        .client
        .get(srv.url("/quota"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(quota["limit"].is_null());

    let resp = srv.client.delete(srv.url("/history")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_error_codes() {
    let srv = TestServer::start().await;

    let resp = srv.check("example.com", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(resp).await, "invalid_url");

    let resp = srv.check("https://example.com", Some("bogus")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(resp).await, "unauthorized");

    let resp = srv
        .client
        .get(srv.url("/admin/overview"))
        .bearer_auth(USER_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(resp).await, "forbidden");

    let resp = srv.client.get(srv.url("/blog/missing")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(resp).await, "not_found");
}

#[tokio::test]
async fn test_malformed_bodies_get_json_errors() {
    let srv = TestServer::start().await;

    let resp = srv
        .client
        .post(srv.url("/metrics"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(resp).await, "bad_request");

    let resp = srv
        .client
        .post(srv.url("/metrics"))
        .header("content-type", "application/json")
        .body("{\"url\":")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(resp).await, "bad_request");

    let resp = srv
        .client
        .post(srv.url("/blog"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "title": "No content" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(resp).await, "bad_request");

    // Authorization is checked before the body.
    let resp = srv
        .client
        .put(srv.url("/blog/some-id"))
        .bearer_auth(USER_TOKEN)
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_non_ascii_url_is_rejected_not_dropped() {
    let srv = TestServer::start().await;
    let resp = srv.check("日本語.com", Some(USER_TOKEN)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(resp).await, "invalid_url");
}

#[tokio::test]
async fn test_blog_admin_flow() {
    let srv = TestServer::start().await;

    let resp = srv
        .client
        .post(srv.url("/blog"))
        .bearer_auth(USER_TOKEN)
        .json(&json!({ "title": "Nope", "content": "<p>x</p>" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = srv
        .client
        .post(srv.url("/blog"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "title": "Link Building 101", "content": "<p>Links.</p>" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["slug"], "link-building-101");
    assert_eq!(created["author"], "Admin");
    let id = created["id"].as_str().unwrap().to_string();

    let resp = srv
        .client
        .post(srv.url("/blog"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "title": "Link Building 101", "content": "<p>Again.</p>" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = srv
        .client
        .post(srv.url("/blog"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "title": "", "content": "<p>x</p>" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = srv
        .client
        .put(srv.url(&format!("/blog/{}", id)))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "title": "Link Building 102", "content": "<p>More links.</p>" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let post: Value = srv
        .client
        .get(srv.url("/blog/link-building-102"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(post["content"], "<p>More links.</p>");

    let listed: Vec<Value> = srv
        .client
        .get(srv.url("/blog?q=building"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    let resp = srv
        .client
        .delete(srv.url(&format!("/blog/{}", id)))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let recent: Vec<Value> = srv
        .client
        .get(srv.url("/blog/recent"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(recent.is_empty());
}

#[tokio::test]
async fn test_admin_overview_sees_profiles_and_searches() {
    let srv = TestServer::start().await;

    srv.check("https://example.com", Some(USER_TOKEN)).await;
    srv.check("https://example.org", None).await;

    let overview: Value = srv
        .client
        .get(srv.url("/admin/overview"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Anonymous searches are not persisted under the default scope.
    assert_eq!(overview["totals"]["searches"], 1);
    // alice on the search, root on this request.
    assert_eq!(overview["totals"]["profiles"], 2);
    assert_eq!(overview["recent_searches"][0]["domain"], "example.com");
}
