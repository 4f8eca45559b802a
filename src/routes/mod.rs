pub mod admin;
mod extract;
pub mod frontend;
pub mod session;

use axum::Router;
use crate::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(session::router())
        .merge(admin::router())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::admin::AdminGate;
    use crate::lease::LeaseManager;
    use crate::lease::clock::ManualClock;
    use crate::store::MemoryLeaseStore;

    const SECRET: &str = "test-admin-secret";

    struct TestApp {
        router: Router,
        clock: Arc<ManualClock>,
    }

    struct TestResponse {
        status: StatusCode,
        body: Value,
    }

    impl TestApp {
        fn new() -> Self {
            let store = Arc::new(MemoryLeaseStore::new());
            let clock = Arc::new(ManualClock::new(Utc::now()));
            let store_timeout = std::time::Duration::from_secs(5);

            let state = AppState {
                leases: LeaseManager::new(
                    store.clone(),
                    clock.clone(),
                    chrono::Duration::minutes(10),
                    store_timeout,
                ),
                admin: AdminGate::new(
                    store,
                    clock.clone(),
                    Some(SECRET.to_string()),
                    store_timeout,
                ),
            };

            Self {
                router: api_router().with_state(state),
                clock,
            }
        }

        async fn post(&self, path: &str, body: Value, idempotency_key: Option<&str>) -> TestResponse {
            let mut req = Request::builder()
                .method("POST")
                .uri(path)
                .header("Content-Type", "application/json");
            if let Some(key) = idempotency_key {
                req = req.header("Idempotency-Key", key);
            }
            self.send(req.body(Body::from(body.to_string())).unwrap())
                .await
        }

        async fn post_raw(&self, path: &str, content_type: Option<&str>, body: &str) -> TestResponse {
            let mut req = Request::builder().method("POST").uri(path);
            if let Some(content_type) = content_type {
                req = req.header("Content-Type", content_type);
            }
            self.send(req.body(Body::from(body.to_string())).unwrap())
                .await
        }

        async fn send(&self, req: Request<Body>) -> TestResponse {
            let response = self.router.clone().oneshot(req).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
                .await
                .unwrap();
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

            TestResponse { status, body }
        }

        async fn issue(&self, referrer: Option<&str>, user_name: Option<&str>) -> String {
            let res = self
                .post(
                    "/api/generate_code",
                    json!({ "adminSecret": SECRET, "referrerCode": referrer, "userName": user_name }),
                    None,
                )
                .await;
            assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
            res.body["newCode"].as_str().unwrap().to_string()
        }

        async fn authenticate(&self, code: &str) -> TestResponse {
            self.post("/api/authenticate", json!({ "accessCode": code }), None)
                .await
        }
    }

    #[tokio::test]
    async fn full_session_lifecycle() {
        let app = TestApp::new();
        let a1 = app.issue(None, None).await;

        let res = app.authenticate(&a1).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["success"], true);
        assert_eq!(res.body["referrerCode"], Value::Null);
        let s1 = res.body["sessionId"].as_str().unwrap().to_string();

        let res = app.authenticate(&a1).await;
        assert_eq!(res.status, StatusCode::CONFLICT);
        assert_eq!(res.body["error"], "ALREADY_LEASED");
        assert_eq!(res.body["success"], false);

        let res = app.post("/api/ping", json!({ "sessionId": s1 }), None).await;
        assert_eq!(res.status, StatusCode::OK);

        let res = app.post("/api/logout", json!({ "sessionId": s1 }), None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["success"], true);

        let res = app.authenticate(&a1).await;
        assert_eq!(res.status, StatusCode::OK);
        let s2 = res.body["sessionId"].as_str().unwrap();
        assert_ne!(s2, s1);
    }

    #[tokio::test]
    async fn authenticate_reports_referrer_and_user_name() {
        let app = TestApp::new();
        let a1 = app.issue(None, None).await;
        let a2 = app.issue(Some(&a1), Some("Alice")).await;

        let res = app.authenticate(&a2).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["referrerCode"], a1.as_str());
        assert_eq!(res.body["userName"], "Alice");
    }

    #[tokio::test]
    async fn authenticate_input_errors() {
        let app = TestApp::new();

        let res = app.authenticate("REF_neverissued").await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["error"], "NOT_FOUND");

        let res = app.authenticate("").await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["error"], "MISSING_INPUT");

        let res = app.post("/api/authenticate", json!({}), None).await;
        assert_eq!(res.body["error"], "MISSING_INPUT");
    }

    #[tokio::test]
    async fn ping_and_logout_validate_input() {
        let app = TestApp::new();

        let res = app.post("/api/ping", json!({}), None).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);

        let res = app.post("/api/ping", json!({ "sessionId": "gone" }), None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["error"], "NOT_FOUND");

        let res = app.post("/api/logout", json!({ "sessionId": "gone" }), None).await;
        assert_eq!(res.status, StatusCode::OK);

        let res = app.post("/api/logout", json!({ "sessionId": "" }), None).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bodyless_requests_report_missing_input() {
        let app = TestApp::new();

        for path in ["/api/logout", "/api/ping", "/api/authenticate"] {
            let res = app.post_raw(path, None, "").await;
            assert_eq!(res.status, StatusCode::BAD_REQUEST, "{path}");
            assert_eq!(res.body["success"], false, "{path}");
            assert_eq!(res.body["error"], "MISSING_INPUT", "{path}");

            let res = app.post_raw(path, Some("application/json"), "").await;
            assert_eq!(res.body["error"], "MISSING_INPUT", "{path}");

            let res = app
                .post_raw(path, Some("text/plain"), r#"{"sessionId":"x"}"#)
                .await;
            assert_eq!(res.body["error"], "MISSING_INPUT", "{path}");
        }

        let res = app.post_raw("/api/generate_code", None, "").await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);
        assert_eq!(res.body["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn malformed_bodies_get_structured_errors() {
        let app = TestApp::new();

        let res = app
            .post_raw("/api/logout", Some("application/json"), r#"{"sessionId":5}"#)
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["success"], false);
        assert_eq!(res.body["error"], "INVALID_INPUT");
        assert!(res.body["message"].as_str().unwrap().contains("Invalid JSON"));

        let res = app
            .post_raw("/api/authenticate", Some("application/json; charset=utf-8"), "{not json")
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["error"], "INVALID_INPUT");

        let res = app
            .post_raw("/api/admin/deactivate", Some("application/json"), r#""REF_abc""#)
            .await;
        assert_eq!(res.body["error"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn short_idempotency_key_is_rejected() {
        let app = TestApp::new();
        let code = app.issue(None, None).await;

        let res = app
            .post("/api/authenticate", json!({ "accessCode": code }), Some("k-1"))
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["error"], "INVALID_INPUT");

        // The code was not claimed by the rejected request.
        assert_eq!(app.authenticate(&code).await.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn ping_after_logout_is_not_found() {
        let app = TestApp::new();
        let code = app.issue(None, None).await;
        let session = app.authenticate(&code).await.body["sessionId"]
            .as_str()
            .unwrap()
            .to_string();

        app.post("/api/logout", json!({ "sessionId": session }), None)
            .await;
        let res = app.post("/api/ping", json!({ "sessionId": session }), None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn idle_session_is_superseded_after_timeout() {
        let app = TestApp::new();
        let code = app.issue(None, None).await;
        let first = app.authenticate(&code).await.body["sessionId"]
            .as_str()
            .unwrap()
            .to_string();

        app.clock.advance(chrono::Duration::minutes(11));
        let res = app.authenticate(&code).await;
        assert_eq!(res.status, StatusCode::OK);

        let res = app.post("/api/ping", json!({ "sessionId": first }), None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn idempotency_key_replays_claim() {
        let app = TestApp::new();
        let code = app.issue(None, None).await;

        let first = app
            .post("/api/authenticate", json!({ "accessCode": code }), Some("retry-key-0001-abcd"))
            .await;
        let retry = app
            .post("/api/authenticate", json!({ "accessCode": code }), Some("retry-key-0001-abcd"))
            .await;
        assert_eq!(retry.status, StatusCode::OK);
        assert_eq!(retry.body["sessionId"], first.body["sessionId"]);

        let other = app
            .post("/api/authenticate", json!({ "accessCode": code }), Some("retry-key-0002-abcd"))
            .await;
        assert_eq!(other.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn generate_code_rejections() {
        let app = TestApp::new();

        let res = app
            .post("/api/generate_code", json!({ "adminSecret": "wrong" }), None)
            .await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);
        assert_eq!(res.body["error"], "UNAUTHORIZED");

        let res = app
            .post(
                "/api/generate_code",
                json!({ "adminSecret": SECRET, "referrerCode": "REF_missing" }),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["error"], "INVALID_REFERRER");
    }

    #[tokio::test]
    async fn deactivated_code_cannot_authenticate_or_refer() {
        let app = TestApp::new();
        let code = app.issue(None, None).await;
        let session = app.authenticate(&code).await.body["sessionId"]
            .as_str()
            .unwrap()
            .to_string();

        let res = app
            .post(
                "/api/admin/deactivate",
                json!({ "adminSecret": SECRET, "code": code }),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::OK);

        let res = app.post("/api/ping", json!({ "sessionId": session }), None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);

        let res = app.authenticate(&code).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);
        assert_eq!(res.body["error"], "INACTIVE");

        let res = app
            .post(
                "/api/generate_code",
                json!({ "adminSecret": SECRET, "referrerCode": code }),
                None,
            )
            .await;
        assert_eq!(res.body["error"], "INVALID_REFERRER");
    }

    #[tokio::test]
    async fn referrals_are_listed() {
        let app = TestApp::new();
        let parent = app.issue(None, None).await;
        let child = app.issue(Some(&parent), Some("Bob")).await;

        let res = app
            .post(
                "/api/admin/referrals",
                json!({ "adminSecret": SECRET, "code": parent }),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::OK);
        let referrals = res.body["referrals"].as_array().unwrap();
        assert_eq!(referrals.len(), 1);
        assert_eq!(referrals[0]["code"], child.as_str());
        assert_eq!(referrals[0]["userName"], "Bob");
        assert_eq!(referrals[0]["isActive"], true);
        assert!(referrals[0].get("sessionId").is_none());
    }
}
