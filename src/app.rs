use std::net::SocketAddr;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{auth, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_req(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut b = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        b.body(Body::from(body.to_string())).unwrap()
    }

    fn bare_req(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut b = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        b.body(Body::empty()).unwrap()
    }

    async fn register_and_login(app: &Router) -> (String, String) {
        let (status, user) = call(
            app,
            json_req(
                "POST",
                "/users",
                None,
                json!({"name": "Ada", "email": "ada@x.com", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, login) = call(
            app,
            json_req(
                "POST",
                "/auth/login",
                None,
                json!({"email": "ada@x.com", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        (
            user["id"].as_str().unwrap().to_string(),
            login["token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn register_hides_password_hash() {
        let app = build_app(AppState::fake());
        let (status, user) = call(
            &app,
            json_req(
                "POST",
                "/users",
                None,
                json!({"name": "Ada", "email": "ada@x.com", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user["email"], "ada@x.com");
        assert!(user.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_is_conflict() {
        let app = build_app(AppState::fake());
        register_and_login(&app).await;
        let (status, body) = call(
            &app,
            json_req(
                "POST",
                "/users",
                None,
                json!({"name": "Ada", "email": "ada@x.com", "password": "other"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn login_returns_session_token_and_user() {
        let app = build_app(AppState::fake());
        let (user_id, _) = register_and_login(&app).await;
        let (status, body) = call(
            &app,
            json_req(
                "POST",
                "/auth/login",
                None,
                json!({"email": "ADA@x.com ", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token"].as_str().unwrap().split('.').count(), 3);
        assert_eq!(body["user"]["id"], user_id.as_str());
        assert_eq!(body["user"]["email"], "ada@x.com");
        assert!(body["user"].get("password_hash").is_none());
    }

    #[test]
    fn listen_address_comes_from_state_config() {
        let state = AppState::fake();
        let addr = state.config.bind_addr().unwrap();
        assert_eq!(addr, "127.0.0.1:0".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn bad_login_is_unauthorized_with_generic_message() {
        let app = build_app(AppState::fake());
        register_and_login(&app).await;
        let (s1, b1) = call(
            &app,
            json_req("POST", "/auth/login", None, json!({"email": "ada@x.com", "password": "nope"})),
        )
        .await;
        let (s2, b2) = call(
            &app,
            json_req("POST", "/auth/login", None, json!({"email": "who@x.com", "password": "nope"})),
        )
        .await;
        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s2, StatusCode::UNAUTHORIZED);
        assert_eq!(b1, b2);
    }

    #[tokio::test]
    async fn protected_routes_require_bearer_token() {
        let app = build_app(AppState::fake());
        let (status, _) = call(&app, bare_req("GET", "/users", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, body) = call(&app, bare_req("GET", "/users", Some("not.a.jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn profile_crud_flow() {
        let app = build_app(AppState::fake());
        let (id, token) = register_and_login(&app).await;

        let (status, me) = call(&app, bare_req("GET", "/me", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["id"], id.as_str());

        let (status, list) = call(&app, bare_req("GET", "/users", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["count"], 1);

        let (status, updated) = call(
            &app,
            json_req(
                "PUT",
                &format!("/users/{id}"),
                Some(&token),
                json!({"name": "", "email": "new@x.com"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Ada");
        assert_eq!(updated["email"], "new@x.com");

        let (status, updated) = call(
            &app,
            json_req(
                "PUT",
                &format!("/users/{id}/avatar"),
                Some(&token),
                json!({"avatar_url": "https://cdn.example.com/a.png"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["avatar_url"], "https://cdn.example.com/a.png");

        let (status, _) = call(&app, bare_req("DELETE", &format!("/users/{id}"), Some(&token))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&app, bare_req("GET", &format!("/users/{id}"), Some(&token))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, bare_req("DELETE", &format!("/users/{id}"), Some(&token))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
