use std::net::SocketAddr;
use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::auth::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, posts, profiles};

pub fn build_app(state: AppState) -> Router {
    let public = Router::new()
        .merge(auth::public_router())
        .merge(profiles::public_router());

    let private = Router::new()
        .merge(auth::private_router())
        .merge(profiles::private_router())
        .merge(posts::private_router())
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .nest("/api", public.merge(private))
        .route("/", get(|| async { "API running" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
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
pub(crate) mod testing {
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Method, Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::build_app;
    use crate::auth::middleware::TOKEN_HEADER;
    use crate::state::AppState;

    /// The full router over in-memory stores.
    pub struct TestApp {
        pub state: AppState,
        pub router: Router,
    }

    impl TestApp {
        pub fn new() -> Self {
            let state = AppState::fake();
            Self {
                router: build_app(state.clone()),
                state,
            }
        }

        /// Registers a user with password `secret1` and returns its token.
        pub async fn register(&self, name: &str, email: &str) -> String {
            let body = serde_json::json!({ "name": name, "email": email, "password": "secret1" });
            let (status, body) = send(self, Method::POST, "/api/users", None, Some(body)).await;
            assert_eq!(status, StatusCode::OK, "register {email}: {body}");
            body["token"].as_str().unwrap().to_string()
        }

        pub fn user_id(&self, token: &str) -> Uuid {
            self.state.keys.verify(token).unwrap()
        }
    }

    async fn dispatch(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn send(
        app: &TestApp,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            req = req.header(TOKEN_HEADER, token);
        }
        let body = match body {
            Some(v) => {
                req = req.header(CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        dispatch(app, req.body(body).unwrap()).await
    }

    pub async fn send_raw(app: &TestApp, method: Method, path: &str, raw: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(raw.to_string()))
            .unwrap();
        dispatch(app, req).await
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{send, TestApp};
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn root_reports_running() {
        let app = TestApp::new();
        let (status, body) = send(&app, Method::GET, "/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "API running");
    }

    #[tokio::test]
    async fn public_and_private_methods_share_a_path() {
        let app = TestApp::new();
        let (status, _) = send(&app, Method::GET, "/api/profile", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, Method::DELETE, "/api/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "No token, authorization denied");
    }
}
