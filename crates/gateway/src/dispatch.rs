//! HTTP request → action call.
//!
//! Every path and method lands in [`dispatch`]. It parses the request into a
//! [`RequestContext`], checks the access token, resolves the action name
//! and hands the call to the [`Caller`].

use crate::auth;
use crate::caller::Caller;
use crate::context::RequestContext;
use crate::error::GatewayError;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri, header};
use axum::response::{IntoResponse, Response};
use botbridge_core::{Param, ParamSource};
use std::sync::Arc;
use tracing::{debug, warn};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// State shared by every request to one listener.
pub struct ApiState {
    pub caller: Caller,
    pub access_token: String,
}

pub type SharedApiState = Arc<ApiState>;

/// Where the action name and its parameters come from.
#[derive(Debug, PartialEq, Eq)]
pub enum ActionRoute {
    /// `/`: `action` and `params` are themselves parameters.
    Root,
    /// `/<action>`: the whole request is the parameter source.
    Path(String),
}

/// Classify a request path. Percent escapes are decoded before the action
/// name is taken from it.
pub fn resolve_route(path: &str) -> ActionRoute {
    let path = percent_encoding::percent_decode_str(path).decode_utf8_lossy();
    if path == "/" {
        ActionRoute::Root
    } else {
        let action = path.strip_prefix('/').unwrap_or(&path);
        ActionRoute::Path(normalize_action(action).to_string())
    }
}

/// `send_msg_async` and `send_msg` name the same action.
pub fn normalize_action(action: &str) -> &str {
    action.strip_suffix("_async").unwrap_or(action)
}

/// Build the parameter context. Body parsing failures reject the request
/// before auth is looked at.
fn parse_request(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<RequestContext, GatewayError> {
    let mut ctx = RequestContext::new();

    if method == Method::POST {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if content_type.contains("application/json") {
            ctx = ctx.with_json(RequestContext::parse_json(body)?);
        }
        if content_type.contains("application/x-www-form-urlencoded") {
            ctx = ctx.with_form(RequestContext::parse_form(body)?);
        }
    }

    Ok(ctx.with_query(RequestContext::parse_query(uri.query())))
}

/// Fallback handler serving the whole API surface.
pub async fn dispatch(
    State(state): State<SharedApiState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    if method != Method::GET && method != Method::POST {
        warn!(method = %method, path = uri.path(), "Rejected request: unsupported method");
        return Err(GatewayError::UnsupportedMethod(method.to_string()));
    }

    let ctx = parse_request(&method, &uri, &headers, &body).inspect_err(|e| {
        warn!(path = uri.path(), error = %e, "Rejected request: malformed body");
    })?;

    auth::check(&headers, &ctx, &state.access_token)
        .into_result()
        .inspect_err(|e| warn!(path = uri.path(), reason = %e, "Rejected request: auth failed"))?;

    let response = match resolve_route(uri.path()) {
        ActionRoute::Root => {
            let requested = ctx.get("action");
            let action = normalize_action(requested.as_str().unwrap_or_default());
            let params: Param = ctx.get("params");
            debug!(action, "API call received");
            state.caller.call(action, &params).await
        }
        ActionRoute::Path(action) => {
            debug!(action = %action, "API call received");
            state.caller.call(&action, &ctx).await
        }
    };

    let body = serde_json::to_vec(&response)?;
    Ok(([(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use botbridge_core::ActionHandler;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Records every call and echoes the action plus a few lookups.
    #[derive(Default)]
    struct Echo {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ActionHandler for Echo {
        async fn call(&self, action: &str, params: &dyn ParamSource) -> Value {
            self.calls.lock().unwrap().push(action.to_string());
            json!({
                "action": action,
                "message": params.get("message").to_value(),
                "user_id": params.get("user_id").to_value(),
            })
        }
    }

    fn app(token: &str) -> (axum::Router, Arc<Echo>) {
        let echo = Arc::new(Echo::default());
        let state = Arc::new(ApiState {
            caller: Caller::new(echo.clone()),
            access_token: token.to_string(),
        });
        (build_router(state), echo)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str, content_type: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn route_resolution() {
        assert_eq!(resolve_route("/"), ActionRoute::Root);
        assert_eq!(resolve_route("/send_msg"), ActionRoute::Path("send_msg".into()));
        assert_eq!(resolve_route("/send_msg_async"), ActionRoute::Path("send_msg".into()));
        assert_eq!(normalize_action("get_status"), "get_status");
    }

    #[test]
    fn route_is_percent_decoded() {
        assert_eq!(resolve_route("/send%5Fmsg_async"), ActionRoute::Path("send_msg".into()));
        assert_eq!(resolve_route("/send_msg%5Fasync"), ActionRoute::Path("send_msg".into()));
        assert_eq!(resolve_route("/get%20status"), ActionRoute::Path("get status".into()));
        assert_eq!(resolve_route("%2F"), ActionRoute::Root);
    }

    #[tokio::test]
    async fn encoded_path_dispatches_decoded_action() {
        let (app, echo) = app("");
        let response = app.oneshot(get("/send%5Fmsg_async")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["action"], "send_msg");
        assert_eq!(*echo.calls.lock().unwrap(), vec!["send_msg"]);
    }

    #[tokio::test]
    async fn path_dispatch_strips_async_suffix() {
        let (app, echo) = app("");
        for uri in ["/send_msg", "/send_msg_async"] {
            let response = app
                .clone()
                .oneshot(Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "application/json; charset=utf-8"
            );
            assert_eq!(body_json(response).await["action"], "send_msg");
        }
        assert_eq!(*echo.calls.lock().unwrap(), vec!["send_msg", "send_msg"]);
    }

    #[tokio::test]
    async fn root_dispatch_uses_action_and_params() {
        let (app, _) = app("");
        let response = app
            .oneshot(post(
                "/",
                "application/json",
                r#"{"action":"send_private_msg_async","params":{"user_id":7,"message":"hi"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let out = body_json(response).await;
        assert_eq!(out["action"], "send_private_msg");
        assert_eq!(out["user_id"], 7);
        assert_eq!(out["message"], "hi");
    }

    #[tokio::test]
    async fn root_dispatch_from_query_sniffs_params() {
        let (app, _) = app("");
        let response = app
            .oneshot(get("/?action=send_msg&params=%7B%22user_id%22%3A5%7D"))
            .await
            .unwrap();
        let out = body_json(response).await;
        assert_eq!(out["action"], "send_msg");
        assert_eq!(out["user_id"], 5);
    }

    #[tokio::test]
    async fn malformed_json_is_rejected_before_dispatch() {
        let (app, echo) = app("secret");
        // No credential either: the 400 must win over the 401.
        let response = app
            .oneshot(post("/send_msg", "application/json", "{\"message\":"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(echo.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_form_is_rejected() {
        let (app, echo) = app("");
        let response = app
            .oneshot(post("/send_msg", "application/x-www-form-urlencoded", "message=%zz"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(echo.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_methods_get_404() {
        let (app, echo) = app("");
        for method in ["PUT", "DELETE", "PATCH"] {
            let response = app
                .clone()
                .oneshot(Request::builder().method(method).uri("/send_msg").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method}");
        }
        assert!(echo.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn auth_outcomes() {
        let (app, echo) = app("secret");

        let missing = app.clone().oneshot(get("/get_status")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .clone()
            .oneshot(get("/get_status?access_token=nope"))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

        let by_query = app
            .clone()
            .oneshot(get("/get_status?access_token=secret"))
            .await
            .unwrap();
        assert_eq!(by_query.status(), StatusCode::OK);

        let by_header = app
            .oneshot(
                Request::builder()
                    .uri("/get_status")
                    .header("authorization", "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(by_header.status(), StatusCode::OK);

        assert_eq!(echo.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_token_accepts_any_credential() {
        let (app, _) = app("");
        for uri in ["/get_status", "/get_status?access_token=whatever"] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn json_body_beats_form_and_query() {
        let (app, _) = app("");
        let response = app
            .clone()
            .oneshot(post(
                "/send_msg?message=from-query",
                "application/json",
                r#"{"message":"from-json"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["message"], "from-json");

        let response = app
            .oneshot(post(
                "/send_msg?message=from-query",
                "application/x-www-form-urlencoded",
                "message=from-form&user_id=%5B1%2C2%2C3%5D",
            ))
            .await
            .unwrap();
        let out = body_json(response).await;
        assert_eq!(out["message"], "from-form");
        assert_eq!(out["user_id"], json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn get_ignores_body() {
        let (app, _) = app("");
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/send_msg?message=q")
                    .header("content-type", "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "q");
    }
}
