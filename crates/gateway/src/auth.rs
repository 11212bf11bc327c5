//! Access-token check for API callers.
//!
//! The credential comes from the `Authorization` header (the scheme word is
//! ignored) or, when that header is absent, the `access_token` query
//! parameter. "Nothing sent" and "wrong token sent" are reported
//! differently.

use crate::context::RequestContext;
use crate::error::GatewayError;
use axum::http::{HeaderMap, StatusCode, header};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Ok,
    Unauthorized,
    Forbidden,
}

impl AuthOutcome {
    pub fn status_code(self) -> StatusCode {
        match self {
            AuthOutcome::Ok => StatusCode::OK,
            AuthOutcome::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthOutcome::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    pub fn into_result(self) -> Result<(), GatewayError> {
        match self {
            AuthOutcome::Ok => Ok(()),
            AuthOutcome::Unauthorized => Err(GatewayError::AuthMissing),
            AuthOutcome::Forbidden => Err(GatewayError::AuthMismatch),
        }
    }
}

/// Pick the caller's credential: header first, query second.
///
/// `Bearer abc` yields `abc`; a header without a space is taken whole.
/// Header bytes are used as sent, so a non-ASCII header still counts as
/// present.
pub fn resolve_credential<'a>(
    authorization: Option<&'a [u8]>,
    query_token: Option<&'a str>,
) -> &'a [u8] {
    match authorization.filter(|h| !h.is_empty()) {
        Some(header) => match header.iter().position(|&b| b == b' ') {
            Some(space) => &header[space + 1..],
            None => header,
        },
        None => query_token.unwrap_or_default().as_bytes(),
    }
}

/// Compare a resolved credential against the configured token.
///
/// An empty configured token disables auth entirely.
pub fn check_credential(credential: &[u8], token: &str) -> AuthOutcome {
    if token.is_empty() {
        return AuthOutcome::Ok;
    }
    if credential.is_empty() {
        AuthOutcome::Unauthorized
    } else if credential == token.as_bytes() {
        AuthOutcome::Ok
    } else {
        AuthOutcome::Forbidden
    }
}

/// Check a request's headers and query against the configured token.
pub fn check(headers: &HeaderMap, ctx: &RequestContext, token: &str) -> AuthOutcome {
    if token.is_empty() {
        return AuthOutcome::Ok;
    }
    let authorization = headers.get(header::AUTHORIZATION).map(|v| v.as_bytes());
    let credential = resolve_credential(authorization, ctx.query_value("access_token"));
    check_credential(credential, token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    fn query_with(token: &str) -> RequestContext {
        RequestContext::new().with_query(vec![("access_token".into(), token.into())])
    }

    #[test]
    fn empty_token_bypasses_auth() {
        assert_eq!(check(&HeaderMap::new(), &RequestContext::new(), ""), AuthOutcome::Ok);
        assert_eq!(check(&headers_with("Bearer junk"), &query_with("x"), ""), AuthOutcome::Ok);
    }

    #[test]
    fn missing_credential_is_unauthorized() {
        let outcome = check(&HeaderMap::new(), &RequestContext::new(), "secret");
        assert_eq!(outcome, AuthOutcome::Unauthorized);
        assert_eq!(outcome.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn wrong_credential_is_forbidden() {
        assert_eq!(
            check(&headers_with("Bearer nope"), &RequestContext::new(), "secret"),
            AuthOutcome::Forbidden
        );
        assert_eq!(
            check(&HeaderMap::new(), &query_with("nope"), "secret"),
            AuthOutcome::Forbidden
        );
    }

    #[test]
    fn matching_credential_passes() {
        assert_eq!(
            check(&headers_with("Bearer secret"), &RequestContext::new(), "secret"),
            AuthOutcome::Ok
        );
        assert_eq!(
            check(&headers_with("Token secret"), &RequestContext::new(), "secret"),
            AuthOutcome::Ok
        );
        assert_eq!(check(&HeaderMap::new(), &query_with("secret"), "secret"), AuthOutcome::Ok);
    }

    #[test]
    fn header_takes_priority_over_query() {
        assert_eq!(
            check(&headers_with("Bearer wrong"), &query_with("secret"), "secret"),
            AuthOutcome::Forbidden
        );
    }

    #[test]
    fn header_without_scheme_used_whole() {
        assert_eq!(resolve_credential(Some(b"secret"), None), b"secret");
        assert_eq!(resolve_credential(Some(b"Bearer "), Some("q")), b"");
        assert_eq!(resolve_credential(Some(b""), Some("q")), b"q");
        assert_eq!(resolve_credential(None, Some("q")), b"q");
        assert_eq!(resolve_credential(None, None), b"");
    }

    #[test]
    fn non_ascii_header_is_still_a_credential() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xe4\xbd\xa0").unwrap(),
        );
        // The header is present, so the query token is not consulted.
        assert_eq!(check(&headers, &query_with("secret"), "secret"), AuthOutcome::Forbidden);
        assert_eq!(check(&headers, &RequestContext::new(), "secret"), AuthOutcome::Forbidden);
    }

    #[test]
    fn non_ascii_token_matches_bytewise() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_bytes("Bearer 你好".as_bytes()).unwrap(),
        );
        assert_eq!(check(&headers, &RequestContext::new(), "你好"), AuthOutcome::Ok);
    }

    #[test]
    fn outcome_maps_to_errors() {
        assert!(AuthOutcome::Ok.into_result().is_ok());
        assert!(matches!(
            AuthOutcome::Unauthorized.into_result(),
            Err(GatewayError::AuthMissing)
        ));
        assert!(matches!(
            AuthOutcome::Forbidden.into_result(),
            Err(GatewayError::AuthMismatch)
        ));
    }
}
