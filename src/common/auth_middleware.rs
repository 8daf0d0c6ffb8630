//! Authentication middleware for axum
//!
//! Resolves the caller's [`Principal`] before any handler runs, so the
//! coordination core only ever sees authenticated requests. Handlers read it
//! with `Extension<Principal>`.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::common::auth::{Principal, TokenService};
use crate::common::config::AuthConfig;
use crate::common::{Error, Result};

/// State for auth middleware
#[derive(Clone)]
pub struct AuthState {
    pub tokens: Option<Arc<TokenService>>,
    pub config: AuthConfig,
}

impl AuthState {
    pub fn new(config: AuthConfig) -> Self {
        let tokens = config
            .jwt_secret
            .as_ref()
            .map(|secret| Arc::new(TokenService::new(secret.as_bytes())));
        Self { tokens, config }
    }

    fn anonymous(&self) -> Principal {
        Principal::new(self.config.anonymous_principal.clone())
    }

    fn is_public(&self, path: &str) -> bool {
        self.config.public_paths.iter().any(|p| {
            path.strip_prefix(p.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    /// Who is making `request`?
    fn principal_of(&self, request: &Request<Body>) -> Result<Principal> {
        if !self.config.enabled || self.is_public(request.uri().path()) {
            return Ok(self.anonymous());
        }
        let tokens = self.tokens.as_ref().ok_or_else(|| {
            Error::Internal("authentication enabled without a token secret".into())
        })?;
        let header = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                Error::Unauthenticated(
                    "provide an Authorization header with 'Bearer <token>'".into(),
                )
            })?;
        tokens.authenticate(header)
    }
}

/// Resolves the caller and adds the [`Principal`] to request extensions
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match state.principal_of(&request) {
        Ok(principal) => {
            tracing::debug!(principal = %principal, "authenticated");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_state_default() {
        let state = AuthState::new(AuthConfig::default());
        assert!(!state.config.enabled);
        assert!(state.tokens.is_none());
        assert_eq!(state.anonymous().identity, "anonymous");
    }

    #[test]
    fn test_public_paths() {
        let state = AuthState::new(AuthConfig::default());
        assert!(state.is_public("/health"));
        assert!(state.is_public("/cluster/status"));
        assert!(!state.is_public("/healthz"));
        assert!(!state.is_public("/input-ports/p1"));
    }

    fn request(path: &str, authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn enabled() -> AuthState {
        AuthState::new(AuthConfig {
            enabled: true,
            jwt_secret: Some("secret".into()),
            ..AuthConfig::default()
        })
    }

    #[test]
    fn test_disabled_auth_is_anonymous() {
        let state = AuthState::new(AuthConfig::default());
        let principal = state.principal_of(&request("/input-ports/p1", None)).unwrap();
        assert_eq!(principal.identity, "anonymous");
    }

    #[test]
    fn test_enabled_auth_requires_token() {
        let state = enabled();
        assert!(matches!(
            state.principal_of(&request("/input-ports/p1", None)),
            Err(Error::Unauthenticated(_))
        ));
        assert_eq!(
            state.principal_of(&request("/health", None)).unwrap().identity,
            "anonymous"
        );

        let token = TokenService::new(b"secret").issue("alice", None).unwrap();
        let header = format!("Bearer {}", token);
        let principal = state
            .principal_of(&request("/input-ports/p1", Some(&header)))
            .unwrap();
        assert_eq!(principal.identity, "alice");
    }
}
