//! Authentication and authorization
//!
//! This module provides:
//! - The [`Principal`] making a request and the [`RequestAction`] it wants
//! - The [`Authorizable`] / [`AuthorizableLookup`] capabilities resources expose
//! - The [`AuthorizationGate`], a per-request [`ResourceAuthorizer`]
//! - A static grant table ([`GrantAuthorizer`]) standing in for a policy engine
//! - HS256 bearer tokens ([`TokenService`]) for identifying principals

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::common::config::Grant;
use crate::common::{Error, Result};

/// Default token lifetime (24 hours)
const TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 3600);

/// Action a principal asks to perform on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestAction {
    Read,
    Write,
}

impl std::fmt::Display for RequestAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestAction::Read => write!(f, "read"),
            RequestAction::Write => write!(f, "write"),
        }
    }
}

/// Authenticated identity behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub identity: String,
}

impl Principal {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.identity)
    }
}

/// Policy engine deciding whether `principal` may perform `action` on `resource`.
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, principal: &Principal, resource: &str, action: RequestAction) -> bool;
}

/// A resource that can answer whether a principal may act on it.
pub trait Authorizable: Send + Sync {
    /// Policy-level resource name, e.g. `/input-ports/{id}`
    fn resource(&self) -> String;

    fn authorize(&self, principal: &Principal, action: RequestAction) -> Result<()>;
}

/// Resolves resource ids to their [`Authorizable`].
pub trait AuthorizableLookup: Send + Sync {
    /// Fails with [`Error::NotFound`] when no such resource exists.
    fn resolve(&self, resource_id: &str) -> Result<Arc<dyn Authorizable>>;
}

/// Per-request authorization capability, one method per action.
pub trait ResourceAuthorizer {
    fn authorize_read(&self, resource_id: &str) -> Result<()>;
    fn authorize_write(&self, resource_id: &str) -> Result<()>;
}

/// Binds a lookup to the principal of one request.
pub struct AuthorizationGate<'a> {
    lookup: &'a dyn AuthorizableLookup,
    principal: &'a Principal,
}

impl<'a> AuthorizationGate<'a> {
    pub fn new(lookup: &'a dyn AuthorizableLookup, principal: &'a Principal) -> Self {
        Self { lookup, principal }
    }

    /// Resolve `resource_id` and ask it to authorize `action`.
    pub fn check(&self, resource_id: &str, action: RequestAction) -> Result<()> {
        let authorizable = self.lookup.resolve(resource_id)?;
        authorizable.authorize(self.principal, action).inspect_err(|_| {
            tracing::warn!(
                principal = %self.principal,
                resource = %authorizable.resource(),
                action = %action,
                "authorization denied"
            );
        })
    }
}

impl ResourceAuthorizer for AuthorizationGate<'_> {
    fn authorize_read(&self, resource_id: &str) -> Result<()> {
        self.check(resource_id, RequestAction::Read)
    }

    fn authorize_write(&self, resource_id: &str) -> Result<()> {
        self.check(resource_id, RequestAction::Write)
    }
}

/// Authorizable backed by an [`Authorizer`] policy for a fixed resource name.
pub struct PolicyAuthorizable {
    resource: String,
    authorizer: Arc<dyn Authorizer>,
}

impl PolicyAuthorizable {
    pub fn new(resource: impl Into<String>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            resource: resource.into(),
            authorizer,
        }
    }
}

impl Authorizable for PolicyAuthorizable {
    fn resource(&self) -> String {
        self.resource.clone()
    }

    fn authorize(&self, principal: &Principal, action: RequestAction) -> Result<()> {
        if self
            .authorizer
            .is_authorized(principal, &self.resource, action)
        {
            Ok(())
        } else {
            Err(Error::AuthorizationDenied(format!(
                "{} may not {} {}",
                principal, action, self.resource
            )))
        }
    }
}

/// Static grant table loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct GrantAuthorizer {
    grants: Vec<Grant>,
}

impl GrantAuthorizer {
    pub fn new(grants: Vec<Grant>) -> Self {
        Self { grants }
    }

    fn resource_matches(pattern: &str, resource: &str) -> bool {
        if pattern == "*" || pattern == resource {
            return true;
        }
        match pattern.strip_suffix("/*") {
            Some(prefix) => resource
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/')),
            None => false,
        }
    }
}

impl Authorizer for GrantAuthorizer {
    fn is_authorized(&self, principal: &Principal, resource: &str, action: RequestAction) -> bool {
        self.grants.iter().any(|g| {
            (g.principal == "*" || g.principal == principal.identity)
                && Self::resource_matches(&g.resource, resource)
                && g.actions.contains(&action)
        })
    }
}

/// Bearer token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal identity)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    pub iat: u64,
}

/// Issues and validates HS256 bearer tokens
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, identity: &str, lifetime: Option<Duration>) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Internal(e.to_string()))?
            .as_secs();
        let claims = Claims {
            sub: identity.to_string(),
            iat: now,
            exp: now + lifetime.unwrap_or(TOKEN_LIFETIME).as_secs(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("token encoding failed: {}", e)))
    }

    /// Validate a raw token and return its principal
    pub fn validate(&self, token: &str) -> Result<Principal> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| Principal::new(data.claims.sub))
            .map_err(|e| Error::Unauthenticated(format!("invalid token: {}", e)))
    }

    /// Authenticate from an `Authorization` header value (`Bearer <token>`)
    pub fn authenticate(&self, header: &str) -> Result<Principal> {
        match header.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
                self.validate(token.trim())
            }
            Some((scheme, _)) => Err(Error::Unauthenticated(format!(
                "unsupported auth scheme: {}",
                scheme
            ))),
            None => Err(Error::Unauthenticated(
                "invalid Authorization header format".into(),
            )),
        }
    }
}
