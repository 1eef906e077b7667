//! Request context construction.
//!
//! Every inbound batch gets exactly one [`RequestContext`]: a fresh set of
//! loaders, the services bound to them, and an [`AuthorizationGate`] for the
//! identity the bearer token resolved to. Nothing in a context outlives the
//! request; only the backing store and the bus are shared.
//!
//! # Token Resolution
//!
//! ```text
//! Authorization: Bearer <token>
//!     │
//!     ├── "qk_..." ──► CredentialService::authenticate ──► owner + CredentialScope
//!     │
//!     └── other ─────► IdentityVerifier::verify ──► IdentityId ──► identities loader
//!
//! unknown / expired / invalid ──► anonymous gate
//! ```
//!
//! A failed resolution never fails the request: the request simply runs
//! anonymously and any operation that needs an identity is refused by the
//! gate.

use crate::config::QuorumConfig;
use crate::loader::Loaders;
use crate::services::{ServiceDeps, Services};
use crate::store::BackingStore;
use async_trait::async_trait;
use chrono::Utc;
use quorum_auth::{AuthorizationGate, CredentialScope, RoleMatrix};
use quorum_types::{ErrorCode, Identity, IdentityId, Page, PageArgs, RequestId, API_KEY_PREFIX};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;

/// Transport-level facts about one inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub request_id: RequestId,
    pub bearer: Option<String>,
    pub client_ip: Option<IpAddr>,
}

impl RequestMeta {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Takes the token from an `Authorization` header value. Anything other
    /// than a well-formed `Bearer` header leaves the request anonymous.
    #[must_use]
    pub fn with_authorization(mut self, header: &str) -> Self {
        self.bearer = parse_bearer(header).map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }
}

/// Extracts the token of an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(char::is_whitespace)?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() && !token.contains(char::is_whitespace))
        .then_some(token)
}

/// Token verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("token expired")]
    Expired,

    #[error("token invalid: {0}")]
    Invalid(String),

    #[error("identity verifier unavailable: {0}")]
    Unavailable(String),
}

impl ErrorCode for VerifyError {
    fn code(&self) -> &'static str {
        match self {
            Self::Expired => "AUTH_TOKEN_EXPIRED",
            Self::Invalid(_) => "AUTH_TOKEN_INVALID",
            Self::Unavailable(_) => "AUTH_VERIFIER_UNAVAILABLE",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// External session/token verifier.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Maps a session token to the identity it was issued for.
    ///
    /// `Ok(None)` means the token is unknown.
    async fn verify(&self, token: &str) -> Result<Option<IdentityId>, VerifyError>;
}

/// Verifier backed by a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticVerifier {
    tokens: HashMap<String, IdentityId>,
}

impl StaticVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, identity: IdentityId) -> Self {
        self.insert(token, identity);
        self
    }

    pub fn insert(&mut self, token: impl Into<String>, identity: IdentityId) {
        self.tokens.insert(token.into(), identity);
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Option<IdentityId>, VerifyError> {
        Ok(self.tokens.get(token).copied())
    }
}

/// Everything one request works with.
pub struct RequestContext {
    pub request_id: RequestId,
    pub gate: AuthorizationGate,
    pub loaders: Arc<Loaders>,
    pub services: Services,
    pub client_ip: Option<IpAddr>,
    pub config: Arc<QuorumConfig>,
}

impl RequestContext {
    /// Key the rate limiter buckets this request under: the credential or
    /// identity once the token has resolved, otherwise the client address.
    /// Unresolvable tokens share the bucket of their address.
    #[must_use]
    pub fn rate_key(&self) -> String {
        if let Some(scope) = self.gate.credential_scope() {
            return scope.credential_id.to_string();
        }
        match (self.gate.identity_id(), self.client_ip) {
            (Some(id), _) => id.to_string(),
            (None, Some(ip)) => format!("ip:{ip}"),
            (None, None) => "anonymous".to_string(),
        }
    }

    /// Normalises pagination arguments against the configured bounds.
    #[must_use]
    pub fn page(&self, args: PageArgs) -> Page {
        self.config.pagination.page(args)
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("identity", &self.gate.identity_id())
            .field("client_ip", &self.client_ip)
            .finish_non_exhaustive()
    }
}

/// Creates request contexts over the shared store.
#[derive(Clone)]
pub struct ContextBuilder {
    store: Arc<dyn BackingStore>,
    matrix: Arc<RoleMatrix>,
    verifier: Arc<dyn IdentityVerifier>,
    config: Arc<QuorumConfig>,
}

impl ContextBuilder {
    pub fn new(
        store: Arc<dyn BackingStore>,
        matrix: Arc<RoleMatrix>,
        verifier: Arc<dyn IdentityVerifier>,
        config: Arc<QuorumConfig>,
    ) -> Self {
        Self {
            store,
            matrix,
            verifier,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &QuorumConfig {
        &self.config
    }

    /// Builds the context for one request and records the caller as seen.
    pub async fn build(&self, meta: RequestMeta) -> RequestContext {
        let ctx = self.prepare(meta).await;
        self.record_activity(&ctx).await;
        ctx
    }

    /// Resolves the bearer and assembles the context without writing
    /// anything.
    pub(crate) async fn prepare(&self, meta: RequestMeta) -> RequestContext {
        let loaders = Arc::new(Loaders::new(Arc::clone(&self.store), &self.config.loader));
        let services = Services::new(ServiceDeps::new(
            Arc::clone(&self.store),
            Arc::clone(&loaders),
            Arc::clone(&self.config),
        ));

        let (identity, scope) = match meta.bearer.as_deref() {
            Some(token) => self.resolve(token, &services, &loaders).await,
            None => (None, None),
        };
        let mut gate = AuthorizationGate::new(Arc::clone(&self.matrix), identity.map(Arc::new));
        if let Some(scope) = scope {
            gate = gate.with_credential_scope(scope);
        }
        tracing::debug!(
            request = %meta.request_id,
            identity = ?gate.identity_id(),
            credential = ?gate.credential_scope().map(|s| s.credential_id),
            "request context built"
        );

        RequestContext {
            request_id: meta.request_id,
            gate,
            loaders,
            services,
            client_ip: meta.client_ip,
            config: Arc::clone(&self.config),
        }
    }

    /// Stamps `last_seen_at` on the authenticated caller.
    pub(crate) async fn record_activity(&self, ctx: &RequestContext) {
        if let (true, Some(id)) = (ctx.gate.is_authenticated(), ctx.gate.identity_id()) {
            if let Err(err) = ctx.services.identities.touch_last_seen(id, Utc::now()).await {
                tracing::warn!(request = %ctx.request_id, identity = %id, error = %err, "failed to record last seen");
            }
        }
    }

    async fn resolve(
        &self,
        token: &str,
        services: &Services,
        loaders: &Loaders,
    ) -> (Option<Identity>, Option<CredentialScope>) {
        if token.starts_with(API_KEY_PREFIX) {
            return match services.credentials.authenticate(token).await {
                Ok(Some(key)) => {
                    let scope = CredentialScope::from_credential(&key.credential);
                    if scope.revoked {
                        tracing::warn!(credential = %key.credential.id, "revoked credential presented");
                    }
                    (Some(key.owner), Some(scope))
                }
                Ok(None) => {
                    tracing::debug!("unknown api key");
                    (None, None)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "api key lookup failed");
                    (None, None)
                }
            };
        }

        match self.verifier.verify(token).await {
            Ok(Some(id)) => {
                let identity = loaders.identities.load(id).await;
                if identity.is_none() {
                    tracing::warn!(identity = %id, "verified token names an unknown identity");
                }
                (identity, None)
            }
            Ok(None) => (None, None),
            Err(err) => {
                if err.is_recoverable() {
                    tracing::warn!(code = err.code(), error = %err, "token verification failed");
                } else {
                    tracing::debug!(code = err.code(), error = %err, "token rejected");
                }
                (None, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::assert_error_codes;

    #[test]
    fn bearer_parsing() {
        assert_eq!(parse_bearer("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer("bearer   qk_123 "), Some("qk_123"));
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("Bearer a b"), None);
        assert_eq!(parse_bearer(""), None);
    }

    #[test]
    fn verify_error_codes() {
        assert_error_codes(
            &[
                VerifyError::Expired,
                VerifyError::Invalid("x".into()),
                VerifyError::Unavailable("x".into()),
            ],
            "AUTH_",
        );
    }
}
