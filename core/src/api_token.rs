//! Personal API tokens.
//!
//! Tokens look like `hd_<8 hex>_<56 hex>`: 32 random bytes, hex encoded, with the
//! first 8 characters split off as a lookup prefix. Only the SHA-256 of the full
//! token is stored; verification looks candidates up by prefix and compares hashes
//! in constant time.

use crate::environment::Clock;
use crate::{StoreError, StoreFuture};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Literal prefix of every token.
pub const TOKEN_PREFIX: &str = "hd_";
/// Random bytes per token.
pub const TOKEN_RANDOM_BYTES: usize = 32;
/// Hex characters used as lookup prefix.
pub const TOKEN_PREFIX_LEN: usize = 8;
/// Requests per hour granted to new tokens.
pub const DEFAULT_RATE_LIMIT: i32 = 1000;
/// Maximum token name length.
pub const MAX_NAME_LEN: usize = 100;
/// Shown next to a freshly generated token.
pub const SHOW_ONCE_WARNING: &str = "Save this token now. It won't be shown again.";

const TOKEN_SECRET_LEN: usize = TOKEN_RANDOM_BYTES * 2 - TOKEN_PREFIX_LEN;

/// Scopes a token may carry, with descriptions.
pub const VALID_SCOPES: &[(&str, &str)] = &[
    ("*", "Full access (inherits all user permissions)"),
    ("tickets:read", "View tickets"),
    ("tickets:write", "Create and update tickets"),
    ("tickets:delete", "Delete tickets"),
    ("articles:read", "Read ticket articles"),
    ("articles:write", "Add articles and replies"),
    ("users:read", "View user information"),
    ("queues:read", "View queue information"),
    ("admin:*", "Admin operations (agents only)"),
];

/// Errors from token generation and verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The presented string is not shaped like a token.
    #[error("invalid token format")]
    InvalidFormat,

    /// No stored token matches.
    #[error("invalid token")]
    Invalid,

    /// The token was revoked.
    #[error("token revoked")]
    Revoked,

    /// The token is past its expiry.
    #[error("token expired")]
    Expired,

    /// Unknown scope requested.
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// A customer asked for an admin scope.
    #[error("customers cannot have admin scopes")]
    AdminScopeForCustomer,

    /// Bad `expires_in` value.
    #[error("invalid expiration: {0}")]
    InvalidExpiration(String),

    /// Bad token name.
    #[error("invalid token name: {0}")]
    InvalidName(String),

    /// Repository failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TokenError {
    /// Whether this error means the caller presented bad credentials.
    #[must_use]
    pub const fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat | Self::Invalid | Self::Revoked | Self::Expired
        )
    }
}

/// Kind of user a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiTokenUserType {
    /// Agent (staff) user.
    Agent,
    /// Customer user.
    Customer,
}

impl ApiTokenUserType {
    /// Value stored in `api_tokens.user_type`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for ApiTokenUserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiTokenUserType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(Self::Agent),
            "customer" => Ok(Self::Customer),
            other => Err(StoreError::Database(format!("unknown user type {other:?}"))),
        }
    }
}

/// A stored token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiToken {
    /// Row id.
    pub id: i64,
    /// Owner.
    pub user_id: i64,
    /// Owner kind.
    pub user_type: ApiTokenUserType,
    /// Display name.
    pub name: String,
    /// Lookup prefix (8 hex chars).
    pub prefix: String,
    /// SHA-256 of the full token, hex encoded.
    #[serde(skip)]
    pub token_hash: String,
    /// Granted scopes; empty inherits the user's permissions.
    pub scopes: Vec<String>,
    /// Expiry, if any.
    pub expires_at: Option<DateTime<Utc>>,
    /// Last successful use.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Address of the last use.
    pub last_used_ip: Option<String>,
    /// Requests per hour.
    pub rate_limit: i32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Creating user, if different from the owner.
    pub created_by: Option<i64>,
    /// Revocation time.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Revoking user.
    pub revoked_by: Option<i64>,
}

impl ApiToken {
    /// Whether the token is past its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }

    /// Whether the token was revoked.
    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Neither revoked nor expired.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }

    /// Whether the token grants `scope`.
    ///
    /// No scopes means the token inherits the user's permissions. `*` grants
    /// everything; `area:*` grants every `area:<x>`.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        if self.scopes.is_empty() {
            return true;
        }
        self.scopes.iter().any(|s| {
            if s == "*" || s == scope {
                return true;
            }
            s.strip_suffix('*')
                .filter(|prefix| prefix.ends_with(':'))
                .is_some_and(|prefix| scope.len() > prefix.len() && scope.starts_with(prefix))
        })
    }

    /// List representation with the computed activity flag.
    #[must_use]
    pub fn summary(&self, now: DateTime<Utc>) -> ApiTokenSummary {
        ApiTokenSummary {
            id: self.id,
            name: self.name.clone(),
            prefix: self.prefix.clone(),
            scopes: self.scopes.clone(),
            expires_at: self.expires_at,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
            is_active: self.is_active(now),
        }
    }
}

/// A token as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTokenSummary {
    /// Row id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Lookup prefix.
    pub prefix: String,
    /// Granted scopes.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub scopes: Vec<String>,
    /// Expiry.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Last use.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Neither revoked nor expired.
    pub is_active: bool,
}

/// Request to create a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTokenCreateRequest {
    /// Display name, 1 to 100 characters.
    pub name: String,
    /// Requested scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// `30d`, `6m`, `1y` or `never`.
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// Response to a create request; the only time the full token is revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTokenCreateResponse {
    /// Row id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Lookup prefix.
    pub prefix: String,
    /// Full token.
    pub token: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Reminder that the token will not be shown again.
    pub warning: String,
}

/// Parse `expires_in`. `never` and blank mean no expiry.
///
/// # Errors
///
/// Returns [`TokenError::InvalidExpiration`] for an unknown suffix or a count that
/// is not a positive integer.
pub fn parse_expiration(raw: &str) -> Result<Option<Duration>, TokenError> {
    let value = raw.trim().to_ascii_lowercase();
    if value.is_empty() || value == "never" {
        return Ok(None);
    }

    let invalid = || TokenError::InvalidExpiration(format!("{raw} (use 30d, 90d, 1y, etc.)"));
    let (count, days_per_unit) = if let Some(n) = value.strip_suffix('d') {
        (n, 1)
    } else if let Some(n) = value.strip_suffix('m') {
        (n, 30)
    } else if let Some(n) = value.strip_suffix('y') {
        (n, 365)
    } else {
        return Err(invalid());
    };

    let count: i64 = count.parse().map_err(|_| invalid())?;
    if count <= 0 {
        return Err(TokenError::InvalidExpiration(
            "expiration must be positive".into(),
        ));
    }
    count
        .checked_mul(days_per_unit)
        .and_then(Duration::try_days)
        .map(Some)
        .ok_or_else(invalid)
}

/// Check requested scopes against [`VALID_SCOPES`] and the user type.
///
/// # Errors
///
/// Returns [`TokenError::InvalidScope`] or [`TokenError::AdminScopeForCustomer`].
pub fn validate_scopes(scopes: &[String], user_type: ApiTokenUserType) -> Result<(), TokenError> {
    for scope in scopes {
        if !VALID_SCOPES.iter().any(|(s, _)| s == scope) {
            return Err(TokenError::InvalidScope(scope.clone()));
        }
        if user_type == ApiTokenUserType::Customer && scope.starts_with("admin:") {
            return Err(TokenError::AdminScopeForCustomer);
        }
    }
    Ok(())
}

/// Scopes offered to a user type.
#[must_use]
pub fn scopes_for(user_type: ApiTokenUserType) -> Vec<(&'static str, &'static str)> {
    VALID_SCOPES
        .iter()
        .filter(|(scope, _)| {
            user_type == ApiTokenUserType::Agent || !scope.starts_with("admin:")
        })
        .copied()
        .collect()
}

/// SHA-256 of a raw token, hex encoded.
#[must_use]
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Generate a fresh `(full token, lookup prefix)` pair.
#[must_use]
pub fn generate_raw_token() -> (String, String) {
    let mut bytes = [0u8; TOKEN_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let random = hex::encode(bytes);
    let (prefix, secret) = random.split_at(TOKEN_PREFIX_LEN);
    (format!("{TOKEN_PREFIX}{prefix}_{secret}"), prefix.to_string())
}

/// Extract the lookup prefix from a presented token, checking its shape.
///
/// # Errors
///
/// Returns [`TokenError::InvalidFormat`] unless `raw` is `hd_<8 hex>_<56 hex>`.
pub fn token_prefix(raw: &str) -> Result<&str, TokenError> {
    let body = raw.strip_prefix(TOKEN_PREFIX).ok_or(TokenError::InvalidFormat)?;
    let (prefix, secret) = body.split_once('_').ok_or(TokenError::InvalidFormat)?;
    let is_hex = |s: &str| s.bytes().all(|b| b.is_ascii_hexdigit());
    if prefix.len() != TOKEN_PREFIX_LEN
        || secret.len() != TOKEN_SECRET_LEN
        || !is_hex(prefix)
        || !is_hex(secret)
    {
        return Err(TokenError::InvalidFormat);
    }
    Ok(prefix)
}

/// Fields of a token about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApiToken {
    /// Owner.
    pub user_id: i64,
    /// Owner kind.
    pub user_type: ApiTokenUserType,
    /// Display name.
    pub name: String,
    /// Lookup prefix.
    pub prefix: String,
    /// SHA-256 hex.
    pub token_hash: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Requests per hour.
    pub rate_limit: i32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Creating user.
    pub created_by: Option<i64>,
}

/// Token storage.
pub trait ApiTokenRepository: Send + Sync {
    /// Insert a token and return it with its id.
    fn insert<'a>(&'a self, token: &'a NewApiToken) -> StoreFuture<'a, ApiToken>;

    /// One token by id.
    fn get(&self, id: i64) -> StoreFuture<'_, Option<ApiToken>>;

    /// Tokens sharing a lookup prefix, revoked ones included.
    fn by_prefix<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<ApiToken>>;

    /// Tokens of one user, newest first, excluding revoked ones.
    fn list_by_user(&self, user_id: i64, user_type: ApiTokenUserType) -> StoreFuture<'_, Vec<ApiToken>>;

    /// All tokens, newest first.
    fn list_all(&self, include_revoked: bool) -> StoreFuture<'_, Vec<ApiToken>>;

    /// Mark a token revoked; unknown or already revoked ids are `NotFound`.
    fn revoke(&self, id: i64, revoked_by: i64, at: DateTime<Utc>) -> StoreFuture<'_, ()>;

    /// Record a successful use.
    fn touch<'a>(&'a self, id: i64, ip: Option<&'a str>, at: DateTime<Utc>) -> StoreFuture<'a, ()>;
}

/// Token lifecycle on top of an [`ApiTokenRepository`].
#[derive(Clone)]
pub struct ApiTokenService {
    repo: Arc<dyn ApiTokenRepository>,
    clock: Arc<dyn Clock>,
}

impl ApiTokenService {
    /// Create a service.
    #[must_use]
    pub fn new(repo: Arc<dyn ApiTokenRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Current time from the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Generate a token. The response carries the full token exactly once.
    ///
    /// # Errors
    ///
    /// Validation errors for the name, scopes or expiration; store failures.
    pub async fn generate(
        &self,
        req: &ApiTokenCreateRequest,
        user_id: i64,
        user_type: ApiTokenUserType,
        created_by: i64,
    ) -> Result<ApiTokenCreateResponse, TokenError> {
        let name = req.name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(TokenError::InvalidName(format!(
                "name must be 1 to {MAX_NAME_LEN} characters"
            )));
        }
        validate_scopes(&req.scopes, user_type)?;
        let lifetime = parse_expiration(req.expires_in.as_deref().unwrap_or(""))?;

        let now = self.clock.now();
        let (raw, prefix) = generate_raw_token();
        let new = NewApiToken {
            user_id,
            user_type,
            name: name.to_string(),
            prefix,
            token_hash: hash_token(&raw),
            scopes: req.scopes.clone(),
            expires_at: lifetime.map(|d| now + d),
            rate_limit: DEFAULT_RATE_LIMIT,
            created_at: now,
            created_by: (created_by > 0).then_some(created_by),
        };
        let stored = self.repo.insert(&new).await?;

        tracing::info!(
            token_id = stored.id,
            user_id,
            user_type = %user_type,
            prefix = %stored.prefix,
            "api token created"
        );

        Ok(ApiTokenCreateResponse {
            id: stored.id,
            name: stored.name,
            prefix: stored.prefix,
            token: raw,
            scopes: stored.scopes,
            expires_at: stored.expires_at,
            created_at: stored.created_at,
            warning: SHOW_ONCE_WARNING.to_string(),
        })
    }

    /// Verify a presented token and return its record.
    ///
    /// # Errors
    ///
    /// [`TokenError::InvalidFormat`], [`TokenError::Invalid`], [`TokenError::Revoked`]
    /// or [`TokenError::Expired`]; store failures.
    pub async fn verify(&self, raw: &str) -> Result<ApiToken, TokenError> {
        let result = self.verify_inner(raw).await;
        match &result {
            Ok(token) => {
                metrics::counter!("api_token.verified").increment(1);
                tracing::debug!(token_id = token.id, "api token verified");
            }
            Err(e) => {
                metrics::counter!("api_token.rejected").increment(1);
                tracing::debug!(error = %e, "api token rejected");
            }
        }
        result
    }

    async fn verify_inner(&self, raw: &str) -> Result<ApiToken, TokenError> {
        let prefix = token_prefix(raw)?;
        let presented = hash_token(raw);
        let candidates = self.repo.by_prefix(prefix).await?;

        let token = candidates
            .into_iter()
            .find(|t| constant_time_eq::constant_time_eq(t.token_hash.as_bytes(), presented.as_bytes()))
            .ok_or(TokenError::Invalid)?;

        if token.is_revoked() {
            return Err(TokenError::Revoked);
        }
        if token.is_expired(self.clock.now()) {
            return Err(TokenError::Expired);
        }
        Ok(token)
    }

    /// Active tokens of a user.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn list_for_user(
        &self,
        user_id: i64,
        user_type: ApiTokenUserType,
    ) -> Result<Vec<ApiTokenSummary>, TokenError> {
        let now = self.clock.now();
        let tokens = self.repo.list_by_user(user_id, user_type).await?;
        Ok(tokens.iter().map(|t| t.summary(now)).collect())
    }

    /// Revoke one of the caller's own tokens. Tokens of other users are reported as
    /// not found.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] for unknown or foreign tokens; store failures.
    pub async fn revoke(
        &self,
        id: i64,
        user_id: i64,
        user_type: ApiTokenUserType,
        revoked_by: i64,
    ) -> Result<(), TokenError> {
        let token = self
            .repo
            .get(id)
            .await?
            .filter(|t| t.user_id == user_id && t.user_type == user_type)
            .ok_or_else(|| StoreError::not_found("api token", id))?;
        self.repo.revoke(token.id, revoked_by, self.clock.now()).await?;
        tracing::info!(token_id = id, revoked_by, "api token revoked");
        Ok(())
    }

    /// Revoke any token.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] for unknown tokens; store failures.
    pub async fn revoke_admin(&self, id: i64, revoked_by: i64) -> Result<(), TokenError> {
        self.repo.revoke(id, revoked_by, self.clock.now()).await?;
        tracing::info!(token_id = id, revoked_by, "api token revoked by admin");
        Ok(())
    }

    /// All tokens.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn list_all(&self, include_revoked: bool) -> Result<Vec<ApiToken>, TokenError> {
        Ok(self.repo.list_all(include_revoked).await?)
    }

    /// Record a successful use.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn touch(&self, id: i64, ip: Option<&str>) -> Result<(), TokenError> {
        Ok(self.repo.touch(id, ip, self.clock.now()).await?)
    }
}
