//! Custom Axum extractors.
//!
//! - [`AuthenticatedUser`]: verifies the `Authorization: Bearer` API token
//! - [`AdminUser`]: an authenticated agent holding `admin:*`
//! - [`CorrelationId`]: the request correlation ID (header or generated)
//! - [`ClientIp`]: the client address, recorded as a token's last-use IP
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(user: AuthenticatedUser, client_ip: ClientIp) -> Result<Json<Value>, AppError> {
//!     user.require_scope("tickets:read")?;
//!     tracing::info!(user_id = user.user_id(), client_ip = %client_ip.0, "listing tickets");
//!     Ok(Json(json!({})))
//! }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use helpdesk_core::api_token::{ApiToken, ApiTokenUserType};
use helpdesk_core::group::ADMIN_GROUP;
use helpdesk_core::permission::{PermissionSubjectKind, RW, effective};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use uuid::Uuid;

/// Scope that unlocks the admin routes.
pub const ADMIN_SCOPE: &str = "admin:*";

/// Correlation ID for request tracing.
///
/// Extracts the correlation ID from the `X-Correlation-ID` header,
/// or generates a new UUID v4 if not present.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // The middleware already resolved one
        if let Some(id) = parts.extensions.get::<Uuid>() {
            return Ok(Self(*id));
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Client IP address.
///
/// # Priority
///
/// 1. `X-Forwarded-For` (first IP in the list)
/// 2. `X-Real-IP`
/// 3. Connection IP, when the server was started with connect info
/// 4. `127.0.0.1`
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = extract_client_ip(&parts.headers, parts.extensions.get());

        Ok(Self(ip))
    }
}

/// Extract client IP from headers or connection info.
fn extract_client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> IpAddr {
    // Try X-Forwarded-For (take first IP)
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    let real_ip = headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
    if let Some(ip) = real_ip {
        return ip;
    }

    connect_info.map_or(IpAddr::V4(Ipv4Addr::LOCALHOST), |info| info.0.ip())
}

/// Pull the token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Caller authenticated by an API token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// The verified token record.
    pub token: ApiToken,
}

impl AuthenticatedUser {
    /// Owner of the token.
    #[must_use]
    pub const fn user_id(&self) -> i64 {
        self.token.user_id
    }

    /// Whether the owner is an agent or a customer.
    #[must_use]
    pub const fn user_type(&self) -> ApiTokenUserType {
        self.token.user_type
    }

    /// Fail with 403 unless the token grants `scope`.
    ///
    /// # Errors
    ///
    /// [`AppError::forbidden`] if the scope is missing.
    pub fn require_scope(&self, scope: &str) -> Result<(), AppError> {
        if self.token.has_scope(scope) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("token lacks scope {scope}")))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("missing bearer token"))?;
        let token = state.tokens.verify(raw).await?;

        let ip = extract_client_ip(&parts.headers, parts.extensions.get()).to_string();
        if let Err(e) = state.tokens.touch(token.id, Some(&ip)).await {
            tracing::warn!(token_id = token.id, error = %e, "failed to record token use");
        }

        Ok(Self { token })
    }
}

/// Agent token with the admin scope.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

impl AdminUser {
    /// Id of the acting agent.
    #[must_use]
    pub const fn user_id(&self) -> i64 {
        self.0.user_id()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        let allowed = user.user_type() == ApiTokenUserType::Agent
            && if user.token.scopes.is_empty() {
                in_admin_group(state, user.user_id()).await?
            } else {
                user.token.has_scope(ADMIN_SCOPE)
            };
        if !allowed {
            tracing::warn!(user_id = user.user_id(), "admin route denied");
            return Err(AppError::forbidden("admin access required"));
        }
        Ok(Self(user))
    }
}

/// Unscoped agent tokens inherit the agent's own rights: `rw` on the admin group.
async fn in_admin_group(state: &AppState, user_id: i64) -> Result<bool, AppError> {
    let groups = state.groups.list(Some(ADMIN_GROUP)).await?;
    let Some(admin) = groups.iter().find(|g| g.name == ADMIN_GROUP) else {
        return Ok(false);
    };
    let matrix = state
        .permissions
        .for_subject(PermissionSubjectKind::Agent, &user_id.to_string())
        .await?;
    Ok(effective(&matrix, admin.id, RW))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let req = Request::builder()
            .header(CORRELATION_ID_HEADER, uuid.to_string())
            .body(())
            .expect("Valid request");

        let (mut parts, _) = req.into_parts();
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_generates_new() {
        let req = Request::builder().body(()).expect("Valid request");

        let (mut parts, _) = req.into_parts();
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_ne!(correlation_id.0, Uuid::nil());
    }

    #[tokio::test]
    async fn test_client_ip_from_x_forwarded_for() {
        let req = Request::builder()
            .header("X-Forwarded-For", "203.0.113.1, 198.51.100.1")
            .body(())
            .expect("Valid request");

        let (mut parts, _) = req.into_parts();
        let client_ip = ClientIp::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(client_ip.0.to_string(), "203.0.113.1");
    }

    #[tokio::test]
    async fn test_client_ip_from_x_real_ip() {
        let req = Request::builder()
            .header("X-Real-IP", "198.51.100.42")
            .body(())
            .expect("Valid request");

        let (mut parts, _) = req.into_parts();
        let client_ip = ClientIp::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(client_ip.0.to_string(), "198.51.100.42");
    }

    #[tokio::test]
    async fn test_client_ip_fallback() {
        let req = Request::builder().body(()).expect("Valid request");

        let (mut parts, _) = req.into_parts();
        let client_ip = ClientIp::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(client_ip.0.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer hd_abc".parse().expect("header"));
        assert_eq!(bearer_token(&headers), Some("hd_abc"));

        headers.insert(header::AUTHORIZATION, "bearer  hd_abc ".parse().expect("header"));
        assert_eq!(bearer_token(&headers), Some("hd_abc"));

        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwdw==".parse().expect("header"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer ".parse().expect("header"));
        assert_eq!(bearer_token(&headers), None);
    }
}
