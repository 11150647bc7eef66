//! Gateway-injected identity headers extractor.

use std::convert::Infallible;

use agenda_domain::role::StaffRole;
use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use http::request::Parts;
use http::{HeaderMap, StatusCode};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-agenda-user-id";
pub const USER_ROLE_HEADER: &str = "x-agenda-user-role";

/// Staff identity injected by the gateway via `x-agenda-user-id` and
/// `x-agenda-user-role`.
///
/// As a required extractor it rejects with 401 when either header is absent
/// or malformed. As `Option<IdentityHeaders>` it yields `None` instead, which
/// lets public routes accept both staff sessions and anonymous callers.
#[derive(Debug, Clone)]
pub struct IdentityHeaders {
    pub user_id: Uuid,
    pub role: StaffRole,
}

impl IdentityHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<Uuid>().ok())?;
        let role = headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<StaffRole>().ok())?;
        Some(Self { user_id, role })
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl<S> FromRequestParts<S> for IdentityHeaders
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    // axum-core 0.5 defines this as `fn -> impl Future + Send`; read the
    // headers synchronously and return a 'static future.
    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let identity = Self::from_headers(&parts.headers);
        async move { identity.ok_or(StatusCode::UNAUTHORIZED) }
    }
}

impl<S> OptionalFromRequestParts<S> for IdentityHeaders
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Option<Self>, Self::Rejection>> + Send {
        let identity = Self::from_headers(&parts.headers);
        async move { Ok(identity) }
    }
}
