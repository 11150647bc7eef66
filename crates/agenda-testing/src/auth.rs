//! Mock staff identity for tests.
//!
//! Services behind the gateway receive `x-agenda-user-id` + `x-agenda-user-role`
//! headers. `MockAdmin` produces the same headers so no gateway is needed.

use agenda_core::identity::{USER_ID_HEADER, USER_ROLE_HEADER};
use agenda_domain::role::StaffRole;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

/// Configurable identity injected into test requests.
pub struct MockAdmin {
    pub user_id: Uuid,
    pub role: StaffRole,
}

impl MockAdmin {
    pub fn new() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            role: StaffRole::Admin,
        }
    }

    pub fn staff() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            role: StaffRole::Staff,
        }
    }

    /// Return headers as if the gateway injected them.
    pub fn headers(&self) -> HeaderMap {
        let role = match self.role {
            StaffRole::Admin => "admin",
            StaffRole::Staff => "staff",
        };
        let mut map = HeaderMap::new();
        map.insert(
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from_str(&self.user_id.to_string()).unwrap(),
        );
        map.insert(
            HeaderName::from_static(USER_ROLE_HEADER),
            HeaderValue::from_static(role),
        );
        map
    }
}

impl Default for MockAdmin {
    fn default() -> Self {
        Self::new()
    }
}
