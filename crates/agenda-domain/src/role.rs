//! Staff role carried by the gateway identity headers.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Permission level of an authenticated staff session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Staff,
    Admin,
}

impl StaffRole {
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl FromStr for StaffRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staff" => Ok(Self::Staff),
            "admin" | "administrator" => Ok(Self::Admin),
            _ => Err(()),
        }
    }
}
