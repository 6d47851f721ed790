//! Common types used across the tracker

use serde::{Deserialize, Serialize};

pub type ProductId = i64;
pub type WarehouseId = i64;
pub type SupplierId = i64;
pub type CustomerId = i64;
pub type UserId = i64;

/// Roles carried by an authenticated actor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Staff,
}

impl Role {
    /// Roles allowed to run bulk imports and inter-warehouse transfers
    pub fn can_manage_stock(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

/// The identity a state-changing call is attributed to.
///
/// Every movement and import takes an `Actor` explicitly. Actions with no
/// human behind them use [`Actor::system`], which is recorded with a null
/// user id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<UserId>,
    pub role: Role,
}

impl Actor {
    pub fn user(user_id: UserId, role: Role) -> Self {
        Self {
            user_id: Some(user_id),
            role,
        }
    }

    pub fn system() -> Self {
        Self {
            user_id: None,
            role: Role::Admin,
        }
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page.clamp(1, 500))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_offset_skips_earlier_pages() {
        let page = Pagination { page: 3, per_page: 20 };
        assert_eq!(page.limit(), 20);
        assert_eq!(page.offset(), 40);

        let first = Pagination { page: 0, per_page: 10_000 };
        assert_eq!(first.limit(), 500);
        assert_eq!(first.offset(), 0);
    }

    #[test]
    fn test_only_admins_and_managers_manage_stock() {
        assert!(Role::Admin.can_manage_stock());
        assert!(Role::Manager.can_manage_stock());
        assert!(!Role::Staff.can_manage_stock());
        assert_eq!(Actor::system().role, Role::Admin);
        assert!(Actor::system().user_id.is_none());
    }
}
