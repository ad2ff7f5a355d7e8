//! Marketplace roles and role allow-lists.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The role a signed-in account acts under.
///
/// The role only drives navigation and rendering in the storefront; the
/// services enforce authorization themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Shopper browsing, buying and tracking orders.
    Customer,
    /// Seller operating a store.
    Vendor,
    /// Marketplace operator approving stores and products.
    Admin,
}

impl Role {
    /// Every role, in display order.
    pub const ALL: [Self; 3] = [Self::Customer, Self::Vendor, Self::Admin];

    /// Wire/session representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Vendor => "vendor",
            Self::Admin => "admin",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Vendor => "Vendor",
            Self::Admin => "Admin",
        }
    }

    /// Path of the landing page for this role after login.
    #[must_use]
    pub const fn home_path(self) -> &'static str {
        match self {
            Self::Customer => "/",
            Self::Vendor => "/vendor",
            Self::Admin => "/admin",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Self::Customer => 0b001,
            Self::Vendor => 0b010,
            Self::Admin => 0b100,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" | "user" => Ok(Self::Customer),
            "vendor" | "seller" => Ok(Self::Vendor),
            "admin" => Ok(Self::Admin),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}

/// A set of roles allowed to reach a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RoleSet(u8);

impl RoleSet {
    /// No role at all.
    pub const EMPTY: Self = Self(0);

    /// Every role; only requires a signed-in session.
    pub const ANY: Self = Self(0b111);

    /// A set containing a single role.
    #[must_use]
    pub const fn only(role: Role) -> Self {
        Self(role.bit())
    }

    /// A set containing each of the given roles.
    #[must_use]
    pub const fn of(roles: &[Role]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < roles.len() {
            bits |= roles[i].bit();
            i += 1;
        }
        Self(bits)
    }

    /// Whether `role` is in the set.
    #[must_use]
    pub const fn contains(self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    /// Whether the set allows no role.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the roles in the set.
    pub fn iter(self) -> impl Iterator<Item = Role> {
        Role::ALL.into_iter().filter(move |r| self.contains(*r))
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Role::as_str).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!("customer".parse::<Role>().unwrap(), Role::Customer);
        assert_eq!("VENDOR".parse::<Role>().unwrap(), Role::Vendor);
        assert_eq!(" admin ".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::Customer);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Vendor).unwrap(), "\"vendor\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_role_set_membership() {
        let set = RoleSet::of(&[Role::Vendor, Role::Admin]);
        assert!(!set.contains(Role::Customer));
        assert!(set.contains(Role::Vendor));
        assert!(set.contains(Role::Admin));

        assert!(RoleSet::only(Role::Admin).contains(Role::Admin));
        assert!(!RoleSet::only(Role::Admin).contains(Role::Vendor));
        assert!(RoleSet::EMPTY.is_empty());
        for role in Role::ALL {
            assert!(RoleSet::ANY.contains(role));
        }
    }

    #[test]
    fn test_role_set_display() {
        assert_eq!(
            RoleSet::of(&[Role::Admin, Role::Customer]).to_string(),
            "{customer, admin}"
        );
    }
}
