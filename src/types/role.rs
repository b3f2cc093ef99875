use std::fmt;

use serde::{Deserialize, Serialize};

/// Role is the capability level derived from the two persisted flags.
///
/// The ordering is total: `Superuser > Staff > Standard`. Superuser always
/// implies staff, so the flag pair `(is_staff = false, is_superuser = true)`
/// normalizes to `Superuser` and round-trips back with `is_staff = true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Standard,
    Staff,
    Superuser,
}

impl Role {
    #[must_use]
    pub const fn from_flags(is_staff: bool, is_superuser: bool) -> Role {
        if is_superuser {
            Role::Superuser
        } else if is_staff {
            Role::Staff
        } else {
            Role::Standard
        }
    }

    /// Returns the persisted `(is_staff, is_superuser)` flag pair.
    #[must_use]
    pub const fn flags(self) -> (bool, bool) {
        match self {
            Role::Standard => (false, false),
            Role::Staff => (true, false),
            Role::Superuser => (true, true),
        }
    }

    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Role::Staff | Role::Superuser)
    }

    #[must_use]
    pub const fn is_superuser(self) -> bool {
        matches!(self, Role::Superuser)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Standard => "standard",
            Role::Staff => "staff",
            Role::Superuser => "superuser",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superuser_implies_staff() {
        assert!(Role::Superuser.is_staff());
        assert_eq!(Role::from_flags(false, true), Role::Superuser);
        assert_eq!(Role::Superuser.flags(), (true, true));
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Superuser > Role::Staff);
        assert!(Role::Staff > Role::Standard);
    }

    #[test]
    fn test_flags_round_trip() {
        for role in [Role::Standard, Role::Staff, Role::Superuser] {
            let (staff, superuser) = role.flags();
            assert_eq!(Role::from_flags(staff, superuser), role);
        }
    }
}
