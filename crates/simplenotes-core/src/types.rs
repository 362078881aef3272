use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Numeric user identifier, as issued by the user store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Current wall-clock time as UTC epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Bitmask of user capabilities. Flags combine with `|` and are tested with
/// [`Permission::has`]; [`Permission::ADMINISTRATOR`] overrides every check
/// made through [`Permission::has_effective`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(pub i64);

impl Permission {
    pub const NONE: Permission = Permission(0);
    /// Immune to every restriction; cannot be modified through the API.
    pub const ADMINISTRATOR: Permission = Permission(1 << 0);
    pub const CREATE_NOTES: Permission = Permission(1 << 1);
    /// Modify owned or shared notes.
    pub const EDIT_NOTES: Permission = Permission(1 << 2);
    pub const DELETE_NOTES: Permission = Permission(1 << 3);
    pub const SEE_HIDDEN_NOTES: Permission = Permission(1 << 4);
    /// Edit mutable fields of other users, but not their permissions.
    pub const MANAGE_USERS: Permission = Permission(1 << 5);
    pub const DELETE_USERS: Permission = Permission(1 << 6);
    /// Grant and revoke permissions of non-administrators.
    pub const MANAGE_PERMS: Permission = Permission(1 << 7);
    /// Suspend accounts. Administrators and permission managers are immune.
    pub const PUNISH_USERS: Permission = Permission(1 << 8);
    /// Call lookup endpoints outside the core note surface.
    pub const PERFORM_LOOKUP: Permission = Permission(1 << 9);

    pub const fn bits(self) -> i64 {
        self.0
    }

    /// True when every bit of `target` is set. Ignores administrator status.
    pub const fn has(self, target: Permission) -> bool {
        self.0 & target.0 == target.0
    }

    /// True when at least one bit of `target` is set.
    pub const fn has_any(self, target: Permission) -> bool {
        self.0 & target.0 != 0
    }

    pub const fn add(self, perm: Permission) -> Permission {
        Permission(self.0 | perm.0)
    }

    pub const fn remove(self, perm: Permission) -> Permission {
        Permission(self.0 & !perm.0)
    }

    /// Like [`Permission::has`], but administrators pass unconditionally.
    pub const fn has_effective(self, target: Permission) -> bool {
        self.has(Permission::ADMINISTRATOR) || self.has(target)
    }
}

impl BitOr for Permission {
    type Output = Permission;

    fn bitor(self, rhs: Permission) -> Permission {
        self.add(rhs)
    }
}

impl From<i64> for Permission {
    fn from(bits: i64) -> Self {
        Self(bits)
    }
}
