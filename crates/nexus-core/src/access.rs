//! # Access Control Contract
//!
//! The nexus does not decide who a caller is; it only asks the questions in
//! [`AccessControl`]. Every core operation checks one of:
//!
//! - top-level access (Admin or Internal role),
//! - membership of the chain's account,
//! - nothing at all, for public embed-key reads.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::identity::AccountId;

/// User role types understood by the nexus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UserRole {
    /// Platform administrator (top-level).
    Admin,
    /// Internal worker process (top-level).
    Internal,
    /// May create and run Production chains.
    Engineer,
    /// May create Preview chains.
    Artist,
    /// Ordinary account member.
    User,
    /// Explicitly denied.
    Banned,
}

impl UserRole {
    /// Roles that grant top-level access.
    pub const TOP_LEVEL: &'static [UserRole] = &[UserRole::Admin, UserRole::Internal];
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Admin => "Admin",
            Self::Internal => "Internal",
            Self::Engineer => "Engineer",
            Self::Artist => "Artist",
            Self::User => "User",
            Self::Banned => "Banned",
        };
        f.write_str(s)
    }
}

/// What the core consumes from the authorization layer.
pub trait AccessControl: Send + Sync {
    /// Whether the caller holds top-level access.
    fn is_top_level(&self) -> bool;

    /// Accounts the caller belongs to.
    fn account_ids(&self) -> BTreeSet<AccountId>;

    /// Whether the caller belongs to `account_id`.
    fn has_account(&self, account_id: &AccountId) -> bool;

    /// Whether the caller holds any of `roles`.
    fn is_allowed(&self, roles: &[UserRole]) -> bool;
}

/// Concrete access: a set of roles plus a set of accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    roles: BTreeSet<UserRole>,
    accounts: BTreeSet<AccountId>,
}

impl Access {
    /// Access with the given roles and accounts.
    pub fn new(
        roles: impl IntoIterator<Item = UserRole>,
        accounts: impl IntoIterator<Item = AccountId>,
    ) -> Self {
        Self {
            roles: roles.into_iter().collect(),
            accounts: accounts.into_iter().collect(),
        }
    }

    /// Top-level access for worker processes.
    pub fn internal() -> Self {
        Self::new([UserRole::Internal], [])
    }

    /// Unauthenticated access: no roles, no accounts.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Roles held by this access.
    pub fn roles(&self) -> &BTreeSet<UserRole> {
        &self.roles
    }
}

impl AccessControl for Access {
    fn is_top_level(&self) -> bool {
        self.is_allowed(UserRole::TOP_LEVEL)
    }

    fn account_ids(&self) -> BTreeSet<AccountId> {
        self.accounts.clone()
    }

    fn has_account(&self, account_id: &AccountId) -> bool {
        self.accounts.contains(account_id)
    }

    fn is_allowed(&self, roles: &[UserRole]) -> bool {
        roles.iter().any(|r| self.roles.contains(r))
    }
}
