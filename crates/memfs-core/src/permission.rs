// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Permission engine: owner/group/other evaluation against the acting user

use std::collections::BTreeSet;

use tracing::trace;

use crate::error::{FsError, FsResult};
use crate::namespace::Node;
use crate::types::{DEFAULT_GROUP, DEFAULT_USER, FsAction, PermissionClass};

/// Security identity of an engine instance: user name plus group memberships
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserIdentity {
    pub user: String,
    pub groups: BTreeSet<String>,
}

impl Default for UserIdentity {
    fn default() -> Self {
        Self {
            user: DEFAULT_USER.to_string(),
            groups: BTreeSet::from([DEFAULT_GROUP.to_string()]),
        }
    }
}

impl UserIdentity {
    /// Build an identity; an empty group list falls back to the default groups
    pub fn new<I, S>(user: &str, groups: I) -> FsResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut identity = Self::default();
        identity.switch(user, groups)?;
        Ok(identity)
    }

    /// Change user; a non-empty group list replaces the memberships, an empty one keeps them
    pub fn switch<I, S>(&mut self, user: &str, groups: I) -> FsResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if user.is_empty() {
            return Err(FsError::invalid_argument("user name must not be empty"));
        }

        let mut set = BTreeSet::new();
        for group in groups {
            let group = group.into();
            if group.is_empty() {
                return Err(FsError::invalid_argument("group names must not be empty"));
            }
            set.insert(group);
        }

        self.user = user.to_string();
        if !set.is_empty() {
            self.groups = set;
        }
        Ok(())
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

/// Decide whether `identity` may perform `action` on `node`.
///
/// Evaluation order is other, then group, then owner: the first class whose
/// bits imply the action decides, so group bits that grant the action deny
/// non-members even if the owner bits would have allowed them.
pub fn allowed(node: &Node, identity: &UserIdentity, action: FsAction) -> bool {
    let perm = node.permission;
    if perm.allows(PermissionClass::Other, action) {
        true
    } else if perm.allows(PermissionClass::Group, action) {
        identity.in_group(&node.group)
    } else {
        perm.allows(PermissionClass::Owner, action) && node.owner == identity.user
    }
}

pub fn check_permission(node: &Node, identity: &UserIdentity, action: FsAction) -> FsResult<()> {
    if allowed(node, identity, action) {
        return Ok(());
    }
    trace!(
        user = %identity.user,
        owner = %node.owner,
        group = %node.group,
        mode = %node.permission,
        ?action,
        "permission denied"
    );
    Err(FsError::PermissionDenied)
}
