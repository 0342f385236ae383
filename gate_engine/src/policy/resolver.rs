use std::sync::Arc;

use crate::{
    db_types::{Permission, Role},
    errors::StoreError,
    traits::{PolicyManagement, RoleManagement},
};

/// Decides whether a single (non-super) role grants a permission.
#[allow(async_fn_in_trait)]
pub trait PolicyResolver {
    /// A short name for the strategy, used in log messages.
    fn strategy(&self) -> &'static str;

    async fn grants(&self, role: &Role, permission: &Permission) -> Result<bool, StoreError>;
}

/// Resolves grants through the role-to-permission join table.
pub struct MembershipResolver<B> {
    store: Arc<B>,
}

impl<B> MembershipResolver<B> {
    pub fn new(store: Arc<B>) -> Self {
        Self { store }
    }
}

impl<B> Clone for MembershipResolver<B> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<B: RoleManagement> PolicyResolver for MembershipResolver<B> {
    fn strategy(&self) -> &'static str {
        "membership"
    }

    async fn grants(&self, role: &Role, permission: &Permission) -> Result<bool, StoreError> {
        self.store.role_has_permission(&role.id, permission).await
    }
}

/// Resolves grants by evaluating the declarative policy table.
#[deprecated(note = "Grants are resolved from the role_permissions join table. Use `MembershipResolver`. This \
                     resolver only exists to verify that both tables make the same decisions.")]
pub struct DeclarativeResolver<B> {
    store: Arc<B>,
}

#[allow(deprecated)]
impl<B> DeclarativeResolver<B> {
    pub fn new(store: Arc<B>) -> Self {
        Self { store }
    }
}

#[allow(deprecated)]
impl<B: PolicyManagement> PolicyResolver for DeclarativeResolver<B> {
    fn strategy(&self) -> &'static str {
        "declarative"
    }

    async fn grants(&self, role: &Role, permission: &Permission) -> Result<bool, StoreError> {
        self.store.enforce_policy(&role.id, &permission.name, permission.method).await
    }
}
