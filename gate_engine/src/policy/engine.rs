use std::{sync::Arc, time::Duration};

use log::*;

use super::resolver::{MembershipResolver, PolicyResolver};
use crate::{
    db_types::{Permission, Role, SubjectId},
    errors::StoreError,
    helpers::bounded_lookup,
    traits::RoleManagement,
};

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

pub struct PolicyEngine<B, R = MembershipResolver<B>> {
    store: Arc<B>,
    resolver: R,
    lookup_timeout: Duration,
}

impl<B: RoleManagement> PolicyEngine<B> {
    /// Creates a policy engine using the canonical join-table strategy.
    pub fn new(store: Arc<B>, lookup_timeout: Duration) -> Self {
        let resolver = MembershipResolver::new(Arc::clone(&store));
        Self { store, resolver, lookup_timeout }
    }
}

impl<B, R> PolicyEngine<B, R> {
    pub fn with_resolver(store: Arc<B>, resolver: R, lookup_timeout: Duration) -> Self {
        Self { store, resolver, lookup_timeout }
    }

    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }
}

impl<B, R> PolicyEngine<B, R>
where
    B: RoleManagement,
    R: PolicyResolver,
{
    /// Fetches the subject's roles, bounded by the lookup timeout.
    pub async fn roles_for(&self, subject: &SubjectId) -> Result<Vec<Role>, StoreError> {
        bounded_lookup(self.lookup_timeout, "fetch_roles_for_subject", self.store.fetch_roles_for_subject(subject))
            .await
    }

    /// Decides whether the subject may perform `permission`.
    ///
    /// Returns `Ok(false)` when no held role grants the permission, and an error if any lookup fails. The `super`
    /// bypass is checked over the complete role set before any grant is resolved.
    pub async fn authorize(&self, subject: &SubjectId, permission: &Permission) -> Result<bool, StoreError> {
        let roles = self.roles_for(subject).await?;
        if roles.iter().any(Role::is_super) {
            debug!("🔐️ {subject} holds the super role. Allowing {permission}");
            return Ok(true);
        }
        for role in &roles {
            let granted =
                bounded_lookup(self.lookup_timeout, self.resolver.strategy(), self.resolver.grants(role, permission))
                    .await?;
            if granted {
                trace!("🔐️ Role '{}' grants {permission} to {subject} ({})", role.name, self.resolver.strategy());
                return Ok(true);
            }
        }
        debug!("🔐️ None of the {} roles held by {subject} grant {permission}", roles.len());
        Ok(false)
    }

    /// The coarse, method-agnostic check used to guard a whole scope with one named permission. The `super` bypass
    /// applies here too.
    pub async fn check_subject_has_permission(
        &self,
        subject: &SubjectId,
        permission_name: &str,
    ) -> Result<bool, StoreError> {
        let roles = self.roles_for(subject).await?;
        if roles.iter().any(Role::is_super) {
            debug!("🔐️ {subject} holds the super role. Allowing '{permission_name}'");
            return Ok(true);
        }
        bounded_lookup(
            self.lookup_timeout,
            "check_subject_has_permission",
            self.store.check_subject_has_permission(subject, permission_name),
        )
        .await
    }
}
