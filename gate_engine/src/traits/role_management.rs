use crate::{
    db_types::{Permission, Role, RoleId, SubjectId},
    errors::StoreError,
};

/// The `RoleManagement` trait defines the role and permission lookups the policy engine depends on.
///
/// Roles are bound to subjects through a binding record owned by the identity store; from the gatekeeper's point of
/// view the bindings are read-only, except through the administrative methods below.
#[allow(async_fn_in_trait)]
pub trait RoleManagement {
    /// Fetches the roles held by the subject. An unknown subject holds no roles, so the call still succeeds and
    /// returns an empty vector.
    async fn fetch_roles_for_subject(&self, subject: &SubjectId) -> Result<Vec<Role>, StoreError>;

    /// Checks the role-to-permission join table for a grant of `permission` (name *and* method) to `role`.
    async fn role_has_permission(&self, role: &RoleId, permission: &Permission) -> Result<bool, StoreError>;

    /// Checks whether any role held by the subject grants a permission with the given name, for any method. This is
    /// the coarse check used to guard a whole group of routes with a single named permission.
    async fn check_subject_has_permission(&self, subject: &SubjectId, permission_name: &str)
        -> Result<bool, StoreError>;

    /// Binds the role to the subject. This function must be idempotent.
    async fn assign_role(&self, subject: &SubjectId, role: &RoleId) -> Result<(), StoreError>;

    /// Removes the binding between the role and the subject. Returns true if a binding was removed.
    async fn revoke_role(&self, subject: &SubjectId, role: &RoleId) -> Result<bool, StoreError>;

    /// Adds `permission` to the role's grants in the join table. This function must be idempotent.
    async fn grant_permission(&self, role: &RoleId, permission: &Permission) -> Result<(), StoreError>;

    /// Removes `permission` from the role's grants in the join table. Returns true if a grant was removed.
    async fn revoke_permission(&self, role: &RoleId, permission: &Permission) -> Result<bool, StoreError>;
}
