use crate::{
    db_types::{HttpMethod, PolicyRule, RoleId},
    errors::StoreError,
    policy::PolicyMatcher,
};

/// Access to the declarative policy table, a list of `(role, permission name, method)` rules evaluated by a generic
/// matcher.
///
/// This is the older of the two enforcement strategies. Its decisions must be identical to those of the join table
/// behind [`crate::traits::RoleManagement::role_has_permission`].
#[allow(async_fn_in_trait)]
pub trait PolicyManagement {
    /// Fetches every rule in the policy table.
    async fn fetch_policy_rules(&self) -> Result<Vec<PolicyRule>, StoreError>;

    /// Adds a rule. This function must be idempotent.
    async fn add_policy_rule(&self, rule: &PolicyRule) -> Result<(), StoreError>;

    /// Removes a rule. Returns true if the rule existed.
    async fn remove_policy_rule(&self, rule: &PolicyRule) -> Result<bool, StoreError>;

    /// Evaluates the policy table for `(role, permission_name, method)`.
    ///
    /// The default implementation loads the full table and runs it through [`PolicyMatcher`].
    async fn enforce_policy(
        &self,
        role: &RoleId,
        permission_name: &str,
        method: HttpMethod,
    ) -> Result<bool, StoreError> {
        let rules = self.fetch_policy_rules().await?;
        Ok(PolicyMatcher::new(&rules).enforce(role, permission_name, method))
    }
}
