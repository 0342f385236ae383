use gate_common::Secret;
use gate_engine::{
    db_types::{
        PartnerCredential,
        PartnerId,
        Permission,
        PolicyRule,
        Role,
        RoleId,
        SubjectId,
        TwoFactorProof,
        TwoFactorStatus,
    },
    CredentialManagement,
    PolicyManagement,
    RoleManagement,
    StoreError,
    TwoFactorManagement,
};
use mockall::mock;

mock! {
    pub Store {}
    impl RoleManagement for Store {
        async fn fetch_roles_for_subject(&self, subject: &SubjectId) -> Result<Vec<Role>, StoreError>;
        async fn role_has_permission(&self, role: &RoleId, permission: &Permission) -> Result<bool, StoreError>;
        async fn check_subject_has_permission(&self, subject: &SubjectId, permission_name: &str)
            -> Result<bool, StoreError>;
        async fn assign_role(&self, subject: &SubjectId, role: &RoleId) -> Result<(), StoreError>;
        async fn revoke_role(&self, subject: &SubjectId, role: &RoleId) -> Result<bool, StoreError>;
        async fn grant_permission(&self, role: &RoleId, permission: &Permission) -> Result<(), StoreError>;
        async fn revoke_permission(&self, role: &RoleId, permission: &Permission) -> Result<bool, StoreError>;
    }
    impl PolicyManagement for Store {
        async fn fetch_policy_rules(&self) -> Result<Vec<PolicyRule>, StoreError>;
        async fn add_policy_rule(&self, rule: &PolicyRule) -> Result<(), StoreError>;
        async fn remove_policy_rule(&self, rule: &PolicyRule) -> Result<bool, StoreError>;
    }
    impl CredentialManagement for Store {
        async fn fetch_partner_credential(&self, partner: &PartnerId) -> Result<Option<PartnerCredential>, StoreError>;
        async fn rotate_partner_key(&self, partner: &PartnerId, new_key: Secret<String>) -> Result<(), StoreError>;
        async fn deactivate_partner(&self, partner: &PartnerId) -> Result<bool, StoreError>;
    }
    impl TwoFactorManagement for Store {
        async fn fetch_two_factor_status(&self, subject: &SubjectId) -> Result<TwoFactorStatus, StoreError>;
        async fn verify_two_factor(&self, subject: &SubjectId, proof: &TwoFactorProof) -> Result<bool, StoreError>;
    }
}
