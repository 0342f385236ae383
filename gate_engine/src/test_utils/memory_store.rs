use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Mutex,
        MutexGuard,
    },
    time::Duration,
};

use gate_common::Secret;

use crate::{
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
    errors::StoreError,
    traits::{CredentialManagement, PolicyManagement, RoleManagement, TwoFactorManagement},
};

#[derive(Default)]
struct MemoryState {
    roles: HashMap<RoleId, Role>,
    bindings: HashMap<SubjectId, HashSet<RoleId>>,
    grants: HashSet<(RoleId, Permission)>,
    rules: HashSet<PolicyRule>,
    credentials: HashMap<PartnerId, PartnerCredential>,
    two_factor: HashMap<SubjectId, String>,
    backup_codes: HashMap<SubjectId, HashSet<String>>,
}

/// An in-memory implementation of every store trait, with switches to make lookups fail or stall.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    role_lookups: AtomicUsize,
    grant_lookups: AtomicUsize,
    credential_lookups: AtomicUsize,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn lookup(&self) -> Result<(), StoreError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::DatabaseError("connection refused".into()));
        }
        Ok(())
    }

    pub fn add_role(&self, name: &str) -> RoleId {
        let id = RoleId::random();
        self.state().roles.insert(id, Role::new(id, name));
        id
    }

    pub fn bind(&self, subject: &SubjectId, role: &RoleId) {
        self.state().bindings.entry(*subject).or_default().insert(*role);
    }

    /// Grants through the join table only.
    pub fn grant(&self, role: &RoleId, permission: &Permission) {
        self.state().grants.insert((*role, permission.clone()));
    }

    /// Grants through the policy table only.
    pub fn add_rule(&self, rule: PolicyRule) {
        self.state().rules.insert(rule);
    }

    pub fn set_credential(&self, partner: PartnerId, key: &str, active: bool) {
        let credential = PartnerCredential { partner_id: partner, signing_key: Secret::new(key.to_string()), active };
        self.state().credentials.insert(partner, credential);
    }

    pub fn enable_two_factor(&self, subject: &SubjectId, current_token: &str) {
        self.state().two_factor.insert(*subject, current_token.to_string());
    }

    pub fn add_backup_code(&self, subject: &SubjectId, code: &str) {
        self.state().backup_codes.entry(*subject).or_default().insert(code.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }

    pub fn role_lookups(&self) -> usize {
        self.role_lookups.load(Ordering::SeqCst)
    }

    pub fn grant_lookups(&self) -> usize {
        self.grant_lookups.load(Ordering::SeqCst)
    }

    pub fn credential_lookups(&self) -> usize {
        self.credential_lookups.load(Ordering::SeqCst)
    }
}

impl RoleManagement for MemoryStore {
    async fn fetch_roles_for_subject(&self, subject: &SubjectId) -> Result<Vec<Role>, StoreError> {
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        self.lookup().await?;
        let state = self.state();
        let roles = state
            .bindings
            .get(subject)
            .map(|ids| ids.iter().filter_map(|id| state.roles.get(id).cloned()).collect())
            .unwrap_or_default();
        Ok(roles)
    }

    async fn role_has_permission(&self, role: &RoleId, permission: &Permission) -> Result<bool, StoreError> {
        self.grant_lookups.fetch_add(1, Ordering::SeqCst);
        self.lookup().await?;
        Ok(self.state().grants.contains(&(*role, permission.clone())))
    }

    async fn check_subject_has_permission(
        &self,
        subject: &SubjectId,
        permission_name: &str,
    ) -> Result<bool, StoreError> {
        self.grant_lookups.fetch_add(1, Ordering::SeqCst);
        self.lookup().await?;
        let state = self.state();
        let held = state.bindings.get(subject).cloned().unwrap_or_default();
        Ok(state.grants.iter().any(|(role, p)| held.contains(role) && p.name == permission_name))
    }

    async fn assign_role(&self, subject: &SubjectId, role: &RoleId) -> Result<(), StoreError> {
        self.lookup().await?;
        self.bind(subject, role);
        Ok(())
    }

    async fn revoke_role(&self, subject: &SubjectId, role: &RoleId) -> Result<bool, StoreError> {
        self.lookup().await?;
        Ok(self.state().bindings.get_mut(subject).map(|roles| roles.remove(role)).unwrap_or(false))
    }

    async fn grant_permission(&self, role: &RoleId, permission: &Permission) -> Result<(), StoreError> {
        self.lookup().await?;
        self.grant(role, permission);
        Ok(())
    }

    async fn revoke_permission(&self, role: &RoleId, permission: &Permission) -> Result<bool, StoreError> {
        self.lookup().await?;
        Ok(self.state().grants.remove(&(*role, permission.clone())))
    }
}

impl PolicyManagement for MemoryStore {
    async fn fetch_policy_rules(&self) -> Result<Vec<PolicyRule>, StoreError> {
        self.grant_lookups.fetch_add(1, Ordering::SeqCst);
        self.lookup().await?;
        Ok(self.state().rules.iter().cloned().collect())
    }

    async fn add_policy_rule(&self, rule: &PolicyRule) -> Result<(), StoreError> {
        self.lookup().await?;
        self.add_rule(rule.clone());
        Ok(())
    }

    async fn remove_policy_rule(&self, rule: &PolicyRule) -> Result<bool, StoreError> {
        self.lookup().await?;
        Ok(self.state().rules.remove(rule))
    }
}

impl CredentialManagement for MemoryStore {
    async fn fetch_partner_credential(&self, partner: &PartnerId) -> Result<Option<PartnerCredential>, StoreError> {
        self.credential_lookups.fetch_add(1, Ordering::SeqCst);
        self.lookup().await?;
        Ok(self.state().credentials.get(partner).cloned())
    }

    async fn rotate_partner_key(&self, partner: &PartnerId, new_key: Secret<String>) -> Result<(), StoreError> {
        self.lookup().await?;
        let credential = PartnerCredential { partner_id: *partner, signing_key: new_key, active: true };
        self.state().credentials.insert(*partner, credential);
        Ok(())
    }

    async fn deactivate_partner(&self, partner: &PartnerId) -> Result<bool, StoreError> {
        self.lookup().await?;
        let mut state = self.state();
        match state.credentials.get_mut(partner) {
            Some(c) if c.active => {
                c.active = false;
                Ok(true)
            },
            _ => Ok(false),
        }
    }
}

impl TwoFactorManagement for MemoryStore {
    async fn fetch_two_factor_status(&self, subject: &SubjectId) -> Result<TwoFactorStatus, StoreError> {
        self.lookup().await?;
        Ok(TwoFactorStatus { enabled: self.state().two_factor.contains_key(subject) })
    }

    async fn verify_two_factor(&self, subject: &SubjectId, proof: &TwoFactorProof) -> Result<bool, StoreError> {
        self.lookup().await?;
        let mut state = self.state();
        let valid = match proof {
            TwoFactorProof::Token(token) => state.two_factor.get(subject).is_some_and(|t| t == token),
            TwoFactorProof::BackupCode(code) => {
                state.backup_codes.get_mut(subject).map(|codes| codes.remove(code)).unwrap_or(false)
            },
        };
        Ok(valid)
    }
}
