//! A read-through cache in front of any lookup store.
//!
//! [`CachedStore`] implements the same store traits as the backend it wraps. Role sets, grants, the policy table and
//! partner credentials are remembered for a fixed TTL. Writes made through the cache are forwarded to the backend and
//! then evict exactly the entries they could have changed, so a rotated key or revoked grant is never served from
//! the cache once the write has returned.
//!
//! Each family of entries carries a generation counter that every invalidation bumps before it evicts. A read-through
//! fill notes the generation before going to the backend and withdraws its entry if the generation moved while the
//! backend call was in flight, so a slow read that started before a write cannot put the old value back.
//!
//! Writes that bypass the cache (another process editing the database, say) become visible after at most one TTL,
//! or immediately after one of the `invalidate_*` calls. Expired entries are dropped by [`CachedStore::purge_expired`].
//! Unknown partners are never remembered, and two-factor checks always go to the backend.
use std::{
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
        RwLockReadGuard,
        RwLockWriteGuard,
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use gate_common::Secret;
use log::*;

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

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

type Entry<V> = (Instant, V);

#[derive(Default)]
struct Generations {
    roles: AtomicU64,
    grants: AtomicU64,
    scopes: AtomicU64,
    credentials: AtomicU64,
    rules: AtomicU64,
}

impl Generations {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn current(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::SeqCst)
    }
}

pub struct CachedStore<B> {
    inner: B,
    ttl: Duration,
    generations: Generations,
    roles: DashMap<SubjectId, Entry<Vec<Role>>>,
    grants: DashMap<(RoleId, Permission), Entry<bool>>,
    scopes: DashMap<(SubjectId, String), Entry<bool>>,
    credentials: DashMap<PartnerId, Entry<PartnerCredential>>,
    rules: RwLock<Option<Entry<Vec<PolicyRule>>>>,
}

fn fresh<K, V>(map: &DashMap<K, Entry<V>>, key: &K, ttl: Duration) -> Option<V>
where
    K: Eq + Hash,
    V: Clone,
{
    map.get(key).filter(|entry| entry.0.elapsed() < ttl).map(|entry| entry.1.clone())
}

fn purge<K, V>(map: &DashMap<K, Entry<V>>, now: Instant, ttl: Duration) -> usize
where
    K: Eq + Hash,
{
    let before = map.len();
    map.retain(|_, entry| now.saturating_duration_since(entry.0) < ttl);
    before.saturating_sub(map.len())
}

impl<B> CachedStore<B> {
    pub fn new(inner: B, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            generations: Generations::default(),
            roles: DashMap::new(),
            grants: DashMap::new(),
            scopes: DashMap::new(),
            credentials: DashMap::new(),
            rules: RwLock::new(None),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn rules_read(&self) -> RwLockReadGuard<'_, Option<Entry<Vec<PolicyRule>>>> {
        self.rules.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn rules_write(&self) -> RwLockWriteGuard<'_, Option<Entry<Vec<PolicyRule>>>> {
        self.rules.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a value read from the backend, unless the family was invalidated since `seen` was taken.
    fn fill<K, V>(&self, map: &DashMap<K, Entry<V>>, generation: &AtomicU64, seen: u64, key: K, value: V)
    where
        K: Eq + Hash + Clone,
    {
        if self.ttl.is_zero() {
            return;
        }
        map.insert(key.clone(), (Instant::now(), value));
        // An invalidation bumps first and evicts second, so checking after the insert closes the gap either way
        if Generations::current(generation) != seen {
            map.remove(&key);
            trace!("🗃️ Discarded a cache fill that raced an invalidation");
        }
    }

    fn clear_rules(&self) {
        Generations::bump(&self.generations.rules);
        *self.rules_write() = None;
    }

    /// Forgets the subject's role set and scope-wide decisions.
    pub fn invalidate_subject(&self, subject: &SubjectId) {
        Generations::bump(&self.generations.roles);
        Generations::bump(&self.generations.scopes);
        self.roles.remove(subject);
        self.scopes.retain(|(s, _), _| s != subject);
        trace!("🗃️ Cache invalidated for subject {subject}");
    }

    /// Forgets every decision that depends on the role's grants.
    pub fn invalidate_role(&self, role: &RoleId) {
        Generations::bump(&self.generations.grants);
        Generations::bump(&self.generations.scopes);
        self.grants.retain(|(r, _), _| r != role);
        // scope-wide checks are cached per subject and cannot be traced back to a single role
        self.scopes.clear();
        self.clear_rules();
        trace!("🗃️ Cache invalidated for role {role}");
    }

    pub fn invalidate_partner(&self, partner: &PartnerId) {
        Generations::bump(&self.generations.credentials);
        self.credentials.remove(partner);
        trace!("🗃️ Cache invalidated for partner {partner}");
    }

    pub fn invalidate_all(&self) {
        Generations::bump(&self.generations.roles);
        Generations::bump(&self.generations.grants);
        Generations::bump(&self.generations.scopes);
        Generations::bump(&self.generations.credentials);
        self.roles.clear();
        self.grants.clear();
        self.scopes.clear();
        self.credentials.clear();
        self.clear_rules();
        debug!("🗃️ Lookup cache flushed");
    }

    /// Drops every entry that is older than the TTL as of `now`. Returns the number of entries removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut purged = purge(&self.roles, now, self.ttl);
        purged += purge(&self.grants, now, self.ttl);
        purged += purge(&self.scopes, now, self.ttl);
        purged += purge(&self.credentials, now, self.ttl);
        let mut rules = self.rules_write();
        if rules.as_ref().is_some_and(|(at, _)| now.saturating_duration_since(*at) >= self.ttl) {
            *rules = None;
            purged += 1;
        }
        purged
    }

    /// The number of entries currently held, fresh or not.
    pub fn cached_entries(&self) -> usize {
        let rules = usize::from(self.rules_read().is_some());
        self.roles.len() + self.grants.len() + self.scopes.len() + self.credentials.len() + rules
    }
}

impl<B: RoleManagement> RoleManagement for CachedStore<B> {
    async fn fetch_roles_for_subject(&self, subject: &SubjectId) -> Result<Vec<Role>, StoreError> {
        if let Some(roles) = fresh(&self.roles, subject, self.ttl) {
            return Ok(roles);
        }
        let seen = Generations::current(&self.generations.roles);
        let roles = self.inner.fetch_roles_for_subject(subject).await?;
        self.fill(&self.roles, &self.generations.roles, seen, *subject, roles.clone());
        Ok(roles)
    }

    async fn role_has_permission(&self, role: &RoleId, permission: &Permission) -> Result<bool, StoreError> {
        let key = (*role, permission.clone());
        if let Some(granted) = fresh(&self.grants, &key, self.ttl) {
            return Ok(granted);
        }
        let seen = Generations::current(&self.generations.grants);
        let granted = self.inner.role_has_permission(role, permission).await?;
        self.fill(&self.grants, &self.generations.grants, seen, key, granted);
        Ok(granted)
    }

    async fn check_subject_has_permission(
        &self,
        subject: &SubjectId,
        permission_name: &str,
    ) -> Result<bool, StoreError> {
        let key = (*subject, permission_name.to_string());
        if let Some(granted) = fresh(&self.scopes, &key, self.ttl) {
            return Ok(granted);
        }
        let seen = Generations::current(&self.generations.scopes);
        let granted = self.inner.check_subject_has_permission(subject, permission_name).await?;
        self.fill(&self.scopes, &self.generations.scopes, seen, key, granted);
        Ok(granted)
    }

    async fn assign_role(&self, subject: &SubjectId, role: &RoleId) -> Result<(), StoreError> {
        let result = self.inner.assign_role(subject, role).await;
        self.invalidate_subject(subject);
        result
    }

    async fn revoke_role(&self, subject: &SubjectId, role: &RoleId) -> Result<bool, StoreError> {
        let result = self.inner.revoke_role(subject, role).await;
        self.invalidate_subject(subject);
        result
    }

    async fn grant_permission(&self, role: &RoleId, permission: &Permission) -> Result<(), StoreError> {
        let result = self.inner.grant_permission(role, permission).await;
        self.invalidate_role(role);
        result
    }

    async fn revoke_permission(&self, role: &RoleId, permission: &Permission) -> Result<bool, StoreError> {
        let result = self.inner.revoke_permission(role, permission).await;
        self.invalidate_role(role);
        result
    }
}

impl<B: PolicyManagement> PolicyManagement for CachedStore<B> {
    async fn fetch_policy_rules(&self) -> Result<Vec<PolicyRule>, StoreError> {
        if let Some((at, rules)) = self.rules_read().as_ref() {
            if at.elapsed() < self.ttl {
                return Ok(rules.clone());
            }
        }
        let seen = Generations::current(&self.generations.rules);
        let rules = self.inner.fetch_policy_rules().await?;
        if !self.ttl.is_zero() {
            let mut cached = self.rules_write();
            if Generations::current(&self.generations.rules) == seen {
                *cached = Some((Instant::now(), rules.clone()));
            }
        }
        Ok(rules)
    }

    async fn add_policy_rule(&self, rule: &PolicyRule) -> Result<(), StoreError> {
        let result = self.inner.add_policy_rule(rule).await;
        self.clear_rules();
        result
    }

    async fn remove_policy_rule(&self, rule: &PolicyRule) -> Result<bool, StoreError> {
        let result = self.inner.remove_policy_rule(rule).await;
        self.clear_rules();
        result
    }
}

impl<B: CredentialManagement> CredentialManagement for CachedStore<B> {
    async fn fetch_partner_credential(&self, partner: &PartnerId) -> Result<Option<PartnerCredential>, StoreError> {
        if let Some(credential) = fresh(&self.credentials, partner, self.ttl) {
            return Ok(Some(credential));
        }
        let seen = Generations::current(&self.generations.credentials);
        let credential = self.inner.fetch_partner_credential(partner).await?;
        // The partner id arrives unauthenticated, so misses are not remembered
        if let Some(credential) = &credential {
            self.fill(&self.credentials, &self.generations.credentials, seen, *partner, credential.clone());
        }
        Ok(credential)
    }

    async fn rotate_partner_key(&self, partner: &PartnerId, new_key: Secret<String>) -> Result<(), StoreError> {
        let result = self.inner.rotate_partner_key(partner, new_key).await;
        self.invalidate_partner(partner);
        if result.is_ok() {
            info!("🔐️ Signing key rotated for partner {partner}");
        }
        result
    }

    async fn deactivate_partner(&self, partner: &PartnerId) -> Result<bool, StoreError> {
        let result = self.inner.deactivate_partner(partner).await;
        self.invalidate_partner(partner);
        result
    }
}

impl<B: TwoFactorManagement> TwoFactorManagement for CachedStore<B> {
    async fn fetch_two_factor_status(&self, subject: &SubjectId) -> Result<TwoFactorStatus, StoreError> {
        self.inner.fetch_two_factor_status(subject).await
    }

    async fn verify_two_factor(&self, subject: &SubjectId, proof: &TwoFactorProof) -> Result<bool, StoreError> {
        self.inner.verify_two_factor(subject, proof).await
    }
}
