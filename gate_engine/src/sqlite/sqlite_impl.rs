//! `SqliteDatabase` is a concrete lookup backend for the gatekeeper.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Besides the trait methods, it carries the administrative helpers an operator needs to seed a database:
//! creating roles and enrolling subjects in two-factor authentication.
use std::fmt::Debug;

use chrono::Utc;
use gate_common::Secret;
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{credentials, db_url, new_pool, policies, roles, two_factor};
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
    totp::verify_totp,
    traits::{CredentialManagement, PolicyManagement, RoleManagement, TwoFactorManagement},
};

/// Number of 30-second steps of clock drift tolerated either side of the current TOTP code.
const TOTP_SKEW: u64 = 1;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database named by `GATE_DATABASE_URL`, or the default location.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        debug!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn create_role(&self, name: &str) -> Result<RoleId, StoreError> {
        let mut conn = self.pool.acquire().await?;
        roles::insert_role(name, &mut conn).await
    }

    pub async fn fetch_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        roles::role_by_name(name, &mut conn).await
    }

    /// Enrols the subject in TOTP-based two-factor authentication, replacing any previous secret.
    pub async fn enable_two_factor(
        &self,
        subject: &SubjectId,
        totp_secret: &Secret<Vec<u8>>,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        two_factor::enable(subject, totp_secret, &mut conn).await
    }

    pub async fn disable_two_factor(&self, subject: &SubjectId) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        two_factor::disable(subject, &mut conn).await
    }

    pub async fn add_backup_code(&self, subject: &SubjectId, code: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        two_factor::insert_backup_code(subject, code, &mut conn).await
    }
}

impl RoleManagement for SqliteDatabase {
    async fn fetch_roles_for_subject(&self, subject: &SubjectId) -> Result<Vec<Role>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        roles::roles_for_subject(subject, &mut conn).await
    }

    async fn role_has_permission(&self, role: &RoleId, permission: &Permission) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        roles::role_has_permission(role, permission, &mut conn).await
    }

    async fn check_subject_has_permission(
        &self,
        subject: &SubjectId,
        permission_name: &str,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        roles::subject_has_permission(subject, permission_name, &mut conn).await
    }

    async fn assign_role(&self, subject: &SubjectId, role: &RoleId) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        roles::assign_role(subject, role, &mut conn).await?;
        debug!("🗃️ Role {role} assigned to {subject}");
        Ok(())
    }

    async fn revoke_role(&self, subject: &SubjectId, role: &RoleId) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        roles::revoke_role(subject, role, &mut conn).await
    }

    async fn grant_permission(&self, role: &RoleId, permission: &Permission) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        roles::grant_permission(role, permission, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Role {role} granted {permission}");
        Ok(())
    }

    async fn revoke_permission(&self, role: &RoleId, permission: &Permission) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        roles::revoke_permission(role, permission, &mut conn).await
    }
}

impl PolicyManagement for SqliteDatabase {
    async fn fetch_policy_rules(&self) -> Result<Vec<PolicyRule>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        policies::fetch_rules(&mut conn).await
    }

    async fn add_policy_rule(&self, rule: &PolicyRule) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        policies::insert_rule(rule, &mut conn).await
    }

    async fn remove_policy_rule(&self, rule: &PolicyRule) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        policies::delete_rule(rule, &mut conn).await
    }
}

impl CredentialManagement for SqliteDatabase {
    async fn fetch_partner_credential(&self, partner: &PartnerId) -> Result<Option<PartnerCredential>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        credentials::fetch_credential(partner, &mut conn).await
    }

    async fn rotate_partner_key(&self, partner: &PartnerId, new_key: Secret<String>) -> Result<(), StoreError> {
        if new_key.is_empty() {
            return Err(StoreError::InconsistentData(format!("Refusing to store an empty key for partner {partner}")));
        }
        let mut conn = self.pool.acquire().await?;
        credentials::upsert_key(partner, &new_key, &mut conn).await
    }

    async fn deactivate_partner(&self, partner: &PartnerId) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        credentials::deactivate(partner, &mut conn).await
    }
}

impl TwoFactorManagement for SqliteDatabase {
    async fn fetch_two_factor_status(&self, subject: &SubjectId) -> Result<TwoFactorStatus, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let enabled = two_factor::is_enabled(subject, &mut conn).await?;
        Ok(TwoFactorStatus { enabled })
    }

    async fn verify_two_factor(&self, subject: &SubjectId, proof: &TwoFactorProof) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        match proof {
            TwoFactorProof::Token(token) => {
                let Some(secret) = two_factor::totp_secret(subject, &mut conn).await? else {
                    warn!("🔐️ {subject} presented a TOTP token but has no TOTP secret on file");
                    return Ok(false);
                };
                Ok(verify_totp(&secret, token, Utc::now().timestamp(), TOTP_SKEW))
            },
            TwoFactorProof::BackupCode(code) => two_factor::consume_backup_code(subject, code, &mut conn).await,
        }
    }
}
