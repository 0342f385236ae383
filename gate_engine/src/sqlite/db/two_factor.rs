//! Two-factor enrolment records.
//!
//! TOTP secrets are stored hex-encoded. Backup codes are stored as SHA-256 hashes and are burned on first use.
use gate_common::Secret;
use log::*;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqliteConnection};

use crate::{db_types::SubjectId, errors::StoreError};

fn hash_backup_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.trim().as_bytes()))
}

pub async fn is_enabled(subject: &SubjectId, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let row = sqlx::query("SELECT enabled FROM two_factor WHERE subject_id = ?")
        .bind(subject.to_string())
        .fetch_optional(conn)
        .await?;
    match row {
        Some(row) => Ok(row.try_get::<bool, _>("enabled")?),
        None => Ok(false),
    }
}

/// The subject's TOTP secret, if 2FA is enabled and a secret is on file.
pub async fn totp_secret(subject: &SubjectId, conn: &mut SqliteConnection) -> Result<Option<Vec<u8>>, StoreError> {
    let row = sqlx::query("SELECT totp_secret FROM two_factor WHERE subject_id = ? AND enabled = 1")
        .bind(subject.to_string())
        .fetch_optional(conn)
        .await?;
    let Some(secret) = row.map(|r| r.try_get::<Option<String>, _>("totp_secret")).transpose()?.flatten() else {
        return Ok(None);
    };
    let secret = hex::decode(&secret)
        .map_err(|e| StoreError::InconsistentData(format!("two_factor.totp_secret for {subject}: {e}")))?;
    Ok(Some(secret))
}

pub async fn enable(
    subject: &SubjectId,
    secret: &Secret<Vec<u8>>,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"INSERT INTO two_factor (subject_id, enabled, totp_secret, updated_at) VALUES (?, 1, ?, CURRENT_TIMESTAMP)
        ON CONFLICT (subject_id) DO UPDATE SET
            enabled = 1, totp_secret = excluded.totp_secret, updated_at = CURRENT_TIMESTAMP"#,
    )
    .bind(subject.to_string())
    .bind(hex::encode(secret.reveal()))
    .execute(conn)
    .await?;
    debug!("🗃️ Two-factor authentication enabled for {subject}");
    Ok(())
}

pub async fn disable(subject: &SubjectId, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let result = sqlx::query("UPDATE two_factor SET enabled = 0, updated_at = CURRENT_TIMESTAMP WHERE subject_id = ?")
        .bind(subject.to_string())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_backup_code(
    subject: &SubjectId,
    code: &str,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    sqlx::query("INSERT OR IGNORE INTO two_factor_backup_codes (subject_id, code_hash) VALUES (?, ?)")
        .bind(subject.to_string())
        .bind(hash_backup_code(code))
        .execute(conn)
        .await?;
    Ok(())
}

/// Marks an unused backup code as used. Returns false if the code is unknown or was already used.
pub async fn consume_backup_code(
    subject: &SubjectId,
    code: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"UPDATE two_factor_backup_codes SET used_at = CURRENT_TIMESTAMP
        WHERE subject_id = ? AND code_hash = ? AND used_at IS NULL"#,
    )
    .bind(subject.to_string())
    .bind(hash_backup_code(code))
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
