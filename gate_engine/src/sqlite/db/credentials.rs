use gate_common::Secret;
use sqlx::{Row, SqliteConnection};

use crate::{
    db_types::{PartnerCredential, PartnerId},
    errors::StoreError,
};

pub async fn fetch_credential(
    partner: &PartnerId,
    conn: &mut SqliteConnection,
) -> Result<Option<PartnerCredential>, StoreError> {
    let row = sqlx::query("SELECT signing_key, active FROM partner_credentials WHERE partner_id = ?")
        .bind(partner.value())
        .fetch_optional(conn)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let signing_key: String = row.try_get("signing_key")?;
    let active: bool = row.try_get("active")?;
    Ok(Some(PartnerCredential { partner_id: *partner, signing_key: Secret::new(signing_key), active }))
}

/// Replaces the partner's key in a single statement, so there is no moment where both keys are stored.
pub async fn upsert_key(
    partner: &PartnerId,
    key: &Secret<String>,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"INSERT INTO partner_credentials (partner_id, signing_key, active, rotated_at)
        VALUES (?, ?, 1, CURRENT_TIMESTAMP)
        ON CONFLICT (partner_id) DO UPDATE SET
            signing_key = excluded.signing_key, active = 1, rotated_at = CURRENT_TIMESTAMP"#,
    )
    .bind(partner.value())
    .bind(key.reveal().as_str())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn deactivate(partner: &PartnerId, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let result = sqlx::query("UPDATE partner_credentials SET active = 0 WHERE partner_id = ? AND active = 1")
        .bind(partner.value())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
