use sqlx::{Row, SqliteConnection};

use super::parse_column;
use crate::{
    db_types::{HttpMethod, PolicyRule, RoleId},
    errors::StoreError,
};

pub async fn fetch_rules(conn: &mut SqliteConnection) -> Result<Vec<PolicyRule>, StoreError> {
    let rows = sqlx::query("SELECT role_id, permission, method FROM policy_rules").fetch_all(conn).await?;
    rows.iter()
        .map(|row| {
            let role_id: String = row.try_get("role_id")?;
            let permission: String = row.try_get("permission")?;
            let method: String = row.try_get("method")?;
            Ok(PolicyRule::new(
                parse_column::<RoleId>("policy_rules.role_id", &role_id)?,
                permission,
                parse_column::<HttpMethod>("policy_rules.method", &method)?,
            ))
        })
        .collect()
}

pub async fn insert_rule(rule: &PolicyRule, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    sqlx::query("INSERT OR IGNORE INTO policy_rules (role_id, permission, method) VALUES (?, ?, ?)")
        .bind(rule.role_id.to_string())
        .bind(rule.permission_name.as_str())
        .bind(rule.method.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn delete_rule(rule: &PolicyRule, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM policy_rules WHERE role_id = ? AND permission = ? AND method = ?")
        .bind(rule.role_id.to_string())
        .bind(rule.permission_name.as_str())
        .bind(rule.method.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
