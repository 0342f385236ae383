//! Role bindings and the role-to-permission join table.
use log::*;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use super::parse_column;
use crate::{
    db_types::{Permission, Role, RoleId, SubjectId},
    errors::StoreError,
};

fn role_from_row(row: &SqliteRow) -> Result<Role, StoreError> {
    let id: String = row.try_get("id")?;
    let name: String = row.try_get("name")?;
    Ok(Role::new(parse_column::<RoleId>("roles.id", &id)?, name))
}

pub async fn roles_for_subject(subject: &SubjectId, conn: &mut SqliteConnection) -> Result<Vec<Role>, StoreError> {
    let rows = sqlx::query(
        r#"SELECT roles.id AS id, roles.name AS name
        FROM user_roles JOIN roles ON user_roles.role_id = roles.id
        WHERE user_roles.subject_id = ?"#,
    )
    .bind(subject.to_string())
    .fetch_all(conn)
    .await?;
    rows.iter().map(role_from_row).collect()
}

pub async fn role_by_name(name: &str, conn: &mut SqliteConnection) -> Result<Option<Role>, StoreError> {
    let row = sqlx::query("SELECT id, name FROM roles WHERE name = ?").bind(name).fetch_optional(conn).await?;
    row.as_ref().map(role_from_row).transpose()
}

pub async fn insert_role(name: &str, conn: &mut SqliteConnection) -> Result<RoleId, StoreError> {
    let id = RoleId::random();
    sqlx::query("INSERT INTO roles (id, name) VALUES (?, ?)").bind(id.to_string()).bind(name).execute(conn).await?;
    debug!("🗃️ Created role '{name}' ({id})");
    Ok(id)
}

pub async fn role_has_permission(
    role: &RoleId,
    permission: &Permission,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let count = sqlx::query(
        r#"SELECT COUNT(*) FROM role_permissions
        JOIN permissions ON role_permissions.permission_id = permissions.id
        WHERE role_permissions.role_id = ? AND permissions.name = ? AND permissions.method = ?"#,
    )
    .bind(role.to_string())
    .bind(permission.name.as_str())
    .bind(permission.method.as_str())
    .fetch_one(conn)
    .await?
    .try_get::<i64, _>(0usize)?;
    Ok(count > 0)
}

pub async fn subject_has_permission(
    subject: &SubjectId,
    permission_name: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let count = sqlx::query(
        r#"SELECT COUNT(*) FROM user_roles
        JOIN role_permissions ON user_roles.role_id = role_permissions.role_id
        JOIN permissions ON role_permissions.permission_id = permissions.id
        WHERE user_roles.subject_id = ? AND permissions.name = ?"#,
    )
    .bind(subject.to_string())
    .bind(permission_name)
    .fetch_one(conn)
    .await?
    .try_get::<i64, _>(0usize)?;
    Ok(count > 0)
}

pub async fn assign_role(subject: &SubjectId, role: &RoleId, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    sqlx::query("INSERT OR IGNORE INTO user_roles (subject_id, role_id) VALUES (?, ?)")
        .bind(subject.to_string())
        .bind(role.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn revoke_role(subject: &SubjectId, role: &RoleId, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM user_roles WHERE subject_id = ? AND role_id = ?")
        .bind(subject.to_string())
        .bind(role.to_string())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Creates the permission if it is new, then links it to the role. Run inside a transaction.
pub async fn grant_permission(
    role: &RoleId,
    permission: &Permission,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    sqlx::query("INSERT OR IGNORE INTO permissions (name, method) VALUES (?, ?)")
        .bind(permission.name.as_str())
        .bind(permission.method.as_str())
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        r#"INSERT OR IGNORE INTO role_permissions (role_id, permission_id)
        SELECT ?, id FROM permissions WHERE name = ? AND method = ?"#,
    )
    .bind(role.to_string())
    .bind(permission.name.as_str())
    .bind(permission.method.as_str())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn revoke_permission(
    role: &RoleId,
    permission: &Permission,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"DELETE FROM role_permissions WHERE role_id = ? AND permission_id IN
        (SELECT id FROM permissions WHERE name = ? AND method = ?)"#,
    )
    .bind(role.to_string())
    .bind(permission.name.as_str())
    .bind(permission.method.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
