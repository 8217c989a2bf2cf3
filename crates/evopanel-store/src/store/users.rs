//! Panel accounts.

use super::{write_error, Store};
use evopanel_core::error::PanelError;
use serde::Serialize;

/// A panel user. The password hash never leaves the process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: String,
}

type UserRow = (i64, String, String, String, String, String);

impl From<UserRow> for User {
    fn from((id, name, email, role, password_hash, created_at): UserRow) -> Self {
        Self {
            id,
            name,
            email,
            role,
            password_hash,
            created_at,
        }
    }
}

const USER_COLUMNS: &str = "id, name, email, role, password_hash, created_at";

impl Store {
    /// Insert a user. A duplicate e-mail is a `Conflict`.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, PanelError> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (name, email, password_hash, role) VALUES (?, ?, ?, ?) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "create user", "email already registered"))?;

        Ok(row.into())
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, PanelError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| PanelError::Store(format!("find user failed: {e}")))?;

        Ok(row.map(User::from))
    }

    /// All users, oldest first.
    pub async fn list_users(&self) -> Result<Vec<User>, PanelError> {
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| PanelError::Store(format!("list users failed: {e}")))?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Update name, e-mail, and role. `None` when the user does not exist.
    pub async fn update_user(
        &self,
        id: i64,
        name: &str,
        email: &str,
        role: &str,
    ) -> Result<Option<User>, PanelError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users SET name = ?, email = ?, role = ?, updated_at = datetime('now') \
             WHERE id = ? RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(role)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(e, "update user", "email already registered"))?;

        Ok(row.map(User::from))
    }

    /// Replace the password hash. Returns whether the user existed.
    pub async fn set_password(&self, id: i64, password_hash: &str) -> Result<bool, PanelError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| PanelError::Store(format!("set password failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool, PanelError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PanelError::Store(format!("delete user failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_users(&self) -> Result<i64, PanelError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PanelError::Store(format!("count users failed: {e}")))?;
        Ok(count)
    }
}
