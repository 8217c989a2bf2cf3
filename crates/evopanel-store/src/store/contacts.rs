//! The address book.

use super::{write_error, Store};
use evopanel_core::error::PanelError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub tags: Option<String>,
    pub notes: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

type ContactRow = (
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    bool,
    String,
    String,
);

impl From<ContactRow> for Contact {
    fn from(
        (id, name, phone, tags, notes, active, created_at, updated_at): ContactRow,
    ) -> Self {
        Self {
            id,
            name,
            phone,
            tags,
            notes,
            active,
            created_at,
            updated_at,
        }
    }
}

const CONTACT_COLUMNS: &str = "id, name, phone, tags, notes, active, created_at, updated_at";

/// Editable contact fields.
#[derive(Debug, Clone, Default)]
pub struct ContactInput {
    pub name: String,
    pub phone: String,
    pub tags: Option<String>,
    pub notes: Option<String>,
}

/// Listing filter. `search` matches name or phone, case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pub search: Option<String>,
    pub active: Option<bool>,
}

impl Store {
    pub async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>, PanelError> {
        let pattern = filter
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));

        let rows: Vec<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts \
             WHERE (?1 IS NULL OR active = ?1) \
             AND (?2 IS NULL OR name LIKE ?2 OR phone LIKE ?2) \
             ORDER BY name COLLATE NOCASE"
        ))
        .bind(filter.active)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PanelError::Store(format!("list contacts failed: {e}")))?;

        Ok(rows.into_iter().map(Contact::from).collect())
    }

    /// Insert an active contact. A duplicate phone is a `Conflict`.
    pub async fn create_contact(&self, input: &ContactInput) -> Result<Contact, PanelError> {
        let row: ContactRow = sqlx::query_as(&format!(
            "INSERT INTO contacts (name, phone, tags, notes, active) VALUES (?, ?, ?, ?, 1) \
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.tags)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "create contact", "phone already registered"))?;

        Ok(row.into())
    }

    /// Overwrite a contact. `active: None` keeps the current flag.
    pub async fn update_contact(
        &self,
        id: i64,
        input: &ContactInput,
        active: Option<bool>,
    ) -> Result<Option<Contact>, PanelError> {
        let row: Option<ContactRow> = sqlx::query_as(&format!(
            "UPDATE contacts SET name = ?, phone = ?, tags = ?, notes = ?, \
             active = COALESCE(?, active), updated_at = datetime('now') \
             WHERE id = ? RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.tags)
        .bind(&input.notes)
        .bind(active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(e, "update contact", "phone already registered"))?;

        Ok(row.map(Contact::from))
    }

    pub async fn delete_contact(&self, id: i64) -> Result<bool, PanelError> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PanelError::Store(format!("delete contact failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert by phone, or overwrite name/tags/notes and reactivate the existing row.
    pub async fn upsert_contact(&self, input: &ContactInput) -> Result<(), PanelError> {
        sqlx::query(
            "INSERT INTO contacts (name, phone, tags, notes, active) VALUES (?, ?, ?, ?, 1) \
             ON CONFLICT (phone) DO UPDATE SET \
             name = excluded.name, tags = excluded.tags, notes = excluded.notes, \
             active = 1, updated_at = datetime('now')",
        )
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.tags)
        .bind(&input.notes)
        .execute(&self.pool)
        .await
        .map_err(|e| PanelError::Store(format!("upsert contact {} failed: {e}", input.phone)))?;
        Ok(())
    }

    /// Delete every listed id. Returns how many rows went away.
    pub async fn delete_contacts(&self, ids: &[i64]) -> Result<u64, PanelError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM contacts WHERE id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(*id);
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| PanelError::Store(format!("bulk delete contacts failed: {e}")))?;

        Ok(result.rows_affected())
    }
}
