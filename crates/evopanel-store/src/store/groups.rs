//! Groups discovered per instance.

use super::Store;
use evopanel_core::{error::PanelError, instance::GroupInfo};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub id: i64,
    pub instance_id: i64,
    pub name: String,
    pub jid: String,
}

type GroupRow = (i64, i64, String, String);

impl From<GroupRow> for Group {
    fn from((id, instance_id, name, jid): GroupRow) -> Self {
        Self {
            id,
            instance_id,
            name,
            jid,
        }
    }
}

impl Store {
    /// Groups of one instance, ordered by name.
    pub async fn list_groups(&self, instance_id: i64) -> Result<Vec<Group>, PanelError> {
        let rows: Vec<GroupRow> = sqlx::query_as(
            "SELECT id, instance_id, name, jid FROM whatsapp_groups \
             WHERE instance_id = ? ORDER BY name COLLATE NOCASE ASC",
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PanelError::Store(format!("list groups failed: {e}")))?;

        Ok(rows.into_iter().map(Group::from).collect())
    }

    /// Insert or rename groups keyed by `(instance_id, jid)`, all or nothing.
    pub async fn upsert_groups(
        &self,
        instance_id: i64,
        groups: &[GroupInfo],
    ) -> Result<usize, PanelError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PanelError::Store(format!("begin transaction failed: {e}")))?;

        for group in groups {
            sqlx::query(
                "INSERT INTO whatsapp_groups (instance_id, name, jid) VALUES (?, ?, ?) \
                 ON CONFLICT (instance_id, jid) DO UPDATE SET name = excluded.name",
            )
            .bind(instance_id)
            .bind(&group.name)
            .bind(&group.jid)
            .execute(&mut *tx)
            .await
            .map_err(|e| PanelError::Store(format!("upsert group {} failed: {e}", group.jid)))?;
        }

        tx.commit()
            .await
            .map_err(|e| PanelError::Store(format!("commit groups failed: {e}")))?;

        Ok(groups.len())
    }

    pub async fn find_group(&self, instance_id: i64, jid: &str) -> Result<Option<Group>, PanelError> {
        let row: Option<GroupRow> = sqlx::query_as(
            "SELECT id, instance_id, name, jid FROM whatsapp_groups \
             WHERE instance_id = ? AND jid = ?",
        )
        .bind(instance_id)
        .bind(jid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PanelError::Store(format!("find group failed: {e}")))?;

        Ok(row.map(Group::from))
    }
}
