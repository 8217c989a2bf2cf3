//! WhatsApp instances and their provider references.

use super::Store;
use evopanel_core::{error::PanelError, instance::STATUS_PENDING};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instance {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    /// Reference the provider knows this instance by.
    pub evolution_instance_id: String,
    pub status: String,
    /// Last QR content; served through the QR endpoint only.
    #[serde(skip)]
    pub qr_code: Option<String>,
    pub created_at: String,
}

type InstanceRow = (i64, String, Option<String>, String, String, Option<String>, String);

impl From<InstanceRow> for Instance {
    fn from(
        (id, name, phone, evolution_instance_id, status, qr_code, created_at): InstanceRow,
    ) -> Self {
        Self {
            id,
            name,
            phone,
            evolution_instance_id,
            status,
            qr_code,
            created_at,
        }
    }
}

const INSTANCE_COLUMNS: &str =
    "id, name, phone, evolution_instance_id, status, qr_code, created_at";

impl Store {
    /// Record a freshly provisioned instance. New instances start as `pending`.
    pub async fn create_instance(
        &self,
        name: &str,
        phone: Option<&str>,
        evolution_instance_id: &str,
    ) -> Result<Instance, PanelError> {
        let row: InstanceRow = sqlx::query_as(&format!(
            "INSERT INTO whatsapp_instances (name, phone, evolution_instance_id, status) \
             VALUES (?, ?, ?, ?) RETURNING {INSTANCE_COLUMNS}"
        ))
        .bind(name)
        .bind(phone)
        .bind(evolution_instance_id)
        .bind(STATUS_PENDING)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PanelError::Store(format!("create instance failed: {e}")))?;

        Ok(row.into())
    }

    /// All instances, newest first.
    pub async fn list_instances(&self) -> Result<Vec<Instance>, PanelError> {
        let rows: Vec<InstanceRow> = sqlx::query_as(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM whatsapp_instances ORDER BY id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PanelError::Store(format!("list instances failed: {e}")))?;

        Ok(rows.into_iter().map(Instance::from).collect())
    }

    pub async fn get_instance(&self, id: i64) -> Result<Option<Instance>, PanelError> {
        let row: Option<InstanceRow> = sqlx::query_as(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM whatsapp_instances WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PanelError::Store(format!("get instance failed: {e}")))?;

        Ok(row.map(Instance::from))
    }

    /// Provider reference for a panel instance id.
    ///
    /// `None` for unknown ids and for rows with an empty reference.
    pub async fn provider_ref(&self, id: i64) -> Result<Option<String>, PanelError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT evolution_instance_id FROM whatsapp_instances WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| PanelError::Store(format!("instance lookup failed: {e}")))?;

        Ok(row.map(|(r,)| r).filter(|r| !r.is_empty()))
    }

    /// Store the last QR content and the status derived alongside it.
    pub async fn update_instance_qr(
        &self,
        id: i64,
        qr_code: Option<&str>,
        status: &str,
    ) -> Result<(), PanelError> {
        sqlx::query("UPDATE whatsapp_instances SET qr_code = ?, status = ? WHERE id = ?")
            .bind(qr_code)
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PanelError::Store(format!("update instance qr failed: {e}")))?;
        Ok(())
    }

    pub async fn update_instance_status(&self, id: i64, status: &str) -> Result<(), PanelError> {
        sqlx::query("UPDATE whatsapp_instances SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PanelError::Store(format!("update instance status failed: {e}")))?;
        Ok(())
    }

    /// Delete an instance and, by cascade, its groups.
    pub async fn delete_instance(&self, id: i64) -> Result<bool, PanelError> {
        let result = sqlx::query("DELETE FROM whatsapp_instances WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PanelError::Store(format!("delete instance failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_instances(&self) -> Result<i64, PanelError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM whatsapp_instances")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PanelError::Store(format!("count instances failed: {e}")))?;
        Ok(count)
    }
}
