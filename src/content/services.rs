/// Services offered on the marketing site
use crate::{
    content::slug::{unique_slug, SlugTable},
    error::{CmsError, CmsResult},
    forms,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    /// Icon class name, e.g. `bi-hammer`
    pub icon: String,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default, alias = "order", deserialize_with = "forms::lenient_number")]
    pub sort_order: f64,
}

impl ServiceInput {
    fn clean(self) -> CmsResult<(String, String, String, i64)> {
        let title = self.title.trim().to_string();
        let icon = self.icon.trim().to_string();
        let mut errors = Vec::new();
        if title.is_empty() {
            errors.push("Title is required");
        }
        if icon.is_empty() {
            errors.push("Icon is required");
        }
        if !errors.is_empty() {
            return Err(CmsError::Validation(errors.join(", ")));
        }
        Ok((
            title,
            self.description.trim().to_string(),
            icon,
            forms::finite_or_zero(self.sort_order).trunc() as i64,
        ))
    }
}

pub struct ServiceStore {
    db: SqlitePool,
}

impl ServiceStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: ServiceInput) -> CmsResult<Service> {
        let (title, description, icon, sort_order) = input.clean()?;
        let id = Uuid::new_v4();
        let slug = unique_slug(&self.db, SlugTable::Services, &title, None).await?;

        sqlx::query(
            r#"
            INSERT INTO services (id, title, slug, description, icon, sort_order, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(id)
        .bind(&title)
        .bind(&slug)
        .bind(&description)
        .bind(&icon)
        .bind(sort_order)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        info!("Created service {} ({})", id, slug);
        self.get(id).await
    }

    /// The slug follows the title
    pub async fn update(&self, id: Uuid, input: ServiceInput) -> CmsResult<Service> {
        let (title, description, icon, sort_order) = input.clean()?;
        let slug = unique_slug(&self.db, SlugTable::Services, &title, Some(id)).await?;

        let result = sqlx::query(
            r#"
            UPDATE services SET title = ?1, slug = ?2, description = ?3, icon = ?4, sort_order = ?5, updated_at = ?6
            WHERE id = ?7
            "#,
        )
        .bind(&title)
        .bind(&slug)
        .bind(&description)
        .bind(&icon)
        .bind(sort_order)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Service {} not found", id)));
        }
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<Service> {
        let row = sqlx::query("SELECT * FROM services WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("Service {} not found", id)))?;
        row_to_service(&row)
    }

    /// Sort order ascending, oldest first within equal order
    pub async fn list(&self) -> CmsResult<Vec<Service>> {
        let rows = sqlx::query("SELECT * FROM services ORDER BY sort_order ASC, created_at ASC")
            .fetch_all(&self.db)
            .await?;
        rows.iter().map(row_to_service).collect()
    }

    pub async fn delete(&self, id: Uuid) -> CmsResult<()> {
        let result = sqlx::query("DELETE FROM services WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Service {} not found", id)));
        }
        info!("Deleted service {}", id);
        Ok(())
    }

    pub async fn count(&self) -> CmsResult<i64> {
        Ok(sqlx::query("SELECT COUNT(*) AS n FROM services")
            .fetch_one(&self.db)
            .await?
            .try_get("n")?)
    }
}

fn row_to_service(row: &SqliteRow) -> CmsResult<Service> {
    Ok(Service {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        icon: row.try_get("icon")?,
        sort_order: row.try_get("sort_order")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn input(title: &str, icon: &str, order: f64) -> ServiceInput {
        ServiceInput {
            title: title.into(),
            icon: icon.into(),
            sort_order: order,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_icon_required() {
        let store = ServiceStore::new(db::test_pool().await);
        let err = store.create(input("Repairs", "  ", 0.0)).await.unwrap_err();
        assert!(matches!(err, CmsError::Validation(ref m) if m == "Icon is required"));
    }

    #[tokio::test]
    async fn test_list_by_sort_order() {
        let store = ServiceStore::new(db::test_pool().await);
        store.create(input("Second", "bi-2", 2.0)).await.unwrap();
        store.create(input("First", "bi-1", 1.0)).await.unwrap();

        let titles: Vec<String> = store.list().await.unwrap().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn test_update_moves_slug() {
        let store = ServiceStore::new(db::test_pool().await);
        let service = store.create(input("Cleaning", "bi-droplet", 0.0)).await.unwrap();
        let updated = store
            .update(service.id, input("Weekly Cleaning", "bi-droplet", 0.0))
            .await
            .unwrap();
        assert_eq!(updated.slug, "weekly-cleaning");

        store.delete(service.id).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
