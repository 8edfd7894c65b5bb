/// Portfolio projects
use crate::{
    content::slug::{unique_slug, SlugTable},
    db,
    error::{CmsError, CmsResult},
    forms,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, types::Json, Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

pub const PROJECT_TYPES: [&str; 3] = ["New Pool Construction", "Renovation", "Maintenance/Service"];
pub const PROJECT_STATUSES: [&str; 3] = ["Planned", "In Progress", "Completed"];

pub const PROJECTS_PER_PAGE: u32 = 20;
pub const PORTFOLIO_PER_PAGE: u32 = 12;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub short_description: String,
    pub description: String,
    pub project_type: String,
    pub location: String,
    pub featured_image: String,
    pub gallery: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: String,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub project_type: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub featured_image: String,
    #[serde(default, deserialize_with = "forms::string_list")]
    pub gallery: Vec<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "forms::lenient_bool")]
    pub is_featured: bool,
}

struct CleanProject {
    input: ProjectInput,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    status: String,
}

fn parse_date(field: &str, raw: Option<String>) -> CmsResult<Option<NaiveDate>> {
    match forms::blank_as_none(raw) {
        Some(value) => NaiveDate::parse_from_str(&value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| CmsError::Validation(format!("{} must be a YYYY-MM-DD date", field))),
        None => Ok(None),
    }
}

impl ProjectInput {
    fn clean(mut self) -> CmsResult<CleanProject> {
        self.title = self.title.trim().to_string();
        self.short_description = self.short_description.trim().to_string();
        self.project_type = self.project_type.trim().to_string();
        self.location = self.location.trim().to_string();
        self.featured_image = self.featured_image.trim().to_string();

        let mut errors = Vec::new();
        if self.title.is_empty() {
            errors.push("Title is required".to_string());
        }
        if self.short_description.is_empty() {
            errors.push("Short description is required".to_string());
        }
        if self.project_type.is_empty() {
            errors.push("Project type is required".to_string());
        } else if !PROJECT_TYPES.contains(&self.project_type.as_str()) {
            errors.push(format!("Project type must be one of: {}", PROJECT_TYPES.join(", ")));
        }

        let status = match self.status.trim() {
            "" => "Planned".to_string(),
            s if PROJECT_STATUSES.contains(&s) => s.to_string(),
            _ => {
                errors.push(format!("Status must be one of: {}", PROJECT_STATUSES.join(", ")));
                String::new()
            }
        };
        if !errors.is_empty() {
            return Err(CmsError::Validation(errors.join(", ")));
        }

        Ok(CleanProject {
            start_date: parse_date("Start date", self.start_date.take())?,
            end_date: parse_date("End date", self.end_date.take())?,
            status,
            input: self,
        })
    }
}

/// Listing filter shared by the admin list and the public portfolio
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default, alias = "type")]
    pub project_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient_opt_bool")]
    pub featured: Option<bool>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPage {
    pub items: Vec<Project>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

pub struct ProjectStore {
    db: SqlitePool,
}

impl ProjectStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: ProjectInput) -> CmsResult<Project> {
        let p = input.clean()?;
        let id = Uuid::new_v4();
        let slug = unique_slug(&self.db, SlugTable::Projects, &p.input.title, None).await?;

        sqlx::query(
            r#"
            INSERT INTO projects (
                id, title, slug, short_description, description, project_type, location,
                featured_image, gallery, start_date, end_date, status, is_featured, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
            "#,
        )
        .bind(id)
        .bind(&p.input.title)
        .bind(&slug)
        .bind(&p.input.short_description)
        .bind(&p.input.description)
        .bind(&p.input.project_type)
        .bind(&p.input.location)
        .bind(&p.input.featured_image)
        .bind(Json(&p.input.gallery))
        .bind(p.start_date)
        .bind(p.end_date)
        .bind(&p.status)
        .bind(p.input.is_featured)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        info!("Created project {} ({})", id, slug);
        self.get(id).await
    }

    pub async fn update(&self, id: Uuid, input: ProjectInput) -> CmsResult<Project> {
        let p = input.clean()?;

        let result = sqlx::query(
            r#"
            UPDATE projects SET
                title = ?1, short_description = ?2, description = ?3, project_type = ?4,
                location = ?5, featured_image = ?6, gallery = ?7, start_date = ?8, end_date = ?9,
                status = ?10, is_featured = ?11, updated_at = ?12
            WHERE id = ?13
            "#,
        )
        .bind(&p.input.title)
        .bind(&p.input.short_description)
        .bind(&p.input.description)
        .bind(&p.input.project_type)
        .bind(&p.input.location)
        .bind(&p.input.featured_image)
        .bind(Json(&p.input.gallery))
        .bind(p.start_date)
        .bind(p.end_date)
        .bind(&p.status)
        .bind(p.input.is_featured)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Project {} not found", id)));
        }
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<Project> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("Project {} not found", id)))?;
        row_to_project(&row)
    }

    pub async fn get_by_slug(&self, slug: &str) -> CmsResult<Project> {
        let row = sqlx::query("SELECT * FROM projects WHERE slug = ?1")
            .bind(slug)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CmsError::NotFound("Project not found".to_string()))?;
        row_to_project(&row)
    }

    /// Newest first
    pub async fn list(&self, query: &ProjectQuery, per_page: u32) -> CmsResult<ProjectPage> {
        let page = query.page.unwrap_or(1).max(1);
        let q = query.q.as_deref().map(str::trim).unwrap_or_default();
        let pattern = db::like_pattern(q);
        let project_type = forms::blank_as_none(query.project_type.clone());
        let status = forms::blank_as_none(query.status.clone());

        let filter = r#"
            (?1 = '' OR title LIKE ?2 ESCAPE '\')
            AND (?3 IS NULL OR project_type = ?3)
            AND (?4 IS NULL OR status = ?4)
            AND (?5 IS NULL OR is_featured = ?5)
        "#;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM projects WHERE {}", filter))
            .bind(q)
            .bind(&pattern)
            .bind(&project_type)
            .bind(&status)
            .bind(query.featured)
            .fetch_one(&self.db)
            .await?
            .try_get("n")?;

        let rows = sqlx::query(&format!(
            "SELECT * FROM projects WHERE {} ORDER BY created_at DESC LIMIT ?6 OFFSET ?7",
            filter
        ))
        .bind(q)
        .bind(&pattern)
        .bind(&project_type)
        .bind(&status)
        .bind(query.featured)
        .bind(i64::from(per_page))
        .bind(db::page_offset(page, per_page))
        .fetch_all(&self.db)
        .await?;

        Ok(ProjectPage {
            items: rows.iter().map(row_to_project).collect::<CmsResult<Vec<_>>>()?,
            total,
            page,
            per_page,
        })
    }

    pub async fn delete(&self, id: Uuid) -> CmsResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Project {} not found", id)));
        }
        info!("Deleted project {}", id);
        Ok(())
    }

    pub async fn count(&self) -> CmsResult<i64> {
        Ok(sqlx::query("SELECT COUNT(*) AS n FROM projects")
            .fetch_one(&self.db)
            .await?
            .try_get("n")?)
    }
}

fn row_to_project(row: &SqliteRow) -> CmsResult<Project> {
    let gallery: Json<Vec<String>> = row.try_get("gallery")?;
    Ok(Project {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        short_description: row.try_get("short_description")?,
        description: row.try_get("description")?,
        project_type: row.try_get("project_type")?,
        location: row.try_get("location")?,
        featured_image: row.try_get("featured_image")?,
        gallery: gallery.0,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        status: row.try_get("status")?,
        is_featured: row.try_get("is_featured")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str, project_type: &str, status: &str) -> ProjectInput {
        ProjectInput {
            title: title.into(),
            short_description: "Backyard build".into(),
            project_type: project_type.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_defaults_to_planned() {
        let store = ProjectStore::new(db::test_pool().await);
        let project = store
            .create(ProjectInput {
                start_date: Some("2024-04-01".into()),
                end_date: Some("".into()),
                gallery: vec!["/api/images/a".into()],
                ..input("Smith Residence", "New Pool Construction", "")
            })
            .await
            .unwrap();

        assert_eq!(project.slug, "smith-residence");
        assert_eq!(project.status, "Planned");
        assert_eq!(project.start_date, NaiveDate::from_ymd_opt(2024, 4, 1));
        assert!(project.end_date.is_none());
        assert_eq!(project.gallery.len(), 1);
        assert_eq!(store.get_by_slug("smith-residence").await.unwrap().id, project.id);
    }

    #[tokio::test]
    async fn test_validation_collects_errors() {
        let store = ProjectStore::new(db::test_pool().await);
        let err = store
            .create(ProjectInput {
                project_type: "Hot Tub".into(),
                status: "Someday".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        match err {
            CmsError::Validation(msg) => {
                assert!(msg.starts_with("Title is required, Short description is required"));
                assert!(msg.contains("Project type must be one of"));
                assert!(msg.contains("Status must be one of"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_portfolio_filters() {
        let store = ProjectStore::new(db::test_pool().await);
        store.create(input("One", "Renovation", "Completed")).await.unwrap();
        store.create(input("Two", "Renovation", "In Progress")).await.unwrap();
        store
            .create(input("Three", "Maintenance/Service", "Completed"))
            .await
            .unwrap();

        let renovations = store
            .list(
                &ProjectQuery { project_type: Some("Renovation".into()), ..Default::default() },
                PORTFOLIO_PER_PAGE,
            )
            .await
            .unwrap();
        assert_eq!(renovations.total, 2);
        assert_eq!(renovations.per_page, 12);

        let completed = store
            .list(
                &ProjectQuery {
                    project_type: Some("".into()),
                    status: Some("Completed".into()),
                    ..Default::default()
                },
                PORTFOLIO_PER_PAGE,
            )
            .await
            .unwrap();
        assert_eq!(completed.total, 2);
    }
}
