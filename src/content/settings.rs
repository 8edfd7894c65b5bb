/// Site-wide settings (single row)
use crate::error::CmsResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, types::Json, Row, SqlitePool};
use tracing::{info, warn};

pub const DEFAULT_COMPANY_NAME: &str = "Goodfella Pools";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialLinks {
    pub facebook_url: String,
    pub instagram_url: String,
    pub tiktok_url: String,
    pub youtube_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeoDefaults {
    pub default_title: String,
    pub default_meta_description: String,
    pub default_og_image: String,
}

impl Default for SeoDefaults {
    fn default() -> Self {
        Self {
            default_title: DEFAULT_COMPANY_NAME.to_string(),
            default_meta_description: String::new(),
            default_og_image: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettings {
    pub company_name: String,
    pub tagline: String,
    pub address: String,
    pub service_area: String,
    pub phone: String,
    pub email: String,
    pub social: SocialLinks,
    pub seo: SeoDefaults,
    pub updated_at: DateTime<Utc>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            company_name: DEFAULT_COMPANY_NAME.to_string(),
            tagline: String::new(),
            address: String::new(),
            service_area: String::new(),
            phone: String::new(),
            email: String::new(),
            social: SocialLinks::default(),
            seo: SeoDefaults::default(),
            updated_at: Utc::now(),
        }
    }
}

/// Settings form; social and SEO fields arrive flat
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsInput {
    pub company_name: String,
    pub tagline: String,
    pub address: String,
    pub service_area: String,
    pub phone: String,
    pub email: String,
    pub facebook_url: String,
    pub instagram_url: String,
    pub tiktok_url: String,
    pub youtube_url: String,
    pub default_title: String,
    pub default_meta_description: String,
    pub default_og_image: String,
}

pub struct SettingsStore {
    db: SqlitePool,
}

impl SettingsStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Current settings, creating the row with defaults on first read
    pub async fn get(&self) -> CmsResult<SiteSettings> {
        sqlx::query(
            r#"
            INSERT INTO site_settings (id, company_name, social, seo, created_at, updated_at)
            VALUES (1, ?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(DEFAULT_COMPANY_NAME)
        .bind(Json(SocialLinks::default()))
        .bind(Json(SeoDefaults::default()))
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        let row = sqlx::query("SELECT * FROM site_settings WHERE id = 1")
            .fetch_one(&self.db)
            .await?;
        row_to_settings(&row)
    }

    /// Public read; never fails, falling back to defaults
    pub async fn get_or_default(&self) -> SiteSettings {
        match self.get().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load site settings, using defaults: {}", e);
                SiteSettings::default()
            }
        }
    }

    /// A blank company name keeps the current one; a blank default title
    /// falls back to the company name.
    pub async fn update(&self, input: SettingsInput) -> CmsResult<SiteSettings> {
        let current = self.get().await?;
        let t = |s: &str| s.trim().to_string();

        let company_name = match input.company_name.trim() {
            "" => current.company_name,
            name => name.to_string(),
        };
        let seo = SeoDefaults {
            default_title: match input.default_title.trim() {
                "" => company_name.clone(),
                title => title.to_string(),
            },
            default_meta_description: t(&input.default_meta_description),
            default_og_image: t(&input.default_og_image),
        };
        let social = SocialLinks {
            facebook_url: t(&input.facebook_url),
            instagram_url: t(&input.instagram_url),
            tiktok_url: t(&input.tiktok_url),
            youtube_url: t(&input.youtube_url),
        };

        sqlx::query(
            r#"
            UPDATE site_settings SET
                company_name = ?1, tagline = ?2, address = ?3, service_area = ?4, phone = ?5,
                email = ?6, social = ?7, seo = ?8, updated_at = ?9
            WHERE id = 1
            "#,
        )
        .bind(&company_name)
        .bind(t(&input.tagline))
        .bind(t(&input.address))
        .bind(t(&input.service_area))
        .bind(t(&input.phone))
        .bind(t(&input.email))
        .bind(Json(&social))
        .bind(Json(&seo))
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        info!("Updated site settings");
        self.get().await
    }
}

fn row_to_settings(row: &SqliteRow) -> CmsResult<SiteSettings> {
    let social: Json<SocialLinks> = row.try_get("social")?;
    let seo: Json<SeoDefaults> = row.try_get("seo")?;
    Ok(SiteSettings {
        company_name: row.try_get("company_name")?,
        tagline: row.try_get("tagline")?,
        address: row.try_get("address")?,
        service_area: row.try_get("service_area")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        social: social.0,
        seo: seo.0,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_first_read_creates_defaults() {
        let store = SettingsStore::new(db::test_pool().await);
        let settings = store.get().await.unwrap();
        assert_eq!(settings.company_name, "Goodfella Pools");
        assert_eq!(settings.seo.default_title, "Goodfella Pools");
        assert_eq!(settings.social, SocialLinks::default());

        // Second read reuses the row
        assert_eq!(store.get().await.unwrap().company_name, "Goodfella Pools");
    }

    #[tokio::test]
    async fn test_update_rules() {
        let store = SettingsStore::new(db::test_pool().await);
        let updated = store
            .update(SettingsInput {
                company_name: "Blue Lagoon Pools".into(),
                phone: " 555-0199 ".into(),
                instagram_url: "https://instagram.com/bluelagoon".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.company_name, "Blue Lagoon Pools");
        assert_eq!(updated.seo.default_title, "Blue Lagoon Pools");
        assert_eq!(updated.phone, "555-0199");
        assert_eq!(updated.social.instagram_url, "https://instagram.com/bluelagoon");

        let kept = store.update(SettingsInput::default()).await.unwrap();
        assert_eq!(kept.company_name, "Blue Lagoon Pools");
        assert_eq!(kept.phone, "");
    }

    #[tokio::test]
    async fn test_get_or_default_survives_errors() {
        let pool = db::test_pool().await;
        let store = SettingsStore::new(pool.clone());
        pool.close().await;
        assert_eq!(store.get_or_default().await.company_name, DEFAULT_COMPANY_NAME);
    }
}
