/// URL slug generation
use crate::error::{CmsError, CmsResult};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

const MAX_SUFFIX_ATTEMPTS: u32 = 1000;

/// Tables whose rows are addressed by slug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugTable {
    Products,
    Projects,
    Services,
}

impl SlugTable {
    fn table(&self) -> &'static str {
        match self {
            SlugTable::Products => "products",
            SlugTable::Projects => "projects",
            SlugTable::Services => "services",
        }
    }

    fn fallback(&self) -> &'static str {
        match self {
            SlugTable::Products => "product",
            SlugTable::Projects => "project",
            SlugTable::Services => "service",
        }
    }
}

/// Lowercase ASCII letters and digits separated by single hyphens.
///
/// A few common symbols are spelled out; every other character acts as a
/// separator.
pub fn slugify(input: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for c in input.chars() {
        match c {
            'a'..='z' | '0'..='9' => current.push(c),
            'A'..='Z' => current.push(c.to_ascii_lowercase()),
            '\'' | '\u{2019}' => {}
            '&' => {
                words.push(std::mem::take(&mut current));
                words.push("and".to_string());
            }
            _ => words.push(std::mem::take(&mut current)),
        }
    }
    words.push(current);

    words
        .into_iter()
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// A slug for `base_text` that no other row of `table` uses.
///
/// Tries `base`, then `base-1`, `base-2`, ... and falls back to a
/// timestamp suffix after 1000 attempts. `exclude` is the row being
/// edited, which may keep its own slug.
pub async fn unique_slug(
    db: &SqlitePool,
    table: SlugTable,
    base_text: &str,
    exclude: Option<Uuid>,
) -> CmsResult<String> {
    let mut base = slugify(base_text);
    if base.is_empty() {
        base = table.fallback().to_string();
    }

    let sql = format!(
        "SELECT 1 FROM {} WHERE slug = ?1 AND (?2 IS NULL OR id != ?2)",
        table.table()
    );

    let mut candidate = base.clone();
    for attempt in 1..=MAX_SUFFIX_ATTEMPTS {
        let taken = sqlx::query(&sql)
            .bind(&candidate)
            .bind(exclude)
            .fetch_optional(db)
            .await
            .map_err(CmsError::from)?
            .is_some();
        if !taken {
            return Ok(candidate);
        }
        candidate = format!("{}-{}", base, attempt);
    }

    Ok(format!("{}-{}", base, Utc::now().timestamp_millis()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Backyard Oasis 2024"), "backyard-oasis-2024");
        assert_eq!(slugify("  Pool & Spa  "), "pool-and-spa");
        assert_eq!(slugify("Smith's Renovation!!"), "smiths-renovation");
        assert_eq!(slugify("16x32 -- Fiberglass"), "16x32-fiberglass");
        assert_eq!(slugify("!!!"), "");
    }

    async fn insert_service(pool: &SqlitePool, slug: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO services (id, title, slug, icon, created_at, updated_at) VALUES (?1, 't', ?2, 'bi-star', ?3, ?3)",
        )
        .bind(id)
        .bind(slug)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn test_unique_slug_appends_suffix() {
        let pool = db::test_pool().await;
        assert_eq!(
            unique_slug(&pool, SlugTable::Services, "Pool Cleaning", None).await.unwrap(),
            "pool-cleaning"
        );

        let first = insert_service(&pool, "pool-cleaning").await;
        assert_eq!(
            unique_slug(&pool, SlugTable::Services, "Pool Cleaning", None).await.unwrap(),
            "pool-cleaning-1"
        );

        insert_service(&pool, "pool-cleaning-1").await;
        assert_eq!(
            unique_slug(&pool, SlugTable::Services, "Pool Cleaning", None).await.unwrap(),
            "pool-cleaning-2"
        );

        // The row being edited keeps its slug
        assert_eq!(
            unique_slug(&pool, SlugTable::Services, "Pool Cleaning", Some(first)).await.unwrap(),
            "pool-cleaning"
        );
    }

    #[tokio::test]
    async fn test_empty_base_uses_fallback() {
        let pool = db::test_pool().await;
        assert_eq!(
            unique_slug(&pool, SlugTable::Projects, "???", None).await.unwrap(),
            "project"
        );
    }
}
