/// Page view tracking for the public site
use crate::error::CmsResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathViews {
    pub path: String,
    pub views: i64,
}

pub struct PageViews {
    db: SqlitePool,
}

impl PageViews {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Paths outside the admin area and image serving are counted
    pub fn is_tracked(method: &axum::http::Method, path: &str) -> bool {
        method == axum::http::Method::GET
            && !path.starts_with("/admin")
            && !path.starts_with("/api/images")
    }

    pub async fn record(&self, path: &str) -> CmsResult<()> {
        sqlx::query("INSERT INTO page_views (path, viewed_at) VALUES (?1, ?2)")
            .bind(path)
            .bind(Utc::now())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn count_since(&self, since: DateTime<Utc>) -> CmsResult<i64> {
        Ok(sqlx::query("SELECT COUNT(*) AS n FROM page_views WHERE viewed_at >= ?1")
            .bind(since)
            .fetch_one(&self.db)
            .await?
            .try_get("n")?)
    }

    /// Most viewed paths since `since`
    pub async fn top_paths(&self, since: DateTime<Utc>, limit: u32) -> CmsResult<Vec<PathViews>> {
        let rows = sqlx::query(
            r#"
            SELECT path, COUNT(*) AS views FROM page_views
            WHERE viewed_at >= ?1
            GROUP BY path
            ORDER BY views DESC, path ASC
            LIMIT ?2
            "#,
        )
        .bind(since)
        .bind(i64::from(limit))
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PathViews {
                    path: row.try_get("path")?,
                    views: row.try_get("views")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use axum::http::Method;
    use chrono::Duration;

    #[test]
    fn test_tracking_rules() {
        assert!(PageViews::is_tracked(&Method::GET, "/api/projects"));
        assert!(!PageViews::is_tracked(&Method::POST, "/api/leads/contact"));
        assert!(!PageViews::is_tracked(&Method::GET, "/admin/dashboard"));
        assert!(!PageViews::is_tracked(&Method::GET, "/api/images/x/large.jpg"));
    }

    #[tokio::test]
    async fn test_counts() {
        let views = PageViews::new(db::test_pool().await);
        for path in ["/", "/api/projects", "/"] {
            views.record(path).await.unwrap();
        }

        let since = Utc::now() - Duration::days(30);
        assert_eq!(views.count_since(since).await.unwrap(), 3);
        assert_eq!(views.count_since(Utc::now() + Duration::hours(1)).await.unwrap(), 0);

        let top = views.top_paths(since, 5).await.unwrap();
        assert_eq!(top[0], PathViews { path: "/".into(), views: 2 });
        assert_eq!(top.len(), 2);
    }
}
