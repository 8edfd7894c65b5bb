/// Background task implementations
use crate::{context::AppContext, error::CmsResult};
use chrono::Duration;

/// Rendition groups younger than this may still be mid-upload
const ORPHAN_MIN_AGE_HOURS: i64 = 1;

/// Delete stored renditions that no media record references
pub async fn sweep_orphaned_renditions(ctx: &AppContext) -> CmsResult<u64> {
    ctx.media
        .sweep_orphans(Duration::hours(ORPHAN_MIN_AGE_HOURS))
        .await
}

/// Health check - verify the database answers
pub async fn health_check(ctx: &AppContext) -> CmsResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}

/// Forget rate-limit state for clients whose budget has refilled
pub fn prune_rate_limits(ctx: &AppContext) -> usize {
    ctx.rate_limiter.prune()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::{BlobBackend, BlobKey, BlobMeta};
    use crate::config::RateLimitConfig;
    use crate::rate_limit::RateLimiter;
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_health_check() {
        let (ctx, _, _) = AppContext::for_tests().await;
        health_check(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_prune_rate_limits() {
        let (mut ctx, _, _) = AppContext::for_tests().await;
        ctx.rate_limiter = Arc::new(RateLimiter::new(&RateLimitConfig {
            enabled: true,
            lead_submissions_per_minute: 10,
        }));
        assert_eq!(prune_rate_limits(&ctx), 0);

        let client = "198.51.100.4".parse().unwrap();
        ctx.rate_limiter.check_lead_submission(client).unwrap();
        // Budget not yet refilled, so the client stays tracked
        assert_eq!(prune_rate_limits(&ctx), 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_old_orphans() {
        let (ctx, backend, _) = AppContext::for_tests().await;
        let meta = BlobMeta {
            original_name: "pool.jpg".into(),
            content_type: "image/jpeg".into(),
            size_tag: "large".into(),
        };

        let old = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        for id in [old, fresh] {
            let key = BlobKey::new(id, "large", "jpg").unwrap();
            backend.put(&key, vec![1, 2, 3], &meta).await.unwrap();
        }
        backend.age_group(old, Utc::now() - Duration::hours(2));

        assert_eq!(sweep_orphaned_renditions(&ctx).await.unwrap(), 1);
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.keys()[0].asset_id(), fresh);
    }
}
