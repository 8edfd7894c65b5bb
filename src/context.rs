/// Application context and dependency injection
use crate::{
    admin::AdminUsers,
    blob_store::{self, BlobBackend},
    config::{BlobstoreConfig, ServerConfig},
    content::{CustomerStore, PageViews, ProductStore, ProjectStore, ServiceStore, SettingsStore},
    db,
    error::{CmsError, CmsResult},
    imaging::RenditionGenerator,
    leads::{LeadIntake, LeadNotifier},
    mailer::Mailer,
    media::MediaCatalog,
    rate_limit::RateLimiter,
    sales::SaleLedger,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    /// Constructed once at startup and shared by every media component
    pub blob_backend: Arc<dyn BlobBackend>,
    pub media: Arc<MediaCatalog>,
    pub sales: Arc<SaleLedger>,
    pub leads: Arc<LeadIntake>,
    pub products: Arc<ProductStore>,
    pub customers: Arc<CustomerStore>,
    pub projects: Arc<ProjectStore>,
    pub services: Arc<ServiceStore>,
    pub settings: Arc<SettingsStore>,
    pub page_views: Arc<PageViews>,
    pub admins: Arc<AdminUsers>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> CmsResult<Self> {
        config.validate()?;
        Self::ensure_directories(&config).await?;

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let blob_backend = blob_store::create_backend(&config.storage.blobstore).await?;
        let notifier: Arc<dyn LeadNotifier> = Arc::new(Mailer::new(config.email.clone())?);
        if config.email.is_none() {
            tracing::warn!("Email not configured; lead notifications will be skipped");
        }

        let ctx = Self::assemble(config, pool, blob_backend, notifier);

        if let Some(admin) = &ctx.config.authentication.bootstrap_admin {
            ctx.admins.bootstrap(admin).await?;
        }
        if ctx.admins.count().await? == 0 {
            tracing::warn!("No admin users exist; set CMS_ADMIN_EMAIL and CMS_ADMIN_PASSWORD to create one");
        }

        Ok(ctx)
    }

    /// Wire services around an open pool and blob backend
    pub fn assemble(
        config: ServerConfig,
        pool: SqlitePool,
        blob_backend: Arc<dyn BlobBackend>,
        notifier: Arc<dyn LeadNotifier>,
    ) -> Self {
        let generator =
            RenditionGenerator::new(blob_backend.clone(), config.imaging.transcode_concurrency);

        Self {
            media: Arc::new(MediaCatalog::new(pool.clone(), blob_backend.clone(), generator)),
            sales: Arc::new(SaleLedger::new(pool.clone(), config.sales.tax_rate)),
            leads: Arc::new(LeadIntake::new(pool.clone(), notifier)),
            products: Arc::new(ProductStore::new(pool.clone())),
            customers: Arc::new(CustomerStore::new(pool.clone())),
            projects: Arc::new(ProjectStore::new(pool.clone())),
            services: Arc::new(ServiceStore::new(pool.clone())),
            settings: Arc::new(SettingsStore::new(pool.clone())),
            page_views: Arc::new(PageViews::new(pool.clone())),
            admins: Arc::new(AdminUsers::new(pool.clone())),
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            blob_backend,
            db: pool,
            config: Arc::new(config),
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> CmsResult<()> {
        tokio::fs::create_dir_all(&config.storage.data_directory)
            .await
            .map_err(|e| {
                CmsError::Internal(format!(
                    "Failed to create directory {:?}: {}",
                    config.storage.data_directory, e
                ))
            })?;

        if let BlobstoreConfig::Disk { location } = &config.storage.blobstore {
            tokio::fs::create_dir_all(location).await?;
        }

        Ok(())
    }

    /// In-memory database, memory blob backend and a recording notifier
    #[cfg(test)]
    pub async fn for_tests() -> (
        Self,
        Arc<crate::blob_store::memory::MemoryBlobBackend>,
        Arc<crate::leads::intake::testing::RecordingNotifier>,
    ) {
        let dir = std::env::temp_dir();
        let backend = Arc::new(crate::blob_store::memory::MemoryBlobBackend::new());
        let notifier = Arc::new(crate::leads::intake::testing::RecordingNotifier::default());
        let ctx = Self::assemble(
            ServerConfig::for_tests(&dir),
            db::test_pool().await,
            backend.clone(),
            notifier.clone(),
        );
        (ctx, backend, notifier)
    }
}
