/// Admin dashboard overview
use crate::{
    content::PathViews,
    context::AppContext,
    error::CmsResult,
    leads::LeadRecord,
    sales::SalesSummary,
};
use chrono::{Duration, Utc};
use serde::Serialize;

const RECENT_LEADS: u32 = 5;
const TOP_PATHS: u32 = 10;
const PAGE_VIEW_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCounts {
    pub products: i64,
    pub projects: i64,
    pub services: i64,
    pub media: i64,
    pub customers: i64,
    pub leads: i64,
    pub unread_leads: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub counts: ContentCounts,
    pub sales: SalesSummary,
    pub recent_leads: Vec<LeadRecord>,
    pub page_views_30_days: i64,
    pub top_paths: Vec<PathViews>,
}

impl Dashboard {
    pub async fn load(ctx: &AppContext) -> CmsResult<Self> {
        let since = Utc::now() - Duration::days(PAGE_VIEW_WINDOW_DAYS);

        let (products, projects, services, media, customers, leads, unread_leads) = tokio::try_join!(
            ctx.products.count(),
            ctx.projects.count(),
            ctx.services.count(),
            ctx.media.count(),
            ctx.customers.count(),
            ctx.leads.count(),
            ctx.leads.count_unread(),
        )?;

        let (sales, recent_leads, page_views_30_days, top_paths) = tokio::try_join!(
            ctx.sales.summary(),
            ctx.leads.recent(RECENT_LEADS),
            ctx.page_views.count_since(since),
            ctx.page_views.top_paths(since, TOP_PATHS),
        )?;

        Ok(Self {
            counts: ContentCounts {
                products,
                projects,
                services,
                media,
                customers,
                leads,
                unread_leads,
            },
            sales,
            recent_leads,
            page_views_30_days,
            top_paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{CustomerInput, ServiceInput};

    #[tokio::test]
    async fn test_empty_dashboard() {
        let (ctx, _, _) = AppContext::for_tests().await;
        let dashboard = Dashboard::load(&ctx).await.unwrap();
        assert_eq!(dashboard.counts.products, 0);
        assert_eq!(dashboard.sales.revenue, 0.0);
        assert!(dashboard.recent_leads.is_empty());
        assert_eq!(dashboard.page_views_30_days, 0);
    }

    #[tokio::test]
    async fn test_counts_content() {
        let (ctx, _, _) = AppContext::for_tests().await;
        ctx.services
            .create(ServiceInput {
                title: "Repairs".into(),
                icon: "bi-hammer".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        ctx.customers
            .create(CustomerInput {
                name: "Dana Reyes".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        ctx.page_views.record("/").await.unwrap();

        let dashboard = Dashboard::load(&ctx).await.unwrap();
        assert_eq!(dashboard.counts.services, 1);
        assert_eq!(dashboard.counts.customers, 1);
        assert_eq!(dashboard.page_views_30_days, 1);
        assert_eq!(dashboard.top_paths[0].path, "/");
    }
}
