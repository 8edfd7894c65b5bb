/// Lead intake service
use crate::{
    db,
    error::{CmsError, CmsResult},
    leads::models::*,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sqlx::{sqlite::SqliteRow, types::Json, Row, SqlitePool};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const LEADS_PER_PAGE: u32 = 20;

/// Delivers a notification about a freshly persisted lead
#[async_trait]
pub trait LeadNotifier: Send + Sync {
    async fn notify_lead(&self, lead: &LeadRecord) -> CmsResult<()>;
}

/// Fields common to every lead row
struct NewLead {
    kind: LeadKind,
    name: String,
    email: String,
    phone: String,
    message: String,
    product_id: Option<Uuid>,
    product_name: Option<String>,
    details: serde_json::Value,
}

pub struct LeadIntake {
    db: SqlitePool,
    notifier: Arc<dyn LeadNotifier>,
}

impl LeadIntake {
    pub fn new(db: SqlitePool, notifier: Arc<dyn LeadNotifier>) -> Self {
        Self { db, notifier }
    }

    /// Persist then dispatch the notification in the background.
    pub async fn submit(&self, submission: LeadSubmission) -> CmsResult<LeadRecord> {
        let lead = self.persist(submission).await?;
        self.dispatch_notification(lead.clone());
        Ok(lead)
    }

    /// Reject spam, validate and store a submission.
    ///
    /// A tripped honeypot returns [`CmsError::Spam`] before anything is
    /// validated or written.
    pub async fn persist(&self, submission: LeadSubmission) -> CmsResult<LeadRecord> {
        if submission.is_spam() {
            warn!("Rejected {} submission: honeypot filled", submission.kind());
            return Err(CmsError::Spam);
        }

        let submission = submission.normalized();
        if let Some(message) = submission.validation_message() {
            return Err(CmsError::Validation(message));
        }

        let new_lead = match submission {
            LeadSubmission::Contact(s) => NewLead {
                kind: LeadKind::Contact,
                name: s.name,
                email: s.email,
                phone: s.phone_number,
                message: s.message,
                product_id: None,
                product_name: None,
                details: json!({ "town": s.town, "projectType": s.project_type }),
            },
            LeadSubmission::ProductInquiry(s) => {
                let (product_id, product_name) = self.resolve_product(&s.product_id).await?;
                NewLead {
                    kind: LeadKind::ProductInquiry,
                    name: s.name,
                    email: s.email,
                    phone: s.phone,
                    message: s.description,
                    product_id: Some(product_id),
                    product_name: Some(product_name),
                    details: json!({ "size": s.size }),
                }
            }
            LeadSubmission::QuoteRequest(s) => {
                let product = match s.product_id.as_deref() {
                    Some(raw) => Some(self.resolve_product(raw).await?),
                    None => None,
                };
                NewLead {
                    kind: LeadKind::QuoteRequest,
                    name: s.name,
                    email: s.email,
                    phone: s.phone,
                    message: s.message,
                    product_id: product.as_ref().map(|(id, _)| *id),
                    product_name: product.map(|(_, name)| name),
                    details: json!({
                        "city": s.city,
                        "serviceType": s.service_type,
                        "selectedSizes": s.selected_sizes,
                    }),
                }
            }
        };

        let lead = self.insert(new_lead).await?;
        info!("Received {} lead {} from {}", lead.kind, lead.id, lead.email);
        Ok(lead)
    }

    /// Product id and a snapshot of its current name
    async fn resolve_product(&self, raw: &str) -> CmsResult<(Uuid, String)> {
        let id = Uuid::parse_str(raw)
            .map_err(|_| CmsError::Validation(format!("Invalid product reference: {}", raw)))?;
        let row = sqlx::query("SELECT name FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CmsError::NotFound("Product not found".to_string()))?;
        Ok((id, row.try_get("name")?))
    }

    async fn insert(&self, lead: NewLead) -> CmsResult<LeadRecord> {
        let record = LeadRecord {
            id: Uuid::new_v4(),
            kind: lead.kind,
            name: lead.name,
            email: lead.email,
            phone: lead.phone,
            message: lead.message,
            product_id: lead.product_id,
            product_name: lead.product_name,
            details: lead.details,
            is_read: false,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO leads (id, kind, name, email, phone, message, product_id, product_name, details, is_read, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)
            "#,
        )
        .bind(record.id)
        .bind(record.kind.as_str())
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.phone)
        .bind(&record.message)
        .bind(record.product_id)
        .bind(&record.product_name)
        .bind(Json(&record.details))
        .bind(record.created_at)
        .execute(&self.db)
        .await?;

        Ok(record)
    }

    /// Send the notification for a persisted lead
    pub async fn notify(&self, lead: &LeadRecord) -> CmsResult<()> {
        self.notifier
            .notify_lead(lead)
            .await
            .map_err(|e| match e {
                CmsError::Notification(_) => e,
                other => CmsError::Notification(other.to_string()),
            })
    }

    /// Notify on a detached task. Failures are logged and never reach the
    /// submitter.
    pub fn dispatch_notification(&self, lead: LeadRecord) -> JoinHandle<()> {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_lead(&lead).await {
                error!("Failed to send notification for lead {}: {}", lead.id, e);
            }
        })
    }

    pub async fn list(&self, query: &LeadQuery) -> CmsResult<LeadPage> {
        let page = query.page.unwrap_or(1).max(1);
        let kind = match query.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            Some(raw) => Some(
                LeadKind::parse(raw)
                    .ok_or_else(|| CmsError::Validation(format!("Unknown lead kind: {}", raw)))?
                    .as_str(),
            ),
            None => None,
        };
        let q = query.q.as_deref().map(str::trim).unwrap_or_default();
        let pattern = db::like_pattern(q);

        let filter = r#"
            (?1 IS NULL OR kind = ?1)
            AND (?2 IS NULL OR is_read = ?2)
            AND (?3 = '' OR name LIKE ?4 ESCAPE '\' OR email LIKE ?4 ESCAPE '\'
                 OR product_name LIKE ?4 ESCAPE '\')
        "#;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM leads WHERE {}", filter))
            .bind(kind)
            .bind(query.read)
            .bind(q)
            .bind(&pattern)
            .fetch_one(&self.db)
            .await?
            .try_get("n")?;

        let rows = sqlx::query(&format!(
            "SELECT * FROM leads WHERE {} ORDER BY created_at DESC LIMIT ?5 OFFSET ?6",
            filter
        ))
        .bind(kind)
        .bind(query.read)
        .bind(q)
        .bind(&pattern)
        .bind(i64::from(LEADS_PER_PAGE))
        .bind(db::page_offset(page, LEADS_PER_PAGE))
        .fetch_all(&self.db)
        .await?;

        Ok(LeadPage {
            items: rows.iter().map(row_to_lead).collect::<CmsResult<Vec<_>>>()?,
            total,
            page,
            per_page: LEADS_PER_PAGE,
        })
    }

    pub async fn recent(&self, limit: u32) -> CmsResult<Vec<LeadRecord>> {
        let rows = sqlx::query("SELECT * FROM leads ORDER BY created_at DESC LIMIT ?1")
            .bind(i64::from(limit))
            .fetch_all(&self.db)
            .await?;
        rows.iter().map(row_to_lead).collect()
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<LeadRecord> {
        let row = sqlx::query("SELECT * FROM leads WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("Lead {} not found", id)))?;
        row_to_lead(&row)
    }

    /// Flip the read flag, the only mutable field of a lead
    pub async fn toggle_read(&self, id: Uuid) -> CmsResult<LeadRecord> {
        let result = sqlx::query("UPDATE leads SET is_read = NOT is_read WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Lead {} not found", id)));
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: Uuid) -> CmsResult<()> {
        let result = sqlx::query("DELETE FROM leads WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Lead {} not found", id)));
        }
        info!("Deleted lead {}", id);
        Ok(())
    }

    pub async fn count_unread(&self) -> CmsResult<i64> {
        Ok(sqlx::query("SELECT COUNT(*) AS n FROM leads WHERE is_read = 0")
            .fetch_one(&self.db)
            .await?
            .try_get("n")?)
    }

    pub async fn count(&self) -> CmsResult<i64> {
        Ok(sqlx::query("SELECT COUNT(*) AS n FROM leads")
            .fetch_one(&self.db)
            .await?
            .try_get("n")?)
    }
}

fn row_to_lead(row: &SqliteRow) -> CmsResult<LeadRecord> {
    let kind: String = row.try_get("kind")?;
    let details: Json<serde_json::Value> = row.try_get("details")?;
    Ok(LeadRecord {
        id: row.try_get("id")?,
        kind: LeadKind::parse(&kind)
            .ok_or_else(|| CmsError::Internal(format!("Unknown lead kind in database: {}", kind)))?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        message: row.try_get("message")?,
        product_id: row.try_get("product_id")?,
        product_name: row.try_get("product_name")?,
        details: details.0,
        is_read: row.try_get("is_read")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every lead it is asked to announce
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<Uuid>>,
        pub fail: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn sent(&self) -> Vec<Uuid> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LeadNotifier for RecordingNotifier {
        async fn notify_lead(&self, lead: &LeadRecord) -> CmsResult<()> {
            self.sent.lock().unwrap().push(lead.id);
            if self.fail {
                return Err(CmsError::Notification("smtp unavailable".to_string()));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;

    async fn intake(notifier: Arc<RecordingNotifier>) -> (SqlitePool, LeadIntake) {
        let pool = db::test_pool().await;
        (pool.clone(), LeadIntake::new(pool, notifier))
    }

    fn valid_contact() -> LeadSubmission {
        LeadSubmission::Contact(ContactSubmission {
            name: "Jordan".into(),
            town: "Springfield".into(),
            phone_number: "555-0100".into(),
            email: "Jordan@Example.com".into(),
            project_type: "Renovation".into(),
            message: "Resurface please".into(),
            honey: None,
        })
    }

    async fn seed_product(pool: &SqlitePool, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO products (id, name, slug, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(id)
        .bind(name)
        .bind(name.to_lowercase())
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn test_submit_persists_then_notifies() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (_pool, intake) = intake(notifier.clone()).await;

        let lead = intake.persist(valid_contact()).await.unwrap();
        assert_eq!(lead.kind, LeadKind::Contact);
        assert_eq!(lead.email, "jordan@example.com");
        assert_eq!(lead.detail("town"), Some("Springfield"));
        assert!(notifier.sent().is_empty());

        intake.dispatch_notification(lead.clone()).await.unwrap();
        assert_eq!(notifier.sent(), vec![lead.id]);
    }

    #[tokio::test]
    async fn test_honeypot_persists_nothing_and_sends_nothing() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (_pool, intake) = intake(notifier.clone()).await;

        let mut submission = valid_contact();
        if let LeadSubmission::Contact(ref mut s) = submission {
            s.honey = Some("http://spam.example".into());
        }

        let err = intake.submit(submission).await.unwrap_err();
        assert!(matches!(err, CmsError::Spam));
        assert_eq!(intake.count().await.unwrap(), 0);
        tokio::task::yield_now().await;
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_lead() {
        let notifier = Arc::new(RecordingNotifier::failing());
        let (_pool, intake) = intake(notifier.clone()).await;

        let lead = intake.persist(valid_contact()).await.unwrap();
        let err = intake.notify(&lead).await.unwrap_err();
        assert!(matches!(err, CmsError::Notification(_)));

        // The detached path swallows the error
        intake.dispatch_notification(lead.clone()).await.unwrap();
        assert_eq!(intake.get(lead.id).await.unwrap().id, lead.id);
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        let (_pool, intake) = intake(Arc::new(RecordingNotifier::default())).await;
        let err = intake
            .persist(LeadSubmission::ProductInquiry(ProductInquirySubmission::default()))
            .await
            .unwrap_err();
        match err {
            CmsError::Validation(msg) => {
                assert_eq!(msg, "Product is required, Name is required, Email is required, Phone is required")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_product_inquiry_snapshots_name() {
        let (pool, intake) = intake(Arc::new(RecordingNotifier::default())).await;
        let product = seed_product(&pool, "Fiberglass 16x32").await;

        let lead = intake
            .persist(LeadSubmission::ProductInquiry(ProductInquirySubmission {
                product_id: product.to_string(),
                name: "Alex".into(),
                email: "alex@example.com".into(),
                phone: "555".into(),
                size: "16x32".into(),
                description: "Price?".into(),
                honey: Some(String::new()),
            }))
            .await
            .unwrap();

        assert_eq!(lead.product_id, Some(product));
        assert_eq!(lead.product_name.as_deref(), Some("Fiberglass 16x32"));
        assert_eq!(lead.message, "Price?");
        assert_eq!(lead.detail("size"), Some("16x32"));
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let (_pool, intake) = intake(Arc::new(RecordingNotifier::default())).await;
        let err = intake
            .persist(LeadSubmission::ProductInquiry(ProductInquirySubmission {
                product_id: Uuid::new_v4().to_string(),
                name: "Alex".into(),
                email: "alex@example.com".into(),
                phone: "555".into(),
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, CmsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_quote_request_without_product() {
        let (_pool, intake) = intake(Arc::new(RecordingNotifier::default())).await;
        let lead = intake
            .persist(LeadSubmission::QuoteRequest(QuoteRequestSubmission {
                name: "Robin".into(),
                city: "Austin".into(),
                email: "robin@example.com".into(),
                phone: "555".into(),
                service_type: "Pool Removal".into(),
                selected_sizes: vec!["12x24".into()],
                product_id: Some("  ".into()),
                ..Default::default()
            }))
            .await
            .unwrap();

        assert_eq!(lead.kind, LeadKind::QuoteRequest);
        assert!(lead.product_id.is_none());
        assert_eq!(lead.detail("serviceType"), Some("Pool Removal"));
        assert_eq!(lead.detail_list("selectedSizes"), vec!["12x24"]);
    }

    #[tokio::test]
    async fn test_admin_operations() {
        let (_pool, intake) = intake(Arc::new(RecordingNotifier::default())).await;
        let first = intake.persist(valid_contact()).await.unwrap();
        intake.persist(valid_contact()).await.unwrap();

        assert_eq!(intake.count_unread().await.unwrap(), 2);
        let toggled = intake.toggle_read(first.id).await.unwrap();
        assert!(toggled.is_read);
        assert_eq!(intake.count_unread().await.unwrap(), 1);

        let unread = intake
            .list(&LeadQuery { read: Some(false), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(unread.total, 1);

        let by_kind = intake
            .list(&LeadQuery { kind: Some("quote-request".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(by_kind.total, 0);

        let by_name = intake
            .list(&LeadQuery { q: Some("jord".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(by_name.total, 2);

        intake.delete(first.id).await.unwrap();
        assert!(matches!(intake.get(first.id).await, Err(CmsError::NotFound(_))));
        assert_eq!(intake.recent(5).await.unwrap().len(), 1);
    }
}
