/// Sale ledger service
use crate::{
    db,
    error::{CmsError, CmsResult},
    forms,
    sales::{
        calculator::{compute_sale, normalize_line_items, LineInput, ProductPricing, SaleTotals},
        models::*,
    },
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqliteRow, types::Json, Row, SqlitePool};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

pub const SALES_PER_PAGE: u32 = 20;

const SELECT_SALE: &str = r#"
    SELECT sales.*, customers.name AS customer_name
    FROM sales
    LEFT JOIN customers ON customers.id = sales.customer_id
"#;

/// Validated sale ready to persist
struct PreparedSale {
    customer_id: Uuid,
    totals: SaleTotals,
    is_paid: bool,
    sale_date: Option<DateTime<Utc>>,
    notes: String,
}

pub struct SaleLedger {
    db: SqlitePool,
    tax_rate: f64,
}

impl SaleLedger {
    pub fn new(db: SqlitePool, tax_rate: f64) -> Self {
        Self { db, tax_rate }
    }

    pub fn tax_rate(&self) -> f64 {
        self.tax_rate
    }

    /// Validate input, resolve references and compute every derived amount.
    /// Shared by create and update so both always produce the same totals.
    async fn prepare(&self, input: &SaleInput) -> CmsResult<PreparedSale> {
        let customer = forms::blank_as_none(input.customer.clone());
        let raw_lines = input
            .line_items
            .as_ref()
            .map(normalize_line_items)
            .unwrap_or_default();

        let mut missing = Vec::new();
        if customer.is_none() {
            missing.push("Customer is required");
        }
        if raw_lines.is_empty() {
            missing.push("At least one product is required");
        }
        let Some(customer) = customer.filter(|_| missing.is_empty()) else {
            return Err(CmsError::Validation(missing.join("; ")));
        };

        let customer_id = Uuid::parse_str(&customer)
            .map_err(|_| CmsError::Validation(format!("Invalid customer reference: {}", customer)))?;
        let exists = sqlx::query("SELECT 1 FROM customers WHERE id = ?1")
            .bind(customer_id)
            .fetch_optional(&self.db)
            .await?
            .is_some();
        if !exists {
            return Err(CmsError::NotFound(format!("Customer {} not found", customer_id)));
        }

        let lines = raw_lines
            .into_iter()
            .map(|raw| {
                Uuid::parse_str(&raw.product)
                    .map(|product_id| LineInput {
                        product_id,
                        quantity: raw.quantity,
                        unit_price: raw.unit_price,
                    })
                    .map_err(|_| {
                        CmsError::Validation(format!("Invalid product reference: {}", raw.product))
                    })
            })
            .collect::<CmsResult<Vec<_>>>()?;

        let pricing = self.load_pricing(&lines).await?;
        let totals = compute_sale(&lines, &pricing, input.delivery_fee, self.tax_rate);

        Ok(PreparedSale {
            customer_id,
            totals,
            is_paid: input.is_paid,
            sale_date: parse_sale_date(input.sale_date.as_deref())?,
            notes: input.notes.as_deref().map(str::trim).unwrap_or_default().to_string(),
        })
    }

    /// Taxability and cost for every product on the sale, in one query
    async fn load_pricing(&self, lines: &[LineInput]) -> CmsResult<HashMap<Uuid, ProductPricing>> {
        let mut ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, is_taxable, cost FROM products WHERE id IN ({})",
            placeholders
        );
        let mut query = sqlx::query(&sql);
        for id in &ids {
            query = query.bind(*id);
        }

        let mut pricing = HashMap::with_capacity(ids.len());
        for row in query.fetch_all(&self.db).await? {
            let id: Uuid = row.try_get("id")?;
            let cost: f64 = row.try_get("cost")?;
            pricing.insert(
                id,
                ProductPricing {
                    is_taxable: row.try_get("is_taxable")?,
                    unit_cost: forms::finite_or_zero(cost),
                },
            );
        }
        Ok(pricing)
    }

    pub async fn create(&self, input: &SaleInput) -> CmsResult<SaleRecord> {
        let prepared = self.prepare(input).await?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let t = &prepared.totals;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, customer_id, line_items, subtotal, tax_rate, tax_amount, total_cost,
                delivery_fee, profit, total, is_paid, sale_date, notes, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
            "#,
        )
        .bind(id)
        .bind(prepared.customer_id)
        .bind(Json(&t.line_items))
        .bind(t.subtotal)
        .bind(t.tax_rate)
        .bind(t.tax_amount)
        .bind(t.total_cost)
        .bind(t.delivery_fee)
        .bind(t.profit)
        .bind(t.total)
        .bind(prepared.is_paid)
        .bind(prepared.sale_date.unwrap_or(now))
        .bind(&prepared.notes)
        .bind(now)
        .execute(&self.db)
        .await?;

        info!(
            "Recorded sale {} for customer {} (total {:.2}, profit {:.2})",
            id, prepared.customer_id, t.total, t.profit
        );
        self.get(id).await
    }

    /// Replace line items wholesale and recompute every derived amount.
    /// The sale date is kept when none is supplied.
    pub async fn update(&self, id: Uuid, input: &SaleInput) -> CmsResult<SaleRecord> {
        let existing = self.get(id).await?;
        let prepared = self.prepare(input).await?;
        let t = &prepared.totals;

        sqlx::query(
            r#"
            UPDATE sales SET
                customer_id = ?1, line_items = ?2, subtotal = ?3, tax_rate = ?4, tax_amount = ?5,
                total_cost = ?6, delivery_fee = ?7, profit = ?8, total = ?9, is_paid = ?10,
                sale_date = ?11, notes = ?12, updated_at = ?13
            WHERE id = ?14
            "#,
        )
        .bind(prepared.customer_id)
        .bind(Json(&t.line_items))
        .bind(t.subtotal)
        .bind(t.tax_rate)
        .bind(t.tax_amount)
        .bind(t.total_cost)
        .bind(t.delivery_fee)
        .bind(t.profit)
        .bind(t.total)
        .bind(prepared.is_paid)
        .bind(prepared.sale_date.unwrap_or(existing.sale_date))
        .bind(&prepared.notes)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        info!("Updated sale {} (total {:.2}, profit {:.2})", id, t.total, t.profit);
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<SaleRecord> {
        let row = sqlx::query(&format!("{} WHERE sales.id = ?1", SELECT_SALE))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("Sale {} not found", id)))?;
        row_to_sale(&row)
    }

    /// Newest sale date first
    pub async fn list(&self, query: &SaleQuery) -> CmsResult<SalePage> {
        let page = query.page.unwrap_or(1).max(1);
        let customer_id = match forms::blank_as_none(query.customer_id.clone()) {
            Some(raw) => Some(
                Uuid::parse_str(&raw)
                    .map_err(|_| CmsError::Validation(format!("Invalid customer reference: {}", raw)))?,
            ),
            None => None,
        };

        let filter = "(?1 IS NULL OR sales.is_paid = ?1) AND (?2 IS NULL OR sales.customer_id = ?2)";

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM sales WHERE {}", filter))
            .bind(query.paid)
            .bind(customer_id)
            .fetch_one(&self.db)
            .await?
            .try_get("n")?;

        let rows = sqlx::query(&format!(
            "{} WHERE {} ORDER BY sales.sale_date DESC LIMIT ?3 OFFSET ?4",
            SELECT_SALE, filter
        ))
        .bind(query.paid)
        .bind(customer_id)
        .bind(i64::from(SALES_PER_PAGE))
        .bind(db::page_offset(page, SALES_PER_PAGE))
        .fetch_all(&self.db)
        .await?;

        Ok(SalePage {
            items: rows.iter().map(row_to_sale).collect::<CmsResult<Vec<_>>>()?,
            total,
            page,
            per_page: SALES_PER_PAGE,
        })
    }

    pub async fn list_for_customer(&self, customer_id: Uuid) -> CmsResult<Vec<SaleRecord>> {
        let rows = sqlx::query(&format!(
            "{} WHERE sales.customer_id = ?1 ORDER BY sales.sale_date DESC",
            SELECT_SALE
        ))
        .bind(customer_id)
        .fetch_all(&self.db)
        .await?;
        rows.iter().map(row_to_sale).collect()
    }

    pub async fn delete(&self, id: Uuid) -> CmsResult<()> {
        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Sale {} not found", id)));
        }
        info!("Deleted sale {}", id);
        Ok(())
    }

    pub async fn summary(&self) -> CmsResult<SalesSummary> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n,
                   COALESCE(SUM(total), 0.0) AS revenue,
                   COALESCE(SUM(profit), 0.0) AS profit,
                   COALESCE(SUM(CASE WHEN is_paid = 0 THEN total ELSE 0.0 END), 0.0) AS unpaid
            FROM sales
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(SalesSummary {
            count: row.try_get("n")?,
            revenue: row.try_get("revenue")?,
            profit: row.try_get("profit")?,
            unpaid_total: row.try_get("unpaid")?,
        })
    }
}

/// RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC)
fn parse_sale_date(raw: Option<&str>) -> CmsResult<Option<DateTime<Utc>>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Some(dt.and_utc()))
        .ok_or_else(|| CmsError::Validation(format!("Invalid sale date: {}", raw)))
}

fn row_to_sale(row: &SqliteRow) -> CmsResult<SaleRecord> {
    let line_items: Json<Vec<LineItem>> = row.try_get("line_items")?;
    Ok(SaleRecord {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        customer_name: row.try_get("customer_name")?,
        line_items: line_items.0,
        subtotal: row.try_get("subtotal")?,
        tax_rate: row.try_get("tax_rate")?,
        tax_amount: row.try_get("tax_amount")?,
        total_cost: row.try_get("total_cost")?,
        delivery_fee: row.try_get("delivery_fee")?,
        profit: row.try_get("profit")?,
        total: row.try_get("total")?,
        is_paid: row.try_get("is_paid")?,
        sale_date: row.try_get("sale_date")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TAX_RATE;

    async fn seed_customer(pool: &SqlitePool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO customers (id, name, created_at, updated_at) VALUES (?1, 'Dana', ?2, ?2)",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
        id
    }

    async fn seed_product(pool: &SqlitePool, name: &str, taxable: bool, cost: f64) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO products (id, name, slug, is_taxable, cost, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"#,
        )
        .bind(id)
        .bind(name)
        .bind(name.to_lowercase())
        .bind(taxable)
        .bind(cost)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
        id
    }

    fn input(json: serde_json::Value) -> SaleInput {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn test_create_computes_tax_and_profit() {
        let pool = db::test_pool().await;
        let ledger = SaleLedger::new(pool.clone(), DEFAULT_TAX_RATE);
        let customer = seed_customer(&pool).await;
        let liner = seed_product(&pool, "Liner", true, 60.0).await;
        let install = seed_product(&pool, "Install", false, 20.0).await;

        let sale = ledger
            .create(&input(serde_json::json!({
                "customer": customer.to_string(),
                "lineItems": {
                    "product": [liner.to_string(), install.to_string()],
                    "quantity": ["2", "1"],
                    "unitPrice": ["100", "50"]
                },
                "deliveryFee": "10",
                "isPaid": "on"
            })))
            .await
            .unwrap();

        assert_eq!(sale.subtotal, 250.0);
        assert_eq!(sale.tax_amount, 12.5);
        assert_eq!(sale.total, 262.5);
        assert_eq!(sale.total_cost, 140.0);
        assert_eq!(sale.profit, 100.0);
        assert_eq!(sale.tax_rate, 0.0625);
        assert!(sale.is_paid);
        assert_eq!(sale.customer_name.as_deref(), Some("Dana"));
        assert_eq!(sale.line_items.len(), 2);
        assert_eq!(sale.line_items[0].unit_cost, 60.0);
    }

    #[tokio::test]
    async fn test_missing_customer_and_items_rejected_together() {
        let pool = db::test_pool().await;
        let ledger = SaleLedger::new(pool, DEFAULT_TAX_RATE);

        let err = ledger
            .create(&input(serde_json::json!({ "lineItems": [] })))
            .await
            .unwrap_err();

        match err {
            CmsError::Validation(msg) => {
                assert!(msg.contains("Customer is required"));
                assert!(msg.contains("At least one product is required"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_all_lines_incomplete_is_rejected() {
        let pool = db::test_pool().await;
        let ledger = SaleLedger::new(pool.clone(), DEFAULT_TAX_RATE);
        let customer = seed_customer(&pool).await;

        let err = ledger
            .create(&input(serde_json::json!({
                "customer": customer.to_string(),
                "lineItems": [{ "product": "", "quantity": "1", "unitPrice": "5" }]
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, CmsError::Validation(ref m) if m == "At least one product is required"));
    }

    #[tokio::test]
    async fn test_unknown_customer_is_not_found() {
        let pool = db::test_pool().await;
        let ledger = SaleLedger::new(pool.clone(), DEFAULT_TAX_RATE);
        let product = seed_product(&pool, "Pump", true, 0.0).await;

        let err = ledger
            .create(&input(serde_json::json!({
                "customer": Uuid::new_v4().to_string(),
                "lineItems": [{ "product": product.to_string(), "quantity": 1, "unitPrice": 5 }]
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, CmsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_replaces_lines_and_keeps_date() {
        let pool = db::test_pool().await;
        let ledger = SaleLedger::new(pool.clone(), DEFAULT_TAX_RATE);
        let customer = seed_customer(&pool).await;
        let pump = seed_product(&pool, "Pump", true, 10.0).await;
        let filter = seed_product(&pool, "Filter", true, 5.0).await;

        let sale = ledger
            .create(&input(serde_json::json!({
                "customer": customer.to_string(),
                "lineItems": [{ "product": pump.to_string(), "quantity": 1, "unitPrice": 100 }],
                "saleDate": "2024-05-01"
            })))
            .await
            .unwrap();
        assert_eq!(sale.sale_date.format("%Y-%m-%d").to_string(), "2024-05-01");

        let updated = ledger
            .update(
                sale.id,
                &input(serde_json::json!({
                    "customer": customer.to_string(),
                    "lineItems": [{ "product": filter.to_string(), "quantity": 3, "unitPrice": 20 }]
                })),
            )
            .await
            .unwrap();

        assert_eq!(updated.line_items.len(), 1);
        assert_eq!(updated.line_items[0].product_id, filter);
        assert_eq!(updated.subtotal, 60.0);
        assert_eq!(updated.tax_amount, 3.75);
        assert_eq!(updated.profit, 45.0);
        assert_eq!(updated.sale_date, sale.sale_date);
        assert!(!updated.is_paid);
    }

    #[tokio::test]
    async fn test_repeated_update_is_stable() {
        let pool = db::test_pool().await;
        let ledger = SaleLedger::new(pool.clone(), DEFAULT_TAX_RATE);
        let customer = seed_customer(&pool).await;
        let chlorine = seed_product(&pool, "Chlorine", true, 4.7).await;
        let labor = seed_product(&pool, "Labor", false, 0.0).await;

        let edit = input(serde_json::json!({
            "customer": customer.to_string(),
            "lineItems": {
                "product": [chlorine.to_string(), labor.to_string()],
                "quantity": ["3", "1"],
                "unitPrice": ["9.99", "25"]
            },
            "deliveryFee": "0"
        }));
        let sale = ledger.create(&edit).await.unwrap();

        let first = ledger.update(sale.id, &edit).await.unwrap();
        let second = ledger.update(sale.id, &edit).await.unwrap();

        let totals = |s: &SaleRecord| (s.subtotal, s.tax_amount, s.total, s.total_cost, s.profit);
        assert_eq!(totals(&first), totals(&second));
        assert_eq!(totals(&first), totals(&sale));
        assert_eq!(first.line_items, second.line_items);
        assert_eq!(second.line_items.len(), 2);
        assert_eq!(second.tax_rate, first.tax_rate);
    }

    #[tokio::test]
    async fn test_update_missing_sale() {
        let pool = db::test_pool().await;
        let ledger = SaleLedger::new(pool, DEFAULT_TAX_RATE);
        let err = ledger.update(Uuid::new_v4(), &SaleInput::default()).await.unwrap_err();
        assert!(matches!(err, CmsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_and_summary() {
        let pool = db::test_pool().await;
        let ledger = SaleLedger::new(pool.clone(), DEFAULT_TAX_RATE);
        let customer = seed_customer(&pool).await;
        let product = seed_product(&pool, "Cover", false, 0.0).await;

        for paid in ["on", ""] {
            ledger
                .create(&input(serde_json::json!({
                    "customer": customer.to_string(),
                    "lineItems": [{ "product": product.to_string(), "quantity": 1, "unitPrice": 40 }],
                    "isPaid": paid
                })))
                .await
                .unwrap();
        }

        let paid = ledger
            .list(&SaleQuery { paid: Some(true), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(paid.total, 1);

        let by_customer = ledger
            .list(&SaleQuery { customer_id: Some(customer.to_string()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(by_customer.total, 2);
        assert_eq!(ledger.list_for_customer(customer).await.unwrap().len(), 2);

        let summary = ledger.summary().await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.revenue, 80.0);
        assert_eq!(summary.unpaid_total, 40.0);
    }

    #[tokio::test]
    async fn test_delete() {
        let pool = db::test_pool().await;
        let ledger = SaleLedger::new(pool, DEFAULT_TAX_RATE);
        assert!(matches!(
            ledger.delete(Uuid::new_v4()).await,
            Err(CmsError::NotFound(_))
        ));
    }

    #[test]
    fn test_parse_sale_date() {
        assert_eq!(parse_sale_date(None).unwrap(), None);
        assert_eq!(parse_sale_date(Some("  ")).unwrap(), None);
        assert!(parse_sale_date(Some("2024-02-30")).is_err());
        assert!(parse_sale_date(Some("2024-02-03T10:00:00Z")).unwrap().is_some());
    }
}
