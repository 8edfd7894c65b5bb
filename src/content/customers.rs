/// Customer records for the sale ledger
use crate::{
    db,
    error::{CmsError, CmsResult},
    forms,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

pub const CUSTOMERS_PER_PAGE: u32 = 20;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub notes: String,
}

impl CustomerInput {
    fn clean(self) -> CmsResult<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(CmsError::Validation("Name is required".to_string()));
        }
        Ok(Self {
            name,
            email: forms::blank_as_none(self.email).map(|e| e.to_lowercase()),
            phone: forms::blank_as_none(self.phone),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            zip_code: self.zip_code.trim().to_string(),
            notes: self.notes.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPage {
    pub items: Vec<Customer>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

pub struct CustomerStore {
    db: SqlitePool,
}

impl CustomerStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: CustomerInput) -> CmsResult<Customer> {
        let c = input.clean()?;
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, phone, address, city, state, zip_code, notes, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            "#,
        )
        .bind(id)
        .bind(&c.name)
        .bind(&c.email)
        .bind(&c.phone)
        .bind(&c.address)
        .bind(&c.city)
        .bind(&c.state)
        .bind(&c.zip_code)
        .bind(&c.notes)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        info!("Created customer {}", id);
        self.get(id).await
    }

    pub async fn update(&self, id: Uuid, input: CustomerInput) -> CmsResult<Customer> {
        let c = input.clean()?;

        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = ?1, email = ?2, phone = ?3, address = ?4, city = ?5, state = ?6,
                zip_code = ?7, notes = ?8, updated_at = ?9
            WHERE id = ?10
            "#,
        )
        .bind(&c.name)
        .bind(&c.email)
        .bind(&c.phone)
        .bind(&c.address)
        .bind(&c.city)
        .bind(&c.state)
        .bind(&c.zip_code)
        .bind(&c.notes)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Customer {} not found", id)));
        }
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<Customer> {
        let row = sqlx::query("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("Customer {} not found", id)))?;
        row_to_customer(&row)
    }

    /// Newest first; `search` matches name, email or phone
    pub async fn list(&self, query: &CustomerQuery) -> CmsResult<CustomerPage> {
        let page = query.page.unwrap_or(1).max(1);
        let search = query.search.as_deref().map(str::trim).unwrap_or_default();
        let pattern = db::like_pattern(search);
        let filter = r#"(?1 = '' OR name LIKE ?2 ESCAPE '\' OR email LIKE ?2 ESCAPE '\' OR phone LIKE ?2 ESCAPE '\')"#;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM customers WHERE {}", filter))
            .bind(search)
            .bind(&pattern)
            .fetch_one(&self.db)
            .await?
            .try_get("n")?;

        let rows = sqlx::query(&format!(
            "SELECT * FROM customers WHERE {} ORDER BY created_at DESC LIMIT ?3 OFFSET ?4",
            filter
        ))
        .bind(search)
        .bind(&pattern)
        .bind(i64::from(CUSTOMERS_PER_PAGE))
        .bind(db::page_offset(page, CUSTOMERS_PER_PAGE))
        .fetch_all(&self.db)
        .await?;

        Ok(CustomerPage {
            items: rows.iter().map(row_to_customer).collect::<CmsResult<Vec<_>>>()?,
            total,
            page,
            per_page: CUSTOMERS_PER_PAGE,
        })
    }

    /// Every customer by name, for sale form pickers
    pub async fn list_all(&self) -> CmsResult<Vec<Customer>> {
        let rows = sqlx::query("SELECT * FROM customers ORDER BY name ASC")
            .fetch_all(&self.db)
            .await?;
        rows.iter().map(row_to_customer).collect()
    }

    /// Refused while the customer still has sales
    pub async fn delete(&self, id: Uuid) -> CmsResult<()> {
        self.get(id).await?;

        let sales: i64 = sqlx::query("SELECT COUNT(*) AS n FROM sales WHERE customer_id = ?1")
            .bind(id)
            .fetch_one(&self.db)
            .await?
            .try_get("n")?;
        if sales > 0 {
            return Err(CmsError::Conflict(
                "Cannot delete customer with existing sales. Delete sales first.".to_string(),
            ));
        }

        sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        info!("Deleted customer {}", id);
        Ok(())
    }

    pub async fn count(&self) -> CmsResult<i64> {
        Ok(sqlx::query("SELECT COUNT(*) AS n FROM customers")
            .fetch_one(&self.db)
            .await?
            .try_get("n")?)
    }
}

fn row_to_customer(row: &SqliteRow) -> CmsResult<Customer> {
    Ok(Customer {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        address: row.try_get("address")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        zip_code: row.try_get("zip_code")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
