/// Sale ledger data models
use crate::forms;
use crate::sales::calculator::LineItemsInput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One product line of a sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: f64,
    #[serde(default)]
    pub unit_cost: f64,
    /// quantity x unit price
    pub subtotal: f64,
    /// quantity x unit cost
    pub cost_total: f64,
}

/// A recorded sale with all derived amounts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecord {
    pub id: Uuid,
    pub customer_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub line_items: Vec<LineItem>,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total_cost: f64,
    pub delivery_fee: f64,
    pub profit: f64,
    pub total: f64,
    pub is_paid: bool,
    pub sale_date: DateTime<Utc>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sale create/edit payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleInput {
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default, alias = "items")]
    pub line_items: Option<LineItemsInput>,
    #[serde(default, deserialize_with = "forms::lenient_number")]
    pub delivery_fee: f64,
    #[serde(default, deserialize_with = "forms::lenient_bool")]
    pub is_paid: bool,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    #[serde(default)]
    pub sale_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Listing filter
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleQuery {
    #[serde(default, deserialize_with = "forms::lenient_opt_bool")]
    pub paid: Option<bool>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalePage {
    pub items: Vec<SaleRecord>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

/// Revenue and profit across all sales
#[derive(Debug, Default, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub count: i64,
    pub revenue: f64,
    pub profit: f64,
    pub unpaid_total: f64,
}
