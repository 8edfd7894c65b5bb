/// Admin sale ledger and customer endpoints
use crate::{
    api::extract::{parse_id, JsonOrForm},
    auth::AdminAuthContext,
    content::{Customer, CustomerInput, CustomerPage, CustomerQuery},
    context::AppContext,
    error::CmsResult,
    sales::{SaleInput, SalePage, SaleQuery, SaleRecord},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;

/// Build sale and customer routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/sales", get(list_sales).post(create_sale))
        .route(
            "/admin/sales/:id",
            get(get_sale).put(update_sale).delete(delete_sale),
        )
        .route("/admin/customers", get(list_customers).post(create_customer))
        .route("/admin/customers/all", get(all_customers))
        .route(
            "/admin/customers/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}

async fn list_sales(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Query(query): Query<SaleQuery>,
) -> CmsResult<Json<SalePage>> {
    Ok(Json(ctx.sales.list(&query).await?))
}

/// Line items may be a list of objects or parallel `product`/`quantity`/
/// `unitPrice` arrays; all amounts are derived server-side.
async fn create_sale(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Json(input): Json<SaleInput>,
) -> CmsResult<(StatusCode, Json<SaleRecord>)> {
    let sale = ctx.sales.create(&input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

async fn get_sale(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<Json<SaleRecord>> {
    Ok(Json(ctx.sales.get(parse_id(&id, "Sale")?).await?))
}

async fn update_sale(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(input): Json<SaleInput>,
) -> CmsResult<Json<SaleRecord>> {
    let id = parse_id(&id, "Sale")?;
    Ok(Json(ctx.sales.update(id, &input).await?))
}

async fn delete_sale(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<StatusCode> {
    ctx.sales.delete(parse_id(&id, "Sale")?).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_customers(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Query(query): Query<CustomerQuery>,
) -> CmsResult<Json<CustomerPage>> {
    Ok(Json(ctx.customers.list(&query).await?))
}

async fn all_customers(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
) -> CmsResult<Json<Vec<Customer>>> {
    Ok(Json(ctx.customers.list_all().await?))
}

async fn create_customer(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    JsonOrForm(input): JsonOrForm<CustomerInput>,
) -> CmsResult<(StatusCode, Json<Customer>)> {
    let customer = ctx.customers.create(input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomerDetail {
    #[serde(flatten)]
    customer: Customer,
    sales: Vec<SaleRecord>,
}

async fn get_customer(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<Json<CustomerDetail>> {
    let id = parse_id(&id, "Customer")?;
    let customer = ctx.customers.get(id).await?;
    let sales = ctx.sales.list_for_customer(id).await?;
    Ok(Json(CustomerDetail { customer, sales }))
}

async fn update_customer(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    JsonOrForm(input): JsonOrForm<CustomerInput>,
) -> CmsResult<Json<Customer>> {
    let id = parse_id(&id, "Customer")?;
    Ok(Json(ctx.customers.update(id, input).await?))
}

/// Refused with 409 while the customer still has sales
async fn delete_customer(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<StatusCode> {
    ctx.customers.delete(parse_id(&id, "Customer")?).await?;
    Ok(StatusCode::NO_CONTENT)
}
