/// Sale totals computation
///
/// Pure functions shared by sale creation and editing. Nothing here touches
/// the database; product pricing is looked up by the caller and passed in.
use crate::forms::{finite_or_zero, FormValue, OneOrMany};
use crate::sales::models::LineItem;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Line items as submitted: either a list of row objects or parallel
/// `product` / `quantity` / `unitPrice` columns (each a list or a scalar).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LineItemsInput {
    Rows(Vec<LineItemRow>),
    Columns(LineItemColumns),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRow {
    #[serde(default)]
    pub product: Option<FormValue>,
    #[serde(default)]
    pub quantity: Option<FormValue>,
    #[serde(default)]
    pub unit_price: Option<FormValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemColumns {
    #[serde(default)]
    pub product: OneOrMany<FormValue>,
    #[serde(default)]
    pub quantity: OneOrMany<FormValue>,
    #[serde(default)]
    pub unit_price: OneOrMany<FormValue>,
}

/// A line that survived normalisation; the product reference is not yet resolved
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    pub product: String,
    pub quantity: u32,
    pub unit_price: f64,
}

/// A line with a resolved product id
#[derive(Debug, Clone, PartialEq)]
pub struct LineInput {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: f64,
}

/// Taxability and unit cost of a product at computation time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductPricing {
    pub is_taxable: bool,
    pub unit_cost: f64,
}

impl Default for ProductPricing {
    fn default() -> Self {
        Self {
            is_taxable: true,
            unit_cost: 0.0,
        }
    }
}

/// Every derived amount of a sale
#[derive(Debug, Clone, PartialEq)]
pub struct SaleTotals {
    pub line_items: Vec<LineItem>,
    pub subtotal: f64,
    pub taxable_subtotal: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total_cost: f64,
    pub delivery_fee: f64,
    pub profit: f64,
    pub total: f64,
}

fn present(value: &Option<FormValue>) -> Option<&FormValue> {
    value.as_ref().filter(|v| !v.is_blank())
}

fn normalize_one(
    product: &Option<FormValue>,
    quantity: &Option<FormValue>,
    unit_price: &Option<FormValue>,
) -> Option<RawLine> {
    let product = present(product)?.as_text();
    let quantity = present(quantity)?.as_number().floor();
    let unit_price = present(unit_price)?.as_number();

    // Quantities must be positive whole numbers
    if quantity < 1.0 || quantity > f64::from(u32::MAX) {
        return None;
    }

    Some(RawLine {
        product,
        quantity: quantity as u32,
        unit_price: unit_price.max(0.0),
    })
}

/// Drop lines missing a product, quantity or unit price.
///
/// Unparseable prices degrade to 0; quantities that are not a positive
/// whole number after flooring drop the line.
pub fn normalize_line_items(input: &LineItemsInput) -> Vec<RawLine> {
    match input {
        LineItemsInput::Rows(rows) => rows
            .iter()
            .filter_map(|r| normalize_one(&r.product, &r.quantity, &r.unit_price))
            .collect(),
        LineItemsInput::Columns(cols) => {
            let products = cols.product.clone().into_vec();
            let quantities = cols.quantity.clone().into_vec();
            let prices = cols.unit_price.clone().into_vec();

            products
                .iter()
                .enumerate()
                .filter_map(|(i, product)| {
                    let quantity = quantities.get(i).cloned().flatten();
                    let price = prices.get(i).cloned().flatten();
                    normalize_one(product, &quantity, &price)
                })
                .collect()
        }
    }
}

/// Compute line amounts and sale aggregates.
///
/// Products absent from `pricing` are treated as taxable with zero cost.
/// Profit is the per-line margin minus the delivery fee; tax is never part
/// of profit. Every amount is finite.
pub fn compute_sale(
    lines: &[LineInput],
    pricing: &HashMap<Uuid, ProductPricing>,
    delivery_fee: f64,
    tax_rate: f64,
) -> SaleTotals {
    let delivery_fee = finite_or_zero(delivery_fee);
    let tax_rate = finite_or_zero(tax_rate);

    let mut line_items = Vec::with_capacity(lines.len());
    let mut subtotal = 0.0;
    let mut taxable_subtotal = 0.0;
    let mut total_cost = 0.0;
    let mut gross_profit = 0.0;

    for line in lines {
        let price = pricing.get(&line.product_id).copied().unwrap_or_default();
        let quantity = f64::from(line.quantity);
        let unit_price = finite_or_zero(line.unit_price);
        let unit_cost = finite_or_zero(price.unit_cost);

        let line_subtotal = finite_or_zero(quantity * unit_price);
        let cost_total = finite_or_zero(quantity * unit_cost);

        subtotal += line_subtotal;
        if price.is_taxable {
            taxable_subtotal += line_subtotal;
        }
        total_cost += cost_total;
        gross_profit += finite_or_zero((unit_price - unit_cost) * quantity);

        line_items.push(LineItem {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price,
            unit_cost,
            subtotal: line_subtotal,
            cost_total,
        });
    }

    let subtotal = finite_or_zero(subtotal);
    let taxable_subtotal = finite_or_zero(taxable_subtotal);
    let tax_amount = finite_or_zero(taxable_subtotal * tax_rate);

    SaleTotals {
        line_items,
        subtotal,
        taxable_subtotal,
        tax_rate,
        tax_amount,
        total_cost: finite_or_zero(total_cost),
        delivery_fee,
        profit: finite_or_zero(gross_profit - delivery_fee),
        total: finite_or_zero(subtotal + tax_amount),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f64 = 0.0625;

    fn line(id: Uuid, quantity: u32, unit_price: f64) -> LineInput {
        LineInput {
            product_id: id,
            quantity,
            unit_price,
        }
    }

    #[test]
    fn test_selective_tax() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let pricing = HashMap::from([
            (a, ProductPricing { is_taxable: true, unit_cost: 0.0 }),
            (b, ProductPricing { is_taxable: false, unit_cost: 0.0 }),
        ]);

        let totals = compute_sale(&[line(a, 2, 100.0), line(b, 1, 50.0)], &pricing, 0.0, RATE);

        assert_eq!(totals.taxable_subtotal, 200.0);
        assert_eq!(totals.tax_amount, 12.5);
        assert_eq!(totals.subtotal, 250.0);
        assert_eq!(totals.total, 262.5);
    }

    #[test]
    fn test_profit_subtracts_delivery_not_tax() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let pricing = HashMap::from([
            (a, ProductPricing { is_taxable: true, unit_cost: 60.0 }),
            (b, ProductPricing { is_taxable: false, unit_cost: 20.0 }),
        ]);

        let totals = compute_sale(&[line(a, 2, 100.0), line(b, 1, 50.0)], &pricing, 10.0, RATE);

        assert_eq!(totals.total_cost, 140.0);
        assert_eq!(totals.profit, 100.0);
        assert_eq!(totals.delivery_fee, 10.0);
        assert_eq!(totals.line_items[0].cost_total, 120.0);
        assert_eq!(totals.line_items[1].subtotal, 50.0);
        // Delivery fee is not part of the customer total
        assert_eq!(totals.total, 262.5);
    }

    #[test]
    fn test_unknown_products_default_taxable_and_free() {
        let id = Uuid::new_v4();
        let totals = compute_sale(&[line(id, 3, 10.0)], &HashMap::new(), 0.0, RATE);
        assert_eq!(totals.tax_amount, 30.0 * RATE);
        assert_eq!(totals.total_cost, 0.0);
        assert_eq!(totals.profit, 30.0);
    }

    #[test]
    fn test_non_finite_inputs_degrade_to_zero() {
        let id = Uuid::new_v4();
        let pricing = HashMap::from([(id, ProductPricing { is_taxable: true, unit_cost: f64::NAN })]);

        let totals = compute_sale(&[line(id, 2, f64::NAN)], &pricing, f64::INFINITY, f64::NAN);

        for amount in [
            totals.subtotal,
            totals.tax_amount,
            totals.total_cost,
            totals.delivery_fee,
            totals.profit,
            totals.total,
        ] {
            assert_eq!(amount, 0.0);
        }
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let id = Uuid::new_v4();
        let pricing = HashMap::from([(id, ProductPricing { is_taxable: true, unit_cost: 3.0 })]);
        let lines = [line(id, 4, 9.99)];

        let first = compute_sale(&lines, &pricing, 5.0, RATE);
        let second = compute_sale(&lines, &pricing, 5.0, RATE);
        assert_eq!(first, second);
    }

    #[test]
    fn test_normalize_rows_drops_incomplete_entries() {
        let input: LineItemsInput = serde_json::from_str(
            r#"[
                {"product": "p1", "quantity": 2, "unitPrice": "100"},
                {"product": "", "quantity": 1, "unitPrice": 5},
                {"product": "p2", "unitPrice": 5},
                {"product": "p3", "quantity": "1", "unitPrice": null},
                {"product": "p4", "quantity": "2.7", "unitPrice": "abc"}
            ]"#,
        )
        .unwrap();

        let lines = normalize_line_items(&input);
        assert_eq!(
            lines,
            vec![
                RawLine { product: "p1".into(), quantity: 2, unit_price: 100.0 },
                RawLine { product: "p4".into(), quantity: 2, unit_price: 0.0 },
            ]
        );
    }

    #[test]
    fn test_normalize_parallel_columns() {
        let input: LineItemsInput = serde_json::from_str(
            r#"{"product": ["p1", "p2", "p3"], "quantity": ["1", "0", "3"], "unitPrice": ["10", "20"]}"#,
        )
        .unwrap();

        let lines = normalize_line_items(&input);
        assert_eq!(
            lines,
            vec![RawLine { product: "p1".into(), quantity: 1, unit_price: 10.0 }]
        );
    }

    #[test]
    fn test_normalize_scalar_columns() {
        let input: LineItemsInput =
            serde_json::from_str(r#"{"product": "p1", "quantity": "4", "unitPrice": "2.5"}"#).unwrap();

        let lines = normalize_line_items(&input);
        assert_eq!(
            lines,
            vec![RawLine { product: "p1".into(), quantity: 4, unit_price: 2.5 }]
        );
    }

    #[test]
    fn test_normalize_empty_list() {
        let input: LineItemsInput = serde_json::from_str("[]").unwrap();
        assert!(normalize_line_items(&input).is_empty());
    }
}
