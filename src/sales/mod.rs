/// Sale ledger
///
/// Records product sales against customers and derives tax, cost and
/// profit from the products' current taxability and cost.
pub mod calculator;
pub mod ledger;
pub mod models;

pub use ledger::{SaleLedger, SALES_PER_PAGE};
pub use models::*;
