/// Lead intake
///
/// Public contact, product inquiry and quote request forms. Leads are
/// persisted first; the staff notification is sent afterwards and may fail
/// without affecting the submitter.
pub mod intake;
pub mod models;

pub use intake::{LeadIntake, LeadNotifier, LEADS_PER_PAGE};
pub use models::*;
