/// Admin area: accounts and the dashboard overview
pub mod dashboard;
pub mod users;

pub use dashboard::{ContentCounts, Dashboard};
pub use users::{AdminUser, AdminUsers};
