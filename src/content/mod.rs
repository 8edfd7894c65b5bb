/// Marketing content and business records
///
/// Products, customers, portfolio projects, services, site settings and
/// page view analytics. Each store owns its table; slugs are assigned by
/// [`slug::unique_slug`] before rows are written.
pub mod analytics;
pub mod customers;
pub mod products;
pub mod projects;
pub mod services;
pub mod settings;
pub mod slug;

pub use analytics::{PageViews, PathViews};
pub use customers::{Customer, CustomerInput, CustomerPage, CustomerQuery, CustomerStore};
pub use products::{Product, ProductInput, ProductStore};
pub use projects::{Project, ProjectInput, ProjectPage, ProjectQuery, ProjectStore, PORTFOLIO_PER_PAGE, PROJECTS_PER_PAGE};
pub use services::{Service, ServiceInput, ServiceStore};
pub use settings::{SettingsInput, SettingsStore, SiteSettings};
