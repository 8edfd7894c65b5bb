/// Poolside CMS - content management and sales ledger backend
///
/// Serves the public site data for a pool construction business (services,
/// portfolio, products, lead forms) and the admin back office behind it:
/// media library with image renditions, customers, sales with tax and
/// profit tracking, and the lead inbox.

mod admin;
mod api;
mod auth;
mod blob_store;
mod config;
mod content;
mod context;
mod db;
mod error;
mod forms;
mod imaging;
mod jobs;
mod leads;
mod mailer;
mod media;
mod rate_limit;
mod sales;
mod server;

use config::{LoggingConfig, ServerConfig};
use context::AppContext;
use error::CmsResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> CmsResult<()> {
    let config = ServerConfig::from_env()?;
    init_logging(&config.logging);

    print_banner();

    let ctx = Arc::new(AppContext::new(config).await?);

    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

/// `RUST_LOG` filters; `LOG_FORMAT=json` switches to structured output
fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_new(&logging.level)
        .unwrap_or_else(|_| "poolside_cms=debug,tower_http=debug".into());

    if logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn print_banner() {
    println!(
        r#"
    ____              __     _     __
   / __ \____  ____  / /____(_)___/ /__
  / /_/ / __ \/ __ \/ / ___/ / __  / _ \
 / ____/ /_/ / /_/ / (__  ) / /_/ /  __/
/_/    \____/\____/_/____/_/\__,_/\___/

        Pool construction CMS v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
