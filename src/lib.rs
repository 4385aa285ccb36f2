//! Horizon-routed quantile demand forecasting services
//!
//! Three cooperating roles share this crate:
//!
//! - **feature cache**: serves precomputed per-(client, item) features
//! - **prediction**: runs a pooled quantile ensemble for one forecast horizon
//! - **routing**: forwards requests to the prediction instance tagged with the
//!   requested horizon
//!
//! Roles find each other through a service directory (Consul in production).

pub mod app;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod forecast;
pub mod handlers;
pub mod models;
pub mod pool;
pub mod routing;
pub mod server;
pub mod store;

pub use error::{AppError, AppResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `default_filter`; `LOG_FORMAT=json` switches to
/// one JSON object per line.
pub fn init_tracing(default_filter: &str) {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| default_filter.into()))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}
