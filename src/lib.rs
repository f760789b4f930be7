//! `cwa-weather` - Taiwan weather query orchestration over CWA open data
//!
//! This library maps logical weather queries (forecast, warnings,
//! rainfall, observation) to the Central Weather Administration's
//! open-data datastore endpoints, resolves place names across their
//! interchangeable glyph variants, and normalizes the structurally
//! different response shapes into one uniform record contract.

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod locations;
pub mod normalize;
pub mod orchestrator;

// Re-export core types for public API
pub use catalog::{EndpointSpec, ForecastHorizon, QueryType, ResponseShape};
pub use client::{CwaClient, UpstreamResponse};
pub use config::CwaConfig;
pub use error::Error;
pub use locations::{LocationKind, LocationResolver, Resolution, ResolvedLocation};
pub use normalize::NormalizedRecord;
pub use orchestrator::{QueryRequest, QueryResult, TimeWindow, WeatherService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;
