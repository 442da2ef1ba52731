//! # Geocode Memo
//!
//! Batch geocoding of free-text location strings against Nominatim, with a
//! persistent memo that keeps repeated and previously failed lookups off the
//! network.
//!
//! ## Features
//!
//! - **Memo**: JSON store of name aliases, location records and per-user-agent
//!   unknown names, with two generations of backups
//! - **Fallbacks**: quick and full spelling correction, each lowering the
//!   confidence of the result
//! - **User-agent rotation**: one pass over the input per configured agent,
//!   later passes only paying for rows still unresolved
//! - **Rate limiting**: a minimum delay between calls of the same agent
//!
//! ## Architecture
//!
//! ```text
//! CSV rows → Locator (per user agent) → Resolver → Memo (JSON file)
//!                                            ↓
//!                                      Nominatim (HTTP)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use geocode_memo::{Config, Locator, Memo, NominatimClient, Resolver, ResolverSettings};
//! use geocode_memo::correction::NoCorrection;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let memo = Memo::load(&config.memo.path)?;
//!     let geocoder = NominatimClient::new(&config.geocoder, config.request.clone())?;
//!     let resolver = Resolver::new(geocoder, NoCorrection, memo, ResolverSettings::default(), "my-app");
//!     let mut locator = Locator::new(resolver, config.geocoder.user_agents.clone());
//!     let outcome = locator.run(&["new york".to_string()]).await?;
//!     println!("{:?}", outcome.rows);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Batch driver rotating user agents over the input rows.
pub mod batch;
/// Configuration management.
pub mod config;
/// Spelling-correction fallbacks.
pub mod correction;
/// Error types and result aliases for the application.
pub mod error;
/// Geocoding provider trait and Nominatim client.
pub mod geocoder;
/// Persistent memo of resolved and unresolvable names.
pub mod memo;
/// The locate pipeline.
pub mod resolver;
/// CSV input and output.
pub mod table;

pub use batch::{BatchOutcome, Locator, PassReport};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use geocoder::{Geocoder, NominatimClient};
pub use memo::Memo;
pub use resolver::{ResolvedRow, Resolver, ResolverSettings};
