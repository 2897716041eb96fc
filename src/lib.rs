//! Vehicle bulb fitment lookup
//!
//! Walks a user through year, brand, model, modification and lamp position,
//! then decides which replacement bulb to show for the chosen configuration.
//!
//! # Architecture
//!
//! - **Selection**: ordered filter tuple and the cascade controller that owns it
//! - **Fetch**: per-session request cache with per-category cancellation
//! - **Decision**: halogen/xenon classification and presentation mode
//! - **Server**: Axum HTTP surface over per-session actors
//!
//! # Modules
//!
//! - [`catalog`]: catalog gateway trait and its Postgres, HTTP and memory backends
//! - [`selection`]: filter tuple and cascade controller
//! - [`fetch`]: cache and cancellation layer
//! - [`decision`]: classifier, decision engine and part links
//! - [`session`]: session actors and store
//! - [`api`]: HTTP handlers

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod api;
pub mod catalog;
pub mod config;
pub mod decision;
pub mod error;
pub mod fetch;
pub mod selection;
pub mod server;
pub mod session;

use std::sync::Arc;

use catalog::CatalogGateway;
use session::SessionStore;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Catalog used by the stateless options endpoint and every session.
    pub gateway: Arc<dyn CatalogGateway>,
    /// Live fitment sessions.
    pub sessions: SessionStore,
}
