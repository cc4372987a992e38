//! # collection_sync
//!
//! Keeps a directory of Postman collections in step with the Gemini API
//! discovery document.
//!
//! A run has two steps:
//!
//! - **fetch**: retrieve the discovery document, flatten it into endpoints, tag
//!   them onto the declared models and write the API docs artifact. When the
//!   document cannot be retrieved the artifact still lists the declared models,
//!   without endpoints.
//! - **update**: reconcile every mapped collection against its model's
//!   endpoints, rewriting request descriptions, headers, JSON bodies and test
//!   scripts in place.
//!
//! The pure pipeline lives in [`sync_core`]; this crate adds configuration,
//! HTTP, the filesystem and the binary.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod store;
pub mod sync;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use fetch::{discover, fetch_discovery, Discovery, DiscoverySource};
pub use sync::{fetch_step, update_collections, update_step, SyncSummary};
pub use sync_core;
