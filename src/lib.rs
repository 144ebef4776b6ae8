//! Cluster visualization core: a TTL-cached fetch layer for clustered feature
//! requests, force and dendrogram layouts, and the adapters that turn them
//! into drawable primitives for the egui shell or a JSON export.

pub mod app;
pub mod cache;
pub mod config;
pub mod export;
pub mod insights;
pub mod layout;
pub mod util;
pub mod viz;
