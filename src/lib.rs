//! Match-day gallery core
//!
//! Media store, lightbox, selection, upload ingestion and deletion, kept
//! free of any UI toolkit so the iced shell in `main.rs` stays thin.

pub mod config;
pub mod delete;
pub mod download;
pub mod error;
pub mod ingest;
pub mod repo;
pub mod state;
