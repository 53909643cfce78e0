//! # DuckDB Loader
//!
//! A local-only web UI for browsing the filesystem, loading CSV and Parquet
//! files into an embedded DuckDB database, and querying them with SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Path Browser │   │ Table Loader │   │    Query     │
//! │  (browse)    │   │  (loader)    │──▶│  (query)     │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        │                  └────────┬─────────┘
//!        │                           ▼
//!        │                    ┌─────────────┐
//!        │                    │  Database   │
//!        │                    │   (db)      │
//!        │                    └─────────────┘
//!        └──────────┬────────────────┘
//!                   ▼
//!            ┌─────────────┐
//!            │ HTTP server │
//!            │  (server)   │
//!            └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy shared by all components |
//! | [`models`] | Listings, tables, and query results |
//! | [`db`] | DuckDB handle and table catalog |
//! | [`browse`] | Directory listing |
//! | [`loader`] | CSV/Parquet ingestion |
//! | [`query`] | SQL execution |
//! | [`sample`] | Random sample CSV generation |
//! | [`views`] | HTML rendering |
//! | [`server`] | HTTP routes |

pub mod browse;
pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod models;
pub mod query;
pub mod sample;
pub mod server;
pub mod views;

pub use error::{LoaderError, Result};
