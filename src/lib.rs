//! Table Probe Library
//!
//! Diagnostics for a hosted PostgREST-style table store: for each named table
//! it reports whether the table exists, how many rows it holds, which columns
//! it has and a few sample rows, without a "describe table" operation.
//!
//! # Modules
//!
//! - `config`: Configuration loaded once at startup.
//! - `errors`: Error classification shared by every layer.
//! - `models`: Table names, strategies, per-table results and reports.
//! - `obs`: Logging setup.
//! - `postgrest`: Wire-level error decoding and column harvesting.
//! - `prober`: Per-table multi-strategy probe.
//! - `reporter`: Batch driver and report rendering.
//! - `session`: Authenticated session and the `TableStore` boundary.

pub mod config;
pub mod errors;
pub mod models;
pub mod obs;
pub mod postgrest;
pub mod prober;
pub mod reporter;
pub mod session;
