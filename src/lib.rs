//! # Scand - Scan Job Orchestration
//!
//! A small scan orchestration service with a durable result store. Scand
//! accepts scan jobs over HTTP or the CLI, enforces one active scan per
//! target, runs pluggable executors in the background with cooperative
//! cancellation, and persists every lifecycle transition to SQLite so
//! results survive restarts.
//!
//! ## Quick Start
//!
//! ```bash
//! # Install scand
//! cargo install scand
//!
//! # Run a one-shot scan
//! scand scan host-1
//!
//! # Or run the HTTP service
//! scand serve
//! curl -X POST localhost:8000/api/scans -d '{"target": "host-1"}'
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod server;
pub mod store;

pub use cli::Cli;
pub use config::ServiceConfig;
pub use error::{Result, ScanError};
pub use executor::{CancelToken, CommandExecutor, ExecutorSet, ScanExecutor, ScanOutcome};
pub use model::{Finding, ScanRecord, ScanState, Severity};
pub use orchestrator::{Orchestrator, RecoverySummary};
pub use registry::ScanRegistry;
pub use store::ScanStore;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
