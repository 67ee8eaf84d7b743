//! # bacpac-migrate
//!
//! SQL Server database migration through a BACPAC file.
//!
//! This library moves a database between SQL Server endpoints (cloud or
//! on-premises) by exporting it with SqlPackage and importing the resulting
//! BACPAC at the destination, with support for:
//!
//! - **Tool discovery** picking the newest installed SqlPackage
//! - **Artifact reuse** so a failed import can be retried without re-exporting
//! - **Clobber modes** to replace a stale BACPAC or an existing destination
//! - **Run history** recorded per phase into a SQL Server table
//!
//! ## Example
//!
//! ```rust,no_run
//! use bacpac_migrate::{Config, Orchestrator, RunLogger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("migration.yaml")?;
//!     let logger = RunLogger::connect(config.logging.as_ref()).await;
//!     let orchestrator = Orchestrator::new(config)?.with_logger(logger);
//!     let result = orchestrator.run().await?;
//!     println!("Migration {} in {:?}s", result.status, result.duration_seconds);
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod clobber;
pub mod config;
pub mod connection;
pub mod destination;
pub mod error;
pub mod history;
pub mod mssql;
pub mod orchestrator;
pub mod tool;

// Re-exports for convenient access
pub use clobber::ClobberDecision;
pub use config::{ClobberMode, CompressionMode, Config, PlatformKind};
pub use error::{MigrateError, Result};
pub use history::{HistoryStore, MigrationRun, MssqlHistoryStore, RunLogger, RunStatus};
pub use orchestrator::{MigrationResult, Orchestrator, Phase};
pub use tool::{ToolInstallation, ToolLocator, ToolVersion};
