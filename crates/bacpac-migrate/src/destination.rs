//! Destination database existence probe and drop.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::PlatformKind;
use crate::connection::{connection_string, MASTER_DATABASE};
use crate::error::Result;
use crate::mssql::{self, quote_ident};

/// Administrative operations on the destination server.
#[async_trait]
pub trait DestinationAdmin: Send + Sync {
    /// Whether `database` exists on `server`.
    async fn database_exists(&self, kind: PlatformKind, server: &str, database: &str)
        -> Result<bool>;

    /// Drop `database` on `server`, disconnecting other sessions first where supported.
    async fn drop_database(&self, kind: PlatformKind, server: &str, database: &str) -> Result<()>;
}

/// Runs the probe and drop over a direct connection to the server's `master` database.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDestinationAdmin;

#[async_trait]
impl DestinationAdmin for MssqlDestinationAdmin {
    async fn database_exists(
        &self,
        kind: PlatformKind,
        server: &str,
        database: &str,
    ) -> Result<bool> {
        let mut client = mssql::connect(&connection_string(kind, server, MASTER_DATABASE)).await?;
        let row = client
            .query("SELECT COUNT(*) FROM sys.databases WHERE name = @P1", &[&database])
            .await?
            .into_row()
            .await?;
        let count: i32 = row.and_then(|r| r.get(0)).unwrap_or(0);
        debug!("Destination {} exists: {}", database, count > 0);
        Ok(count > 0)
    }

    async fn drop_database(&self, kind: PlatformKind, server: &str, database: &str) -> Result<()> {
        let mut client = mssql::connect(&connection_string(kind, server, MASTER_DATABASE)).await?;
        for statement in drop_statements(kind, database) {
            debug!("Executing: {}", statement);
            client.simple_query(statement).await?.into_results().await?;
        }
        info!("Dropped destination database {}", database);
        Ok(())
    }
}

/// Statements that drop a database.
///
/// Cloud databases do not support single-user mode, so only the drop is issued.
pub fn drop_statements(kind: PlatformKind, database: &str) -> Vec<String> {
    let name = quote_ident(database);
    match kind {
        PlatformKind::OnPrem => vec![
            format!("ALTER DATABASE {} SET SINGLE_USER WITH ROLLBACK IMMEDIATE", name),
            format!("DROP DATABASE {}", name),
        ],
        PlatformKind::Cloud => vec![format!("DROP DATABASE {}", name)],
    }
}
