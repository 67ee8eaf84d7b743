//! SQL Server connections from ADO.NET-style connection strings.

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::info;

use crate::error::{MigrateError, Result};

/// A connected tiberius client.
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Open a single connection described by an ADO.NET connection string.
pub async fn connect(connection_string: &str) -> Result<MssqlClient> {
    let config = Config::from_ado_string(connection_string)?;
    connect_with_config(config).await
}

async fn connect_with_config(config: Config) -> Result<MssqlClient> {
    let tcp = TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true).ok();
    Ok(Client::connect(config, tcp.compat_write()).await?)
}

/// Quote an MSSQL identifier with brackets.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Connection manager for bb8 pool with tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: Config,
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = MssqlClient;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.config.clone();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;

        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Small connection pool over one SQL Server database.
pub struct MssqlPool {
    pool: Pool<TiberiusConnectionManager>,
}

impl MssqlPool {
    /// Create a pool and verify it can reach the server.
    pub async fn new(connection_string: &str, max_conns: u32) -> Result<Self> {
        let config = Config::from_ado_string(connection_string)?;
        let addr = config.get_addr();
        let manager = TiberiusConnectionManager { config };
        let pool = Pool::builder()
            .max_size(max_conns)
            .build(manager)
            .await
            .map_err(|e| MigrateError::pool(e, "creating MSSQL pool"))?;

        // Test connection
        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| MigrateError::pool(e, "testing MSSQL connection"))?;
            conn.simple_query("SELECT 1").await?.into_row().await?;
        }

        info!("Connected to MSSQL: {}", addr);

        Ok(Self { pool })
    }

    /// Get a connection from the pool.
    pub async fn get_conn(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting MSSQL connection"))
    }
}
