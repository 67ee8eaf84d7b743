//! MSSQL database-backed run history.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tiberius::Row;

use crate::error::{MigrateError, Result};
use crate::history::backend::{run_status_to_str, str_to_run_status, HistoryStore};
use crate::history::MigrationRun;
use crate::mssql::MssqlPool;

const HISTORY_SCHEMA: &str = "bacpac_migrate";
const HISTORY_TABLE: &str = "migration_run";

/// Columns read back by [`MssqlHistoryStore::recent`], in order.
const SELECT_COLUMNS: &str = "run_id, source_server, source_database, destination_server, \
     destination_database, overall_start, overall_end, export_start, export_end, \
     import_start, import_end, artifact_size_mb, compression_type, status, error_text, \
     machine_name, user_name";

/// MSSQL run history store.
pub struct MssqlHistoryStore {
    pool: MssqlPool,
    schema: String,
}

impl MssqlHistoryStore {
    /// Connect to the history database.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let pool = MssqlPool::new(connection_string, 2).await?;
        Ok(Self {
            pool,
            schema: HISTORY_SCHEMA.to_string(),
        })
    }

    fn table(&self) -> String {
        table_name(&self.schema)
    }

    /// Get the backend type name.
    pub fn backend_type(&self) -> &'static str {
        "mssql"
    }
}

fn table_name(schema: &str) -> String {
    format!("[{}].[{}]", schema, HISTORY_TABLE)
}

/// DDL statements that create the schema, table and indexes when absent.
fn schema_statements(schema: &str) -> Vec<String> {
    let table = table_name(schema);
    vec![
        format!(
            "IF NOT EXISTS (SELECT * FROM sys.schemas WHERE name = '{schema}')
             BEGIN
                 EXEC('CREATE SCHEMA [{schema}]')
             END",
            schema = schema
        ),
        format!(
            "IF NOT EXISTS (SELECT * FROM sys.tables WHERE name = '{name}' AND schema_id = SCHEMA_ID('{schema}'))
             BEGIN
                 CREATE TABLE {table} (
                     run_id BIGINT IDENTITY(1,1) NOT NULL PRIMARY KEY,
                     source_server NVARCHAR(256) NOT NULL,
                     source_database NVARCHAR(128) NOT NULL,
                     destination_server NVARCHAR(256) NOT NULL,
                     destination_database NVARCHAR(128) NOT NULL,
                     overall_start DATETIME2 NOT NULL,
                     overall_end DATETIME2 NULL,
                     export_start DATETIME2 NULL,
                     export_end DATETIME2 NULL,
                     import_start DATETIME2 NULL,
                     import_end DATETIME2 NULL,
                     overall_duration_sec AS DATEDIFF(SECOND, overall_start, overall_end) PERSISTED,
                     export_duration_sec AS DATEDIFF(SECOND, export_start, export_end) PERSISTED,
                     import_duration_sec AS DATEDIFF(SECOND, import_start, import_end) PERSISTED,
                     status NVARCHAR(20) NOT NULL,
                     error_text NVARCHAR(MAX) NULL,
                     compression_type NVARCHAR(20) NULL,
                     artifact_size_mb DECIMAL(18,2) NULL,
                     machine_name NVARCHAR(128) NULL,
                     user_name NVARCHAR(128) NULL
                 )
             END",
            name = HISTORY_TABLE,
            schema = schema,
            table = table
        ),
        format!(
            "IF NOT EXISTS (SELECT * FROM sys.indexes WHERE name = 'IX_migration_run_overall_start' AND object_id = OBJECT_ID('{table}'))
             BEGIN
                 CREATE INDEX IX_migration_run_overall_start ON {table}(overall_start DESC)
             END",
            table = table
        ),
        format!(
            "IF NOT EXISTS (SELECT * FROM sys.indexes WHERE name = 'IX_migration_run_databases' AND object_id = OBJECT_ID('{table}'))
             BEGIN
                 CREATE INDEX IX_migration_run_databases ON {table}(source_database, destination_database)
             END",
            table = table
        ),
    ]
}

fn to_naive(ts: Option<DateTime<Utc>>) -> Option<NaiveDateTime> {
    ts.map(|t| t.naive_utc())
}

fn from_naive(ts: Option<NaiveDateTime>) -> Option<DateTime<Utc>> {
    ts.map(|t| Utc.from_utc_datetime(&t))
}

fn size_to_decimal(size_mb: Option<f64>) -> Option<Decimal> {
    size_mb
        .and_then(Decimal::from_f64)
        .map(|d| d.round_dp(2))
}

fn required_str(row: &Row, idx: usize, column: &str) -> Result<String> {
    row.get::<&str, _>(idx)
        .map(str::to_string)
        .ok_or_else(|| MigrateError::History(format!("Failed to get {} from database", column)))
}

fn optional_str(row: &Row, idx: usize) -> Option<String> {
    row.get::<&str, _>(idx).map(str::to_string)
}

fn row_to_run(row: &Row) -> Result<MigrationRun> {
    let id: i64 = row
        .get(0)
        .ok_or_else(|| MigrateError::History("Failed to get run_id from database".to_string()))?;
    let started_at: NaiveDateTime = row.get(5).ok_or_else(|| {
        MigrateError::History("Failed to get overall_start from database".to_string())
    })?;
    let size: Option<Decimal> = row.get(11);

    Ok(MigrationRun {
        id: Some(id),
        source_server: required_str(row, 1, "source_server")?,
        source_database: required_str(row, 2, "source_database")?,
        destination_server: required_str(row, 3, "destination_server")?,
        destination_database: required_str(row, 4, "destination_database")?,
        started_at: Utc.from_utc_datetime(&started_at),
        completed_at: from_naive(row.get(6)),
        export_started_at: from_naive(row.get(7)),
        export_completed_at: from_naive(row.get(8)),
        import_started_at: from_naive(row.get(9)),
        import_completed_at: from_naive(row.get(10)),
        artifact_size_mb: size.and_then(|d| d.to_f64()),
        compression: optional_str(row, 12).unwrap_or_default(),
        status: str_to_run_status(&required_str(row, 13, "status")?)?,
        error: optional_str(row, 14),
        machine_name: optional_str(row, 15).unwrap_or_default(),
        user_name: optional_str(row, 16).unwrap_or_default(),
    })
}

#[async_trait]
impl HistoryStore for MssqlHistoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        let mut conn = self.pool.get_conn().await?;
        for sql in schema_statements(&self.schema) {
            conn.execute(sql, &[]).await?;
        }
        Ok(())
    }

    async fn insert(&self, run: &MigrationRun) -> Result<i64> {
        let mut conn = self.pool.get_conn().await?;

        let sql = format!(
            "INSERT INTO {} (source_server, source_database, destination_server, destination_database,
                             overall_start, overall_end, export_start, export_end, import_start, import_end,
                             status, error_text, compression_type, artifact_size_mb, machine_name, user_name)
             OUTPUT INSERTED.run_id
             VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8, @P9, @P10, @P11, @P12, @P13, @P14, @P15, @P16)",
            self.table()
        );

        let row = conn
            .query(
                sql,
                &[
                    &run.source_server,
                    &run.source_database,
                    &run.destination_server,
                    &run.destination_database,
                    &run.started_at.naive_utc(),
                    &to_naive(run.completed_at),
                    &to_naive(run.export_started_at),
                    &to_naive(run.export_completed_at),
                    &to_naive(run.import_started_at),
                    &to_naive(run.import_completed_at),
                    &run_status_to_str(run.status),
                    &run.error,
                    &run.compression,
                    &size_to_decimal(run.artifact_size_mb),
                    &run.machine_name,
                    &run.user_name,
                ],
            )
            .await?
            .into_row()
            .await?;

        row.and_then(|r| r.get::<i64, _>(0))
            .ok_or_else(|| MigrateError::History("INSERT returned no run_id".to_string()))
    }

    async fn update(&self, id: i64, run: &MigrationRun) -> Result<()> {
        let mut conn = self.pool.get_conn().await?;

        let sql = format!(
            "UPDATE {}
             SET overall_end = @P2,
                 export_start = @P3,
                 export_end = @P4,
                 import_start = @P5,
                 import_end = @P6,
                 status = @P7,
                 error_text = @P8,
                 artifact_size_mb = @P9
             WHERE run_id = @P1",
            self.table()
        );

        let result = conn
            .execute(
                sql,
                &[
                    &id,
                    &to_naive(run.completed_at),
                    &to_naive(run.export_started_at),
                    &to_naive(run.export_completed_at),
                    &to_naive(run.import_started_at),
                    &to_naive(run.import_completed_at),
                    &run_status_to_str(run.status),
                    &run.error,
                    &size_to_decimal(run.artifact_size_mb),
                ],
            )
            .await?;

        if result.total() == 0 {
            return Err(MigrateError::History(format!(
                "run {} not found in {}",
                id,
                self.table()
            )));
        }
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<MigrationRun>> {
        let mut conn = self.pool.get_conn().await?;

        let sql = format!(
            "SELECT TOP (@P1) {} FROM {} ORDER BY overall_start DESC",
            SELECT_COLUMNS,
            self.table()
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = conn.query(sql, &[&limit]).await?.into_first_result().await?;

        rows.iter().map(row_to_run).collect()
    }

    fn backend_type(&self) -> &'static str {
        MssqlHistoryStore::backend_type(self)
    }
}
