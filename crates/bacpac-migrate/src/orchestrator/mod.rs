//! Migration orchestrator - export, verify, prepare destination, import.

mod phase;

pub use phase::Phase;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::artifact::{artifact_exists, artifact_size_mb, resolve_artifact_path};
use crate::clobber::{drop_destination_first, ClobberDecision};
use crate::config::Config;
use crate::connection::connection_string;
use crate::destination::{DestinationAdmin, MssqlDestinationAdmin};
use crate::error::{MigrateError, Result};
use crate::history::{MigrationRun, RunHandle, RunLogger, RunStatus};
use crate::tool::command::{export_args, import_args};
use crate::tool::{Diagnostics, ProcessRunner, ToolInstallation, ToolLocator, ToolRunner};

/// Migration orchestrator.
///
/// Drives one run through its phases strictly in sequence. Every status
/// change is mirrored to the run logger; only the SqlPackage steps, the
/// artifact checks and tool discovery can fail a run.
pub struct Orchestrator {
    config: Config,
    locator: ToolLocator,
    runner: Arc<dyn ToolRunner>,
    destination: Arc<dyn DestinationAdmin>,
    logger: RunLogger,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Correlation identifier used in log lines.
    pub run_id: String,

    /// Identity of the run in the history store, when one is recording.
    pub history_id: Option<i64>,

    /// Final status.
    pub status: RunStatus,

    /// Source and destination as `server/database`.
    pub source: String,
    pub destination: String,

    /// When the migration started and completed.
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Phase durations in seconds.
    pub duration_seconds: Option<i64>,
    pub export_duration_seconds: Option<i64>,
    pub import_duration_seconds: Option<i64>,

    /// SqlPackage installation used.
    pub tool: ToolInstallation,

    /// BACPAC location and size.
    pub artifact: PathBuf,
    pub artifact_size_mb: Option<f64>,

    /// Whether an export ran (false when an existing BACPAC was reused).
    pub exported: bool,

    /// Whether an existing destination database was dropped before import.
    pub destination_dropped: bool,

    /// Whether the BACPAC was deleted after the import.
    pub artifact_removed: bool,

    /// States the run passed through, in order.
    pub phases: Vec<Phase>,
}

/// What the phases produced, gathered for the result.
struct Outcome {
    tool: ToolInstallation,
    artifact: PathBuf,
    exported: bool,
    destination_dropped: bool,
    artifact_removed: bool,
}

/// Mutable state of one run.
struct RunContext {
    run: MigrationRun,
    handle: RunHandle,
    phase: Phase,
    phases: Vec<Phase>,
    artifact: Option<PathBuf>,
}

impl RunContext {
    fn new(run: MigrationRun, handle: RunHandle) -> Self {
        Self {
            run,
            handle,
            phase: Phase::Init,
            phases: vec![Phase::Init],
            artifact: None,
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!("Phase: {}", phase);
        self.phase = phase;
        self.phases.push(phase);
    }
}

impl Orchestrator {
    /// Create an orchestrator that runs SqlPackage as a subprocess and
    /// probes the destination over a direct connection.
    ///
    /// History is not recorded until a logger is attached with
    /// [`with_logger`](Self::with_logger).
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let locator = ToolLocator::from_config(&config.tool);

        Ok(Self {
            config,
            locator,
            runner: Arc::new(ProcessRunner),
            destination: Arc::new(MssqlDestinationAdmin),
            logger: RunLogger::disabled(),
        })
    }

    /// Record run history through `logger`.
    pub fn with_logger(mut self, logger: RunLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Replace the SqlPackage runner.
    pub fn with_runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replace the destination probe.
    pub fn with_destination_admin(mut self, destination: Arc<dyn DestinationAdmin>) -> Self {
        self.destination = destination;
        self
    }

    /// Replace the tool locator.
    pub fn with_locator(mut self, locator: ToolLocator) -> Self {
        self.locator = locator;
        self
    }

    /// The configuration this orchestrator runs.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the migration.
    ///
    /// On failure the run is recorded as `Failed`, the BACPAC is left in
    /// place and the error is wrapped in [`MigrateError::RunFailed`].
    pub async fn run(&self) -> Result<MigrationResult> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let hash = self.config.hash();

        info!(
            "Starting migration run {}: {}/{} -> {}/{} (config {})",
            run_id,
            self.config.source.server,
            self.config.source.database,
            self.config.destination.server,
            self.config.destination.database,
            &hash[..12]
        );

        self.logger.ensure_schema().await;
        let run = MigrationRun::new(&self.config);
        let handle = self.logger.begin(&run).await;
        let mut ctx = RunContext::new(run, handle);

        match self.execute(&mut ctx).await {
            Ok(outcome) => {
                let result = self.result(run_id, ctx, outcome);
                info!(
                    "Migration {}: {} -> {} in {}s (export {}s, import {}s)",
                    result.status,
                    result.source,
                    result.destination,
                    result.duration_seconds.unwrap_or(0),
                    result.export_duration_seconds.unwrap_or(0),
                    result.import_duration_seconds.unwrap_or(0)
                );
                Ok(result)
            }
            Err(e) => Err(self.abort(&mut ctx, e).await),
        }
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<Outcome> {
        ctx.enter(Phase::ToolResolved);
        let tool = self.locator.locate()?;

        ctx.enter(Phase::PathResolved);
        let artifact = resolve_artifact_path(
            &self.config.artifact.directory,
            &self.config.destination.database,
        )?;
        ctx.artifact = Some(artifact.clone());

        let decision =
            ClobberDecision::for_artifact(self.config.artifact.clobber, artifact_exists(&artifact));

        let exported = if decision.needs_export {
            ctx.enter(Phase::Exporting);
            if decision.delete_artifact {
                info!("Deleting existing BACPAC {}", artifact.display());
                tokio::fs::remove_file(&artifact).await?;
            }
            self.export(ctx, &tool, &artifact).await?;
            true
        } else {
            ctx.enter(Phase::ExportSkipped);
            info!(
                "Reusing existing BACPAC {} (clobber mode {})",
                artifact.display(),
                self.config.artifact.clobber
            );
            false
        };

        ctx.enter(Phase::ArtifactVerified);
        if !artifact_exists(&artifact) {
            return Err(MigrateError::ArtifactMissing(artifact));
        }
        if ctx.run.artifact_size_mb.is_none() {
            ctx.run.artifact_size_mb = artifact_size_mb(&artifact);
        }

        let destination_dropped = if self.config.artifact.clobber.clobbers_destination() {
            ctx.enter(Phase::DestinationChecked);
            self.prepare_destination().await
        } else {
            false
        };

        ctx.enter(Phase::Importing);
        self.import(ctx, &tool, &artifact).await?;

        ctx.enter(Phase::Completed);
        self.transition(ctx, RunStatus::Completed).await;

        let artifact_removed = match tokio::fs::remove_file(&artifact).await {
            Ok(()) => {
                info!("Deleted BACPAC {}", artifact.display());
                true
            }
            Err(e) => {
                warn!("Could not delete BACPAC {}: {}", artifact.display(), e);
                false
            }
        };

        Ok(Outcome {
            tool,
            artifact,
            exported,
            destination_dropped,
            artifact_removed,
        })
    }

    async fn export(
        &self,
        ctx: &mut RunContext,
        tool: &ToolInstallation,
        artifact: &Path,
    ) -> Result<()> {
        self.transition(ctx, RunStatus::Exporting).await;

        let source = &self.config.source;
        let cs = connection_string(source.kind, &source.server, &source.database);
        debug!("Source connection string: {}", cs);

        let args = export_args(
            &cs,
            artifact,
            self.config.artifact.compression,
            self.config.artifact.temp_directory.as_deref(),
            &self.diagnostics(),
        );

        info!(
            "Exporting {}/{} to {}",
            source.server,
            source.database,
            artifact.display()
        );
        let code = self.runner.run(&tool.path, &args).await?;
        if code != 0 {
            return Err(MigrateError::ExportFailed { code });
        }

        ctx.run.artifact_size_mb = artifact_size_mb(artifact);
        self.transition(ctx, RunStatus::Exported).await;
        info!(
            "Export complete: {:.2} MB",
            ctx.run.artifact_size_mb.unwrap_or(0.0)
        );
        Ok(())
    }

    async fn import(
        &self,
        ctx: &mut RunContext,
        tool: &ToolInstallation,
        artifact: &Path,
    ) -> Result<()> {
        self.transition(ctx, RunStatus::Importing).await;

        let destination = &self.config.destination;
        let cs = connection_string(destination.kind, &destination.server, &destination.database);
        debug!("Destination connection string: {}", cs);

        let args = import_args(
            &cs,
            artifact,
            destination.kind,
            &destination.service_tier,
            &self.diagnostics(),
        );

        info!(
            "Importing {} into {}/{}",
            artifact.display(),
            destination.server,
            destination.database
        );
        let code = self.runner.run(&tool.path, &args).await?;
        if code != 0 {
            return Err(MigrateError::ImportFailed { code });
        }

        self.transition(ctx, RunStatus::Imported).await;
        info!("Import complete");
        Ok(())
    }

    /// Drop the destination if it exists. Probe and drop failures only warn.
    async fn prepare_destination(&self) -> bool {
        let destination = &self.config.destination;

        let exists = match self
            .destination
            .database_exists(destination.kind, &destination.server, &destination.database)
            .await
        {
            Ok(exists) => exists,
            Err(e) => {
                warn!(
                    "Could not check whether {} exists on {}, continuing: {}",
                    destination.database, destination.server, e
                );
                return false;
            }
        };

        if !drop_destination_first(self.config.artifact.clobber, exists) {
            info!("Destination {} does not exist", destination.database);
            return false;
        }

        info!(
            "Dropping existing destination {} on {}",
            destination.database, destination.server
        );
        match self
            .destination
            .drop_database(destination.kind, &destination.server, &destination.database)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Could not drop {} on {}, continuing: {}",
                    destination.database, destination.server, e
                );
                false
            }
        }
    }

    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            enabled: self.config.tool.diagnostics,
            file: self.config.tool.diagnostics_file.clone(),
        }
    }

    /// Advance the run status and mirror it to the history store.
    async fn transition(&self, ctx: &mut RunContext, status: RunStatus) {
        if ctx.run.advance(status) {
            info!("Run status: {}", status);
            self.logger.record(&mut ctx.handle, &ctx.run).await;
        }
    }

    /// Record the failure and wrap the error with its phase and retained artifact.
    async fn abort(&self, ctx: &mut RunContext, source: MigrateError) -> MigrateError {
        let phase = ctx.phase;
        error!("Migration failed during {}: {}", phase, source);

        if ctx.run.fail(source.to_string()) {
            self.logger.record(&mut ctx.handle, &ctx.run).await;
        }
        ctx.enter(Phase::Failed);

        let artifact = ctx.artifact.take().filter(|p| artifact_exists(p));
        if let Some(path) = &artifact {
            info!("BACPAC retained at {} for retry", path.display());
        }

        MigrateError::RunFailed {
            phase,
            source: Box::new(source),
            artifact,
        }
    }

    fn result(&self, run_id: String, ctx: RunContext, outcome: Outcome) -> MigrationResult {
        let run = ctx.run;
        MigrationResult {
            run_id,
            history_id: ctx.handle.id(),
            status: run.status,
            source: format!("{}/{}", run.source_server, run.source_database),
            destination: format!("{}/{}", run.destination_server, run.destination_database),
            started_at: run.started_at,
            completed_at: run.completed_at,
            duration_seconds: run.duration_secs(),
            export_duration_seconds: run.export_duration_secs(),
            import_duration_seconds: run.import_duration_secs(),
            tool: outcome.tool,
            artifact: outcome.artifact,
            artifact_size_mb: run.artifact_size_mb,
            exported: outcome.exported,
            destination_dropped: outcome.destination_dropped,
            artifact_removed: outcome.artifact_removed,
            phases: ctx.phases,
        }
    }
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ArtifactConfig, ClobberMode, DestinationConfig, EndpointConfig, PlatformKind, ToolConfig,
    };
    use crate::history::memory::MemoryHistoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    type Events = Arc<Mutex<Vec<String>>>;

    /// Records invocations; optionally writes the BACPAC like SqlPackage would.
    struct FakeRunner {
        events: Events,
        calls: Mutex<Vec<Vec<String>>>,
        export_code: i32,
        import_code: i32,
        writes_artifact: bool,
    }

    impl FakeRunner {
        fn new(events: &Events) -> Self {
            Self {
                events: events.clone(),
                calls: Mutex::new(Vec::new()),
                export_code: 0,
                import_code: 0,
                writes_artifact: true,
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolRunner for FakeRunner {
        async fn run(&self, _program: &Path, args: &[String]) -> Result<i32> {
            self.calls.lock().unwrap().push(args.to_vec());
            match args[0].as_str() {
                "/Action:Export" => {
                    let target = args
                        .iter()
                        .find_map(|a| a.strip_prefix("/TargetFile:"))
                        .unwrap();
                    let mut events = self.events.lock().unwrap();
                    if Path::new(target).exists() {
                        events.push("stale artifact".to_string());
                    }
                    events.push("export".to_string());
                    if self.writes_artifact {
                        std::fs::write(target, vec![0u8; 64 * 1024]).unwrap();
                    }
                    Ok(self.export_code)
                }
                "/Action:Import" => {
                    self.events.lock().unwrap().push("import".to_string());
                    Ok(self.import_code)
                }
                other => panic!("unexpected action {other}"),
            }
        }
    }

    /// Destination that exists, is absent, or cannot be probed (`None`).
    struct FakeDestination {
        events: Events,
        exists: Option<bool>,
        drop_fails: bool,
    }

    impl FakeDestination {
        fn new(events: &Events, exists: Option<bool>) -> Self {
            Self {
                events: events.clone(),
                exists,
                drop_fails: false,
            }
        }
    }

    #[async_trait]
    impl DestinationAdmin for FakeDestination {
        async fn database_exists(
            &self,
            _kind: PlatformKind,
            _server: &str,
            database: &str,
        ) -> Result<bool> {
            self.events
                .lock()
                .unwrap()
                .push(format!("exists {}", database));
            self.exists
                .ok_or_else(|| MigrateError::pool("connection refused", "probing destination"))
        }

        async fn drop_database(
            &self,
            _kind: PlatformKind,
            _server: &str,
            database: &str,
        ) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("drop {}", database));
            if self.drop_fails {
                return Err(MigrateError::pool("permission denied", "dropping destination"));
            }
            Ok(())
        }
    }

    struct Harness {
        tmp: TempDir,
        config: Config,
        events: Events,
        store: Arc<MemoryHistoryStore>,
    }

    impl Harness {
        fn new(clobber: ClobberMode) -> Self {
            let tmp = TempDir::new().unwrap();
            let tool_dir = tmp.path().join("tools").join("16.0.0.0");
            std::fs::create_dir_all(&tool_dir).unwrap();
            std::fs::write(tool_dir.join("sqlpackage"), b"").unwrap();

            let config = Config {
                source: EndpointConfig {
                    server: "S1".into(),
                    database: "DB1".into(),
                    kind: PlatformKind::OnPrem,
                },
                destination: DestinationConfig {
                    server: "S2".into(),
                    database: "DB2".into(),
                    kind: PlatformKind::Cloud,
                    service_tier: "GP_Gen5_2".into(),
                },
                artifact: ArtifactConfig {
                    directory: tmp.path().join("out"),
                    clobber,
                    ..ArtifactConfig::default()
                },
                tool: ToolConfig::default(),
                logging: None,
            };

            Self {
                tmp,
                config,
                events: Arc::new(Mutex::new(Vec::new())),
                store: Arc::new(MemoryHistoryStore::new()),
            }
        }

        fn artifact(&self) -> PathBuf {
            self.config.artifact.directory.join("DB2.bacpac")
        }

        fn write_artifact(&self) {
            std::fs::create_dir_all(&self.config.artifact.directory).unwrap();
            std::fs::write(self.artifact(), b"existing").unwrap();
        }

        fn locator(&self) -> ToolLocator {
            let pattern = self.tmp.path().join("tools").join("*").join("sqlpackage");
            ToolLocator::new(vec![pattern.to_string_lossy().into_owned()])
        }

        fn orchestrator(
            &self,
            runner: Arc<FakeRunner>,
            destination: FakeDestination,
        ) -> Orchestrator {
            Orchestrator::new(self.config.clone())
                .unwrap()
                .with_locator(self.locator())
                .with_runner(runner)
                .with_destination_admin(Arc::new(destination))
                .with_logger(RunLogger::new(self.store.clone()))
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    fn has_arg(call: &[String], arg: &str) -> bool {
        call.iter().any(|a| a == arg)
    }

    #[tokio::test]
    async fn test_end_to_end_onprem_to_cloud() {
        let h = Harness::new(ClobberMode::None);
        let runner = Arc::new(FakeRunner::new(&h.events));
        let orchestrator = h.orchestrator(runner.clone(), FakeDestination::new(&h.events, Some(false)));

        let result = orchestrator.run().await.unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert!(result.exported);
        assert!(!result.destination_dropped);
        assert!(result.artifact_removed);
        assert!(!h.artifact().exists());
        assert_eq!(result.artifact, h.artifact());
        assert_eq!(result.tool.version.to_string(), "16.0.0.0");
        assert_eq!(result.history_id, Some(1));
        assert_eq!(h.events(), vec!["export", "import"]);
        assert_eq!(
            result.phases,
            vec![
                Phase::Init,
                Phase::ToolResolved,
                Phase::PathResolved,
                Phase::Exporting,
                Phase::ArtifactVerified,
                Phase::Importing,
                Phase::Completed,
            ]
        );

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(has_arg(
            &calls[0],
            "/SourceConnectionString:Server=S1;Initial Catalog=DB1;Integrated Security=True;TrustServerCertificate=True;"
        ));
        assert!(has_arg(&calls[0], "/p:CompressionOption=Fast"));
        assert!(has_arg(
            &calls[1],
            "/TargetConnectionString:Server=tcp:S2,1433;Initial Catalog=DB2;Authentication=Active Directory Interactive;Encrypt=True;TrustServerCertificate=False;"
        ));
        assert!(has_arg(&calls[1], "/p:DatabaseServiceObjective=GP_Gen5_2"));

        assert_eq!(
            h.store.written_statuses(),
            vec![
                RunStatus::Started,
                RunStatus::Exporting,
                RunStatus::Exported,
                RunStatus::Importing,
                RunStatus::Imported,
                RunStatus::Completed,
            ]
        );
        let rows = h.store.rows();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.status, RunStatus::Completed);
        assert!(row.export_started_at.is_some());
        assert!(row.export_completed_at.is_some());
        assert!(row.import_started_at.is_some());
        assert!(row.import_completed_at.is_some());
        assert!(row.completed_at.is_some());
        assert!(row.artifact_size_mb.unwrap() > 0.0);
        assert!(row.error.is_none());
    }

    #[tokio::test]
    async fn test_existing_artifact_skips_export() {
        let h = Harness::new(ClobberMode::None);
        h.write_artifact();
        let orchestrator = h.orchestrator(
            Arc::new(FakeRunner::new(&h.events)),
            FakeDestination::new(&h.events, Some(false)),
        );

        let result = orchestrator.run().await.unwrap();

        assert!(!result.exported);
        assert_eq!(h.events(), vec!["import"]);
        assert!(result.phases.contains(&Phase::ExportSkipped));
        assert!(!result.phases.contains(&Phase::Exporting));
        assert_eq!(
            h.store.written_statuses(),
            vec![
                RunStatus::Started,
                RunStatus::Importing,
                RunStatus::Imported,
                RunStatus::Completed,
            ]
        );
        assert!(h.store.rows()[0].export_started_at.is_none());
    }

    #[tokio::test]
    async fn test_export_failure_retains_artifact_and_rerun_reuses_it() {
        let h = Harness::new(ClobberMode::None);
        let mut failing = FakeRunner::new(&h.events);
        failing.export_code = 1;
        let orchestrator =
            h.orchestrator(Arc::new(failing), FakeDestination::new(&h.events, Some(false)));

        let err = orchestrator.run().await.unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Exporting));
        assert!(matches!(err.root(), MigrateError::ExportFailed { code: 1 }));
        assert_eq!(err.exit_code(), 4);
        assert!(h.artifact().exists());
        match &err {
            MigrateError::RunFailed { artifact, .. } => {
                let expected = h.artifact();
                assert_eq!(artifact.as_deref(), Some(expected.as_path()));
            }
            other => panic!("expected RunFailed, got {other:?}"),
        }
        assert_eq!(h.events(), vec!["export"]);

        let failed = &h.store.rows()[0];
        assert_eq!(failed.status, RunStatus::Failed);
        assert!(failed.error.as_deref().unwrap().contains("code 1"));
        assert!(failed.completed_at.is_some());

        h.events.lock().unwrap().clear();
        let rerun = h.orchestrator(
            Arc::new(FakeRunner::new(&h.events)),
            FakeDestination::new(&h.events, Some(false)),
        );
        let result = rerun.run().await.unwrap();
        assert!(!result.exported);
        assert_eq!(h.events(), vec!["import"]);
        assert_eq!(h.store.rows().len(), 2);
    }

    #[tokio::test]
    async fn test_both_mode_deletes_artifact_and_drops_destination() {
        let h = Harness::new(ClobberMode::Both);
        h.write_artifact();
        let orchestrator = h.orchestrator(
            Arc::new(FakeRunner::new(&h.events)),
            FakeDestination::new(&h.events, Some(true)),
        );

        let result = orchestrator.run().await.unwrap();

        assert!(result.exported);
        assert!(result.destination_dropped);
        assert_eq!(h.events(), vec!["export", "exists DB2", "drop DB2", "import"]);
        assert!(result.phases.contains(&Phase::DestinationChecked));
    }

    #[tokio::test]
    async fn test_source_mode_reexports_without_touching_destination() {
        let h = Harness::new(ClobberMode::Source);
        h.write_artifact();
        let orchestrator = h.orchestrator(
            Arc::new(FakeRunner::new(&h.events)),
            FakeDestination::new(&h.events, Some(true)),
        );

        let result = orchestrator.run().await.unwrap();

        assert!(result.exported);
        assert!(!result.destination_dropped);
        assert_eq!(h.events(), vec!["export", "import"]);
    }

    #[tokio::test]
    async fn test_destination_mode_skips_drop_when_absent() {
        let h = Harness::new(ClobberMode::Destination);
        let orchestrator = h.orchestrator(
            Arc::new(FakeRunner::new(&h.events)),
            FakeDestination::new(&h.events, Some(false)),
        );

        let result = orchestrator.run().await.unwrap();

        assert!(!result.destination_dropped);
        assert_eq!(h.events(), vec!["export", "exists DB2", "import"]);
    }

    #[tokio::test]
    async fn test_probe_failure_is_not_fatal() {
        let h = Harness::new(ClobberMode::Destination);
        let orchestrator = h.orchestrator(
            Arc::new(FakeRunner::new(&h.events)),
            FakeDestination::new(&h.events, None),
        );

        let result = orchestrator.run().await.unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert!(!result.destination_dropped);
        assert_eq!(h.events(), vec!["export", "exists DB2", "import"]);
    }

    #[tokio::test]
    async fn test_drop_failure_is_not_fatal() {
        let h = Harness::new(ClobberMode::Destination);
        let mut destination = FakeDestination::new(&h.events, Some(true));
        destination.drop_fails = true;
        let orchestrator = h.orchestrator(Arc::new(FakeRunner::new(&h.events)), destination);

        let result = orchestrator.run().await.unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert!(!result.destination_dropped);
        assert_eq!(h.events(), vec!["export", "exists DB2", "drop DB2", "import"]);
    }

    #[tokio::test]
    async fn test_import_failure_reports_exit_code() {
        let h = Harness::new(ClobberMode::None);
        let mut runner = FakeRunner::new(&h.events);
        runner.import_code = 5;
        let orchestrator =
            h.orchestrator(Arc::new(runner), FakeDestination::new(&h.events, Some(false)));

        let err = orchestrator.run().await.unwrap_err();

        assert_eq!(err.phase(), Some(Phase::Importing));
        assert!(matches!(err.root(), MigrateError::ImportFailed { code: 5 }));
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains("5"));
        assert!(h.artifact().exists());

        let row = &h.store.rows()[0];
        assert_eq!(row.status, RunStatus::Failed);
        assert!(row.import_started_at.is_some());
        assert!(row.import_completed_at.is_none());
        assert!(row.error.as_deref().unwrap().contains("5"));
    }

    #[tokio::test]
    async fn test_missing_tool_fails_before_any_work() {
        let h = Harness::new(ClobberMode::None);
        let empty = h.tmp.path().join("nowhere").join("*").join("sqlpackage");
        let orchestrator = h
            .orchestrator(
                Arc::new(FakeRunner::new(&h.events)),
                FakeDestination::new(&h.events, Some(false)),
            )
            .with_locator(ToolLocator::new(vec![empty.to_string_lossy().into_owned()]));

        let err = orchestrator.run().await.unwrap_err();

        assert_eq!(err.phase(), Some(Phase::ToolResolved));
        assert!(matches!(err.root(), MigrateError::ToolNotFound { .. }));
        assert_eq!(err.exit_code(), 3);
        assert!(h.events().is_empty());
        assert_eq!(
            h.store.written_statuses(),
            vec![RunStatus::Started, RunStatus::Failed]
        );
        match err {
            MigrateError::RunFailed { artifact, .. } => assert!(artifact.is_none()),
            other => panic!("expected RunFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_artifact_missing_after_export() {
        let h = Harness::new(ClobberMode::None);
        let mut runner = FakeRunner::new(&h.events);
        runner.writes_artifact = false;
        let orchestrator =
            h.orchestrator(Arc::new(runner), FakeDestination::new(&h.events, Some(false)));

        let err = orchestrator.run().await.unwrap_err();

        assert_eq!(err.phase(), Some(Phase::ArtifactVerified));
        assert!(matches!(err.root(), MigrateError::ArtifactMissing(_)));
        assert_eq!(err.exit_code(), 6);
        assert_eq!(h.events(), vec!["export"]);
    }

    #[tokio::test]
    async fn test_history_failures_do_not_change_outcome() {
        let h = Harness::new(ClobberMode::None);
        let orchestrator = h
            .orchestrator(
                Arc::new(FakeRunner::new(&h.events)),
                FakeDestination::new(&h.events, Some(false)),
            )
            .with_logger(RunLogger::new(Arc::new(MemoryHistoryStore::failing())));

        let result = orchestrator.run().await.unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.history_id, None);
        assert_eq!(h.events(), vec!["export", "import"]);
    }

    #[tokio::test]
    async fn test_runs_without_history_store() {
        let h = Harness::new(ClobberMode::None);
        let orchestrator = h
            .orchestrator(
                Arc::new(FakeRunner::new(&h.events)),
                FakeDestination::new(&h.events, Some(false)),
            )
            .with_logger(RunLogger::disabled());

        let result = orchestrator.run().await.unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.history_id, None);
        assert!(h.store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_diagnostics_and_onprem_destination_arguments() {
        let mut h = Harness::new(ClobberMode::None);
        h.config.destination.kind = PlatformKind::OnPrem;
        h.config.tool.diagnostics = true;
        h.config.tool.diagnostics_file = Some(PathBuf::from("/tmp/sqlpackage.log"));
        h.config.artifact.temp_directory = Some(PathBuf::from("/scratch"));
        let runner = Arc::new(FakeRunner::new(&h.events));
        let orchestrator =
            h.orchestrator(runner.clone(), FakeDestination::new(&h.events, Some(false)));

        orchestrator.run().await.unwrap();

        let calls = runner.calls();
        let (export, import) = (&calls[0], &calls[1]);
        assert!(has_arg(export, "/p:TempDirectoryForTableData=/scratch"));
        for call in [export, import] {
            assert!(has_arg(call, "/Diagnostics:True"));
            assert!(has_arg(call, "/DiagnosticsLevel:Verbose"));
            assert!(has_arg(call, "/DiagnosticsFile:/tmp/sqlpackage.log"));
        }
        assert!(!import.iter().any(|a| a.starts_with("/p:CompressionOption")));
        assert!(!import.iter().any(|a| a.starts_with("/p:TempDirectoryForTableData")));
        assert!(!import.iter().any(|a| a.starts_with("/p:DatabaseServiceObjective")));
        assert!(has_arg(
            import,
            "/TargetConnectionString:Server=S2;Initial Catalog=DB2;Integrated Security=True;TrustServerCertificate=True;"
        ));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut h = Harness::new(ClobberMode::None);
        h.config.destination.server = "S1".into();
        h.config.destination.database = "db1".into();
        let err = Orchestrator::new(h.config.clone()).err().unwrap();
        assert!(matches!(err, MigrateError::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_result_serializes_to_json() {
        let h = Harness::new(ClobberMode::None);
        let orchestrator = h.orchestrator(
            Arc::new(FakeRunner::new(&h.events)),
            FakeDestination::new(&h.events, Some(false)),
        );

        let json = orchestrator.run().await.unwrap().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["source"], "S1/DB1");
        assert_eq!(value["phases"][0], "init");
        assert_eq!(value["tool"]["version"]["major"], 16);
    }
}
