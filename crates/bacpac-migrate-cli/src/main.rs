//! bacpac-migrate CLI - SQL Server migration through a BACPAC file.

use bacpac_migrate::config::{
    ArtifactConfig, DestinationConfig, EndpointConfig, LoggingConfig, ToolConfig,
};
use bacpac_migrate::{
    ClobberMode, CompressionMode, Config, HistoryStore, MigrateError, MigrationRun,
    MssqlHistoryStore, Orchestrator, PlatformKind, RunLogger, ToolLocator,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "bacpac-migrate")]
#[command(about = "Migrate a SQL Server database by exporting and importing a BACPAC")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file (flags override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the source database and import it at the destination
    Run(RunArgs),

    /// Show the SqlPackage installation that would be used
    LocateTool {
        /// SqlPackage path pattern to search instead of the defaults (repeatable)
        #[arg(long = "tool-path")]
        tool_paths: Vec<String>,

        /// List every installation found, not just the selected one
        #[arg(long)]
        all: bool,
    },

    /// Create the run history table and indexes if they do not exist
    InitLogStore {
        /// Connection string of the run history database
        #[arg(long)]
        log_connection_string: Option<String>,
    },

    /// List recent runs from the history store
    History {
        /// Connection string of the run history database
        #[arg(long)]
        log_connection_string: Option<String>,

        /// Number of runs to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Source server name
    #[arg(long)]
    source_server: Option<String>,

    /// Source database name
    #[arg(long)]
    source_database: Option<String>,

    /// Destination server name
    #[arg(long)]
    destination_server: Option<String>,

    /// Destination database name (also names the BACPAC file)
    #[arg(long)]
    destination_database: Option<String>,

    /// Source platform: cloud or onprem [default: cloud]
    #[arg(long)]
    source_kind: Option<PlatformKind>,

    /// Destination platform: cloud or onprem [default: cloud]
    #[arg(long)]
    destination_kind: Option<PlatformKind>,

    /// Directory holding the BACPAC [default: <temp>/bacpac-migrate]
    #[arg(long)]
    artifact_dir: Option<PathBuf>,

    /// What to replace: none, source, destination or both [default: none]
    #[arg(long)]
    clobber: Option<ClobberMode>,

    /// Export compression: fast, optimal, maximum or nocompression [default: fast]
    #[arg(long)]
    compression: Option<CompressionMode>,

    /// Directory SqlPackage spools table data to during export
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Service objective for cloud destinations [default: GP_Gen5_2]
    #[arg(long)]
    service_tier: Option<String>,

    /// Pass verbose diagnostics flags to SqlPackage
    #[arg(long)]
    diagnostics: bool,

    /// File SqlPackage writes diagnostics to
    #[arg(long)]
    diagnostics_file: Option<PathBuf>,

    /// SqlPackage path pattern to search instead of the defaults (repeatable)
    #[arg(long = "tool-path")]
    tool_paths: Vec<String>,

    /// Connection string of the run history database
    #[arg(long)]
    log_connection_string: Option<String>,
}

impl RunArgs {
    /// Overlay the flags that were given onto `config`.
    fn apply(self, config: &mut Config) {
        if let Some(server) = self.source_server {
            config.source.server = server;
        }
        if let Some(database) = self.source_database {
            config.source.database = database;
        }
        if let Some(kind) = self.source_kind {
            config.source.kind = kind;
        }
        if let Some(server) = self.destination_server {
            config.destination.server = server;
        }
        if let Some(database) = self.destination_database {
            config.destination.database = database;
        }
        if let Some(kind) = self.destination_kind {
            config.destination.kind = kind;
        }
        if let Some(tier) = self.service_tier {
            config.destination.service_tier = tier;
        }
        if let Some(dir) = self.artifact_dir {
            config.artifact.directory = dir;
        }
        if let Some(clobber) = self.clobber {
            config.artifact.clobber = clobber;
        }
        if let Some(compression) = self.compression {
            config.artifact.compression = compression;
        }
        if let Some(dir) = self.temp_dir {
            config.artifact.temp_directory = Some(dir);
        }
        if self.diagnostics {
            config.tool.diagnostics = true;
        }
        if let Some(file) = self.diagnostics_file {
            config.tool.diagnostics_file = Some(file);
        }
        if !self.tool_paths.is_empty() {
            config.tool.paths = self.tool_paths;
        }
        if let Some(connection_string) = self.log_connection_string {
            config.logging = Some(LoggingConfig { connection_string });
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    match cli.command {
        Commands::Run(args) => {
            let config = build_config(cli.config.as_deref(), args)?;
            let logger = RunLogger::connect(config.logging.as_ref()).await;
            let orchestrator = Orchestrator::new(config)?.with_logger(logger);

            let result = orchestrator.run().await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nMigration completed!");
                println!("  Run ID: {}", result.run_id);
                if let Some(id) = result.history_id {
                    println!("  History run: {}", id);
                }
                println!("  Source: {}", result.source);
                println!("  Destination: {}", result.destination);
                println!(
                    "  SqlPackage: {} ({})",
                    result.tool.version,
                    result.tool.path.display()
                );
                println!(
                    "  BACPAC: {} ({:.2} MB, {})",
                    result.artifact.display(),
                    result.artifact_size_mb.unwrap_or(0.0),
                    if result.exported { "exported" } else { "reused" }
                );
                if result.destination_dropped {
                    println!("  Existing destination dropped before import");
                }
                println!(
                    "  Duration: {}s (export {}s, import {}s)",
                    result.duration_seconds.unwrap_or(0),
                    result.export_duration_seconds.unwrap_or(0),
                    result.import_duration_seconds.unwrap_or(0)
                );
            }
        }

        Commands::LocateTool { tool_paths, all } => {
            let mut tool = match cli.config.as_deref() {
                Some(path) => load_config(path)?.tool,
                None => ToolConfig::default(),
            };
            if !tool_paths.is_empty() {
                tool.paths = tool_paths;
            }
            let locator = ToolLocator::from_config(&tool);

            if all {
                let found = locator.discover();
                if cli.output_json {
                    println!("{}", serde_json::to_string_pretty(&found)?);
                } else {
                    for installation in &found {
                        println!("{}  {}", installation.version, installation.path.display());
                    }
                }
                if found.is_empty() {
                    return Err(MigrateError::ToolNotFound {
                        searched: locator.candidates().to_vec(),
                    });
                }
            } else {
                let selected = locator.locate()?;
                if cli.output_json {
                    println!("{}", serde_json::to_string_pretty(&selected)?);
                } else {
                    println!("{}  {}", selected.version, selected.path.display());
                }
            }
        }

        Commands::InitLogStore {
            log_connection_string,
        } => {
            let connection_string =
                history_connection_string(cli.config.as_deref(), log_connection_string)?;
            let store = MssqlHistoryStore::connect(&connection_string).await?;
            store.ensure_schema().await?;
            println!("History store ready");
        }

        Commands::History {
            log_connection_string,
            limit,
        } => {
            let connection_string =
                history_connection_string(cli.config.as_deref(), log_connection_string)?;
            let store = MssqlHistoryStore::connect(&connection_string).await?;
            let runs = store.recent(limit).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&runs)?);
            } else if runs.is_empty() {
                println!("No runs recorded");
            } else {
                for run in &runs {
                    println!("{}", format_run(run));
                }
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Config, MigrateError> {
    let config = Config::load(path)?;
    info!("Loaded configuration from {:?}", path);
    Ok(config)
}

/// Configuration from the file (if any) with the run flags applied on top.
fn build_config(path: Option<&Path>, args: RunArgs) -> Result<Config, MigrateError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config {
            source: EndpointConfig {
                server: String::new(),
                database: String::new(),
                kind: PlatformKind::default(),
            },
            destination: DestinationConfig {
                server: String::new(),
                database: String::new(),
                kind: PlatformKind::default(),
                service_tier: "GP_Gen5_2".to_string(),
            },
            artifact: ArtifactConfig::default(),
            tool: ToolConfig::default(),
            logging: None,
        },
    };
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn history_connection_string(
    path: Option<&Path>,
    flag: Option<String>,
) -> Result<String, MigrateError> {
    if let Some(connection_string) = flag {
        return Ok(connection_string);
    }
    let configured = match path {
        Some(path) => load_config(path)?.logging,
        None => None,
    };
    configured.map(|l| l.connection_string).ok_or_else(|| {
        MigrateError::Config(
            "a history store is required: pass --log-connection-string or set logging.connection_string"
                .to_string(),
        )
    })
}

fn format_run(run: &MigrationRun) -> String {
    let mut line = format!(
        "#{} {} {:<9} {}/{} -> {}/{}",
        run.id.unwrap_or_default(),
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
        run.status.to_string(),
        run.source_server,
        run.source_database,
        run.destination_server,
        run.destination_database
    );
    if let Some(secs) = run.duration_secs() {
        line.push_str(&format!(" {}s", secs));
    }
    if let Some(size) = run.artifact_size_mb {
        line.push_str(&format!(" {:.2} MB", size));
    }
    if let Some(error) = &run.error {
        line.push_str(&format!(" ({})", error));
    }
    line
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
