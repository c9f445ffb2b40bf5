//! entityx CLI: content-integrity monitor.
//!
//! Usage:
//!   entityx watch [--events path]        surface events as JSON lines (stdin by default)
//!   entityx analyze <url> [--text-file path]
//!   entityx history | show | trust | audit | advisory
//!   entityx ask <query> | draft <entity-id> | export <entity-id>

use clap::{Parser, Subcommand};
use entityx::advisory::{AdvisoryRequest, AdvisoryService};
use entityx::capture::{SurfaceEvent, SurfaceMonitor};
use entityx::config::MonitorConfig;
use entityx::export::{ExportOutcome, ReportExporter};
use entityx::gateway::mock::{MockImageAnalyzer, MockTextAnalyzer};
use entityx::gateway::{AnalysisGateway, AnalyzerResult, FallbackChain};
use entityx::pipeline::{ManualRequest, MonitorPipeline, PipelineEvent};
use entityx::query::QueryFacade;
use entityx::storage::{EntityFilter, EntitySort, OpenStore, Persistence, SqliteStore};
use entityx::trust::TrustScoreEngine;
use entityx::{EntityType, RiskLevel};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "entityx", version, about = "Content-integrity monitor")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Path to SQLite database file (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Session id (overrides config)
    #[arg(long, global = true)]
    session: Option<String>,
    /// Use built-in mock analyzers instead of the configured endpoints
    #[arg(long, global = true)]
    offline: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume surface events and analyze what they reveal
    Watch {
        /// JSON-lines event file; stdin when omitted
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// Analyze a single URL
    Analyze {
        url: String,
        #[arg(long)]
        title: Option<String>,
        /// File holding the article text
        #[arg(long)]
        text_file: Option<PathBuf>,
    },
    /// List analyzed entities
    History {
        /// IMAGE, TEXT, NEWS or UNKNOWN
        #[arg(long = "type")]
        entity_type: Option<String>,
        /// LOW, MEDIUM or HIGH
        #[arg(long)]
        risk: Option<String>,
        /// newest, oldest or highest-risk
        #[arg(long, default_value = "newest")]
        sort: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one entity (recorded as viewed)
    Show { entity_id: String },
    /// Trust score history for an entity
    Trust { entity_id: String },
    /// Most recent audit events
    Audit {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Advisory transcripts, optionally for one entity
    Advisory {
        #[arg(long)]
        entity: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Ask the legal-awareness assistant
    Ask {
        query: String,
        #[arg(long)]
        entity: Option<String>,
    },
    /// Draft a complaint about an entity
    Draft { entity_id: String },
    /// Export an evidence report
    Export {
        entity_id: String,
        /// Destination file; without it the export is cancelled
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Get the default config path (~/.config/entityx/config.yaml)
fn default_config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config"));
    config_dir.join("entityx").join("config.yaml")
}

struct App {
    config: MonitorConfig,
    session: String,
    persistence: Persistence,
    query: QueryFacade,
    offline: bool,
}

fn open_app(cli: &Cli) -> Result<App, String> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = MonitorConfig::load(&config_path).map_err(|e| e.to_string())?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());
    let store = SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;

    let persistence = Persistence::new(Arc::new(store));
    persistence.rebuild_cache();
    let session = cli.session.clone().unwrap_or_else(|| config.session_id.clone());

    Ok(App {
        query: QueryFacade::new(persistence.clone()),
        persistence,
        session,
        config,
        offline: cli.offline,
    })
}

impl App {
    fn pipeline(&self) -> Result<MonitorPipeline, String> {
        let gateway = if self.offline {
            AnalysisGateway::new(
                Arc::new(MockImageAnalyzer::returning(
                    AnalyzerResult::new("offline").with_fake_probability(0.0),
                )),
                Arc::new(MockTextAnalyzer::returning(
                    AnalyzerResult::new("offline").with_ai_generated_probability(0.0),
                )),
                FallbackChain::empty(),
            )
        } else {
            self.config.build_gateway().map_err(|e| e.to_string())?
        };
        Ok(MonitorPipeline::new(
            gateway,
            Arc::new(TrustScoreEngine::new()),
            self.persistence.clone(),
        ))
    }

    fn advisory(&self) -> Result<AdvisoryService, String> {
        let chain = if self.offline {
            FallbackChain::empty()
        } else {
            self.config.build_advisory_chain().map_err(|e| e.to_string())?
        };
        Ok(AdvisoryService::new(chain, self.persistence.clone()))
    }
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn fail(message: impl std::fmt::Display) -> i32 {
    eprintln!("Error: {}", message);
    1
}

async fn event_source(path: Option<&Path>) -> std::io::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match path {
        Some(p) => Box::new(BufReader::new(tokio::fs::File::open(p).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    Ok(reader)
}

async fn cmd_watch(app: &App, events: Option<&Path>) -> i32 {
    let pipeline = match app.pipeline() {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let reader = match event_source(events).await {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    let (event_tx, event_rx) = mpsc::channel::<SurfaceEvent>(64);
    let (capture_tx, capture_rx) = mpsc::channel(64);
    let monitor = tokio::spawn(SurfaceMonitor::new(app.config.extraction_timer()).run(event_rx, capture_tx));

    let mut updates = pipeline.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = updates.recv().await {
            match event {
                PipelineEvent::EntityDetected(entity) => {
                    if let Ok(line) = serde_json::to_string(&entity) {
                        println!("{}", line);
                    }
                }
                PipelineEvent::AnalysisFailed { source_url, error, .. } => {
                    eprintln!("analysis failed for {}: {}", source_url, error);
                }
            }
        }
    });

    let reader_task = tokio::spawn(async move {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match serde_json::from_str::<SurfaceEvent>(&line) {
                    Ok(event) => {
                        if event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "skipping malformed surface event"),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "event stream read failed");
                    break;
                }
            }
        }
        debug!("surface event stream ended");
    });

    let detected = pipeline.consume(capture_rx, &app.session).await;
    let _ = reader_task.await;
    let _ = monitor.await;
    drop(pipeline);
    let _ = printer.await;

    eprintln!("{} entities detected", detected);
    0
}

async fn cmd_analyze(app: &App, url: String, title: Option<String>, text_file: Option<&Path>) -> i32 {
    let text = match text_file {
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(t) => Some(t),
            Err(e) => return fail(format!("{}: {}", path.display(), e)),
        },
        None => None,
    };
    let pipeline = match app.pipeline() {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    match pipeline
        .analyze_manual(ManualRequest { url, title, text }, Some(&app.session))
        .await
    {
        Ok(entity) => print_json(&entity),
        Err(e) => fail(e),
    }
}

fn cmd_history(app: &App, entity_type: Option<String>, risk: Option<String>, sort: &str, limit: Option<usize>) -> i32 {
    let Some(sort) = EntitySort::parse(sort) else {
        return fail(format!("unknown sort '{}'", sort));
    };
    let mut filter = EntityFilter::new().with_sort(sort);
    if let Some(t) = entity_type {
        filter = filter.with_type(EntityType::parse(&t));
    }
    if let Some(r) = risk {
        filter = filter.with_risk(RiskLevel::parse_or_low(&r));
    }
    if let Some(limit) = limit {
        filter = filter.with_limit(limit);
    }
    match app.query.list(&filter) {
        Ok(page) => print_json(&serde_json::json!({
            "records": page.entities,
            "total": page.total,
        })),
        Err(e) => fail(e),
    }
}

fn cmd_show(app: &App, entity_id: &str) -> i32 {
    match app.query.open_entity(entity_id, Some(&app.session)) {
        Ok(Some(entity)) => print_json(&entity),
        Ok(None) => fail(format!("entity '{}' not found", entity_id)),
        Err(e) => fail(e),
    }
}

async fn cmd_ask(app: &App, query: String, entity: Option<String>) -> i32 {
    let service = match app.advisory() {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let reply = service
        .ask(AdvisoryRequest {
            query,
            entity_id: entity,
            session_id: Some(app.session.clone()),
        })
        .await;
    let code = if reply.is_error() { 1 } else { 0 };
    print_json(&reply).max(code)
}

async fn cmd_draft(app: &App, entity_id: &str) -> i32 {
    let service = match app.advisory() {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let reply = service.draft_complaint(entity_id, Some(&app.session)).await;
    let code = if reply.is_error() { 1 } else { 0 };
    print_json(&reply).max(code)
}

fn cmd_export(app: &App, entity_id: &str, output: Option<&Path>) -> i32 {
    let exporter = ReportExporter::new(app.query.clone());
    match exporter.export_report(entity_id, output, Some(&app.session)) {
        Ok(ExportOutcome::Saved(path)) => {
            println!("Saved evidence report to {}", path.display());
            0
        }
        Ok(ExportOutcome::Cancelled) => {
            println!("Export cancelled: no output path given");
            0
        }
        Err(e) => fail(e),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "entityx=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = match open_app(&cli) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Watch { events } => cmd_watch(&app, events.as_deref()).await,
        Commands::Analyze { url, title, text_file } => {
            cmd_analyze(&app, url, title, text_file.as_deref()).await
        }
        Commands::History {
            entity_type,
            risk,
            sort,
            limit,
        } => cmd_history(&app, entity_type, risk, &sort, limit),
        Commands::Show { entity_id } => cmd_show(&app, &entity_id),
        Commands::Trust { entity_id } => match app.query.trust_history(&entity_id) {
            Ok(points) => print_json(&points),
            Err(e) => fail(e),
        },
        Commands::Audit { limit } => match app.query.audit_tail(limit) {
            Ok(events) => print_json(&events),
            Err(e) => fail(e),
        },
        Commands::Advisory { entity, limit } => {
            let sessions = match entity {
                Some(id) => app.query.advisory_history(&id),
                None => app.query.advisory_tail(limit),
            };
            match sessions {
                Ok(s) => print_json(&s),
                Err(e) => fail(e),
            }
        }
        Commands::Ask { query, entity } => cmd_ask(&app, query, entity).await,
        Commands::Draft { entity_id } => cmd_draft(&app, &entity_id).await,
        Commands::Export { entity_id, output } => cmd_export(&app, &entity_id, output.as_deref()),
    };
    std::process::exit(code);
}
