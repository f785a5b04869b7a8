//! Command-line entry point for the annotation core.
//!
//! Opens (or creates) a database, optionally imports `.txt` files, and
//! prints the analytics dashboard as JSON.
//!
//! Usage:
//!   annotool `<db-path>` [--settings `<file.json>`] [--import `<file>`...] [--log-dir `<dir>`]
//!     [--log-level `<level>`]

use annotool_core::{
    init_logging, open_db, AnalyticsService, CoreSettings, DocumentService, PlainTextExtractor,
    SqliteAnnotationRepository, SqliteDocumentRepository, SqliteLabelRepository,
    SqliteRelationshipRepository, Upload,
};
use clap::Parser;
use log::info;
use std::error::Error;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "annotool", version, about = "Inspect and populate an annotation database")]
struct Args {
    /// SQLite database file; created when missing.
    db_path: PathBuf,
    /// JSON file with core settings; missing keys keep their defaults.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Plain-text files to import before printing the dashboard.
    #[arg(long = "import", value_name = "FILE")]
    imports: Vec<PathBuf>,
    /// Absolute directory for rolling log files.
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Log level used with --log-dir.
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(&args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = &args.log_dir {
        let level = args
            .log_level
            .clone()
            .unwrap_or_else(|| annotool_core::default_log_level().as_str().to_string());
        init_logging(&level, log_dir)?;
    }

    let settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => CoreSettings::default(),
    };

    let conn = open_db(&args.db_path)?;

    if !args.imports.is_empty() {
        let documents = DocumentService::with_upload_limit(
            SqliteDocumentRepository::try_new(&conn)?,
            SqliteAnnotationRepository::try_new(&conn)?,
            settings.max_upload_bytes,
        );
        for path in &args.imports {
            let bytes = std::fs::read(path)?;
            let original_filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let document = documents.import(
                Upload {
                    name: None,
                    original_filename: &original_filename,
                    bytes: &bytes,
                },
                &PlainTextExtractor,
            )?;
            info!(
                "event=cli_import module=cli status=ok document_uuid={}",
                document.uuid
            );
        }
    }

    let analytics = AnalyticsService::new(
        SqliteLabelRepository::try_new(&conn)?,
        SqliteRelationshipRepository::try_new(&conn)?,
        SqliteAnnotationRepository::try_new(&conn)?,
        SqliteDocumentRepository::try_new(&conn)?,
        settings,
    );
    let dashboard = analytics.dashboard()?;
    println!("{}", serde_json::to_string_pretty(&dashboard)?);
    Ok(())
}

fn load_settings(path: &Path) -> Result<CoreSettings, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)?;
    let settings: CoreSettings = serde_json::from_str(&raw)?;
    Ok(settings.normalized())
}
