//! Citydepot CLI - resolution phase driver for city-model imports

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use citydepot::config::{self, ImportConfig};
use citydepot::resolver::{ResolutionRunner, ResolverRegistry};
use citydepot::storage::SqliteStore;
use citydepot::{LinkKind, LinkRecord};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "citydepot")]
#[command(version)]
#[command(about = "City-model import store - deferred cross-reference resolution")]
#[command(long_about = r#"
Citydepot completes the deferred cross-references (XLinks) a city-model
import leaves behind: library-object payloads, texture images, and geometry
pointers whose targets did not exist yet during primary import.

Example usage:
  citydepot init
  citydepot enqueue --kind library_object --target-id 42 --locator models/tree.obj
  citydepot resolve --import-path ./import
  citydepot status
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and a config file in the current directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Queue a deferred reference for the next resolve run
    Enqueue {
        /// Link kind (library_object, texture_image, surface_geometry)
        #[arg(short, long)]
        kind: LinkKind,

        /// Row id of the placeholder to complete
        #[arg(short, long)]
        target_id: i64,

        /// Payload source: path, URL, or #gmlid fragment
        #[arg(short, long)]
        locator: String,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Drain the queue of deferred references
    Resolve {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Base path for relative payload locators
        #[arg(short, long)]
        import_path: Option<PathBuf>,
    },

    /// Show database statistics
    Status {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::Init { force } => run_init(force),
        Commands::Enqueue { kind, target_id, locator, database } => {
            let store = open_store(database, &config)?;
            let record = LinkRecord::new(kind, target_id, locator)?;
            let id = store.enqueue_link(&record)?;
            println!("Queued {} link {} for target {}", record.kind, id, record.target_id);
            Ok(())
        }
        Commands::Resolve { database, import_path } => {
            run_resolve(database, import_path, &config)
        }
        Commands::Status { database, json } => {
            let store = open_store(database, &config)?;
            let stats = store.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{}", stats);
            }
            Ok(())
        }
    }
}

fn database_path(flag: Option<PathBuf>, config: &ImportConfig) -> PathBuf {
    flag.or_else(|| config.database.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| config::default_database_path_in(Path::new(".")))
}

fn open_store(flag: Option<PathBuf>, config: &ImportConfig) -> anyhow::Result<SqliteStore> {
    let db_path = database_path(flag, config);
    config::ensure_db_dir(&db_path)?;
    Ok(SqliteStore::open(&db_path)?)
}

fn run_init(force: bool) -> anyhow::Result<()> {
    let db_path = config::default_database_path_in(Path::new("."));
    config::ensure_db_dir(&db_path)?;
    SqliteStore::open(&db_path)?;

    let config = ImportConfig {
        database: Some(db_path.display().to_string()),
        import_path: Some(".".into()),
    };
    config::write_config(&config::default_config_path(), &config, force)?;

    println!("Initialized city-model store at {}", db_path.display());
    Ok(())
}

fn run_resolve(
    database: Option<PathBuf>,
    import_path: Option<PathBuf>,
    config: &ImportConfig,
) -> anyhow::Result<()> {
    let db_path = database_path(database, config);
    let import_path = import_path
        .or_else(|| config.import_path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    config::ensure_db_dir(&db_path)?;
    let store = SqliteStore::open(&db_path)?;
    let queued = store.pending_count()?;
    tracing::info!("Resolving {} pending links", queued);

    let registry = ResolverRegistry::for_database(&db_path, &import_path)?;
    let mut runner = ResolutionRunner::new(registry);
    runner.resolve_pending(&store)?;
    let stats = runner.finish();

    print!("{}", stats);
    Ok(())
}
