//! Modelsync CLI - synchronize entity schemas and seed fixtures

use clap::{Parser, Subcommand};
use modelsync::config::{self, ModelsyncConfig};
use modelsync::storage::StorageBackend;
use modelsync::ui::{self, Icons, ProgressMessage, SeedProgress};
use modelsync::{Registry, SqliteBackend, SyncEngine, resolver};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "modelsync")]
#[command(version = "0.1.0")]
#[command(about = "Dependency-ordered schema synchronization and fixture seeding")]
#[command(long_about = r#"
Modelsync reads entity definitions, computes a safe dependency order over
their references, and drives two traversals over it:
  • Schema synchronization (create tables if needed, exactly once each)
  • Fixture seeding (bulk insert of seed rows into empty tables)

Example usage:
  modelsync sync --models models.json --database app.db
  modelsync seed --models models.json --fixtures ./fixtures
  modelsync status
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to modelsync.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize every entity's storage shape in dependency order
    Sync {
        /// Path to the entity definitions file
        #[arg(short, long)]
        models: Option<PathBuf>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Drop and recreate tables (destructive)
        #[arg(short, long)]
        force: bool,
    },

    /// Synchronize, then seed empty tables from fixture files
    Seed {
        /// Path to the entity definitions file
        #[arg(short, long)]
        models: Option<PathBuf>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Directory holding <entity>.json fixture files
        #[arg(short = 'F', long)]
        fixtures: Option<PathBuf>,
    },

    /// Show entities, their tables, row counts and references
    Status {
        /// Path to the entity definitions file
        #[arg(short, long)]
        models: Option<PathBuf>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Show the entities one entity references
    Refs {
        /// Entity name
        #[arg(short, long)]
        entity: String,

        /// Path to the entity definitions file
        #[arg(short, long)]
        models: Option<PathBuf>,
    },

    /// Write a default modelsync.toml
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },
}

fn resolve(explicit: Option<PathBuf>, configured: Option<&str>, default: PathBuf) -> PathBuf {
    explicit
        .or_else(|| configured.map(PathBuf::from))
        .unwrap_or(default)
}

fn load_registry(models: &Path) -> anyhow::Result<Registry> {
    let entities = modelsync::entity::load_models(models)
        .map_err(|e| anyhow::anyhow!("cannot load models file {}: {e}", models.display()))?;
    Ok(Registry::from_entities(entities))
}

fn build_engine(models: &Path, database: &Path) -> anyhow::Result<SyncEngine> {
    let registry = load_registry(models)?;
    config::ensure_db_dir(database)?;
    let backend = SqliteBackend::open(database)?;
    Ok(SyncEngine::new(registry, Box::new(backend))?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let file_config = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::Sync { models, database, force } => {
            let models = resolve(models, file_config.models.as_deref(), config::default_models_path());
            let database = resolve(database, file_config.database.as_deref(), config::default_database_path());

            ui::header("Synchronizing entities");
            ui::info("models", &models.display().to_string());
            ui::info("database", &database.display().to_string());

            let mut engine = build_engine(&models, &database)?;
            let report = match engine.sync_all(force).await {
                Ok(report) => report,
                Err(e) => {
                    ui::error(&format!("Synchronization aborted: {e}"));
                    return Err(e.into());
                }
            };

            ui::success(&format!("Synchronized {} entities", report.total()));
            ui::summary_row("created", &report.created.to_string());
            ui::summary_row("recreated", &report.recreated.to_string());
            ui::summary_row("unchanged", &report.unchanged.to_string());
        }

        Commands::Seed { models, database, fixtures } => {
            let models = resolve(models, file_config.models.as_deref(), config::default_models_path());
            let database = resolve(database, file_config.database.as_deref(), config::default_database_path());
            let fixtures = resolve(fixtures, file_config.fixtures.as_deref(), config::default_fixtures_dir());

            ui::header(&format!("Seeding {} from {}", database.display(), fixtures.display()));
            let mut engine = build_engine(&models, &database)?;

            // Tables must exist before rows can land
            engine.sync_all(false).await?;

            let matched = modelsync::fixture::discover(&fixtures, engine.registry_mut())?;
            if matched.is_empty() {
                ui::warn(&format!("no fixtures found under {}", fixtures.display()));
                return Ok(());
            }
            println!(
                "{} {} fixture file(s): {}",
                Icons::FILE,
                matched.len(),
                ui::dim(&matched.join(", "))
            );

            let (progress, tx) = SeedProgress::new();
            let sender = tx.clone();
            engine.set_progress(Box::new(move |entity, percent| {
                sender
                    .send(ProgressMessage::Percent {
                        entity: entity.to_string(),
                        percent,
                    })
                    .ok();
            }));

            let report = engine.load_fixtures().await?;
            tx.send(ProgressMessage::Exit).ok();
            progress.clear();

            if report.failed > 0 {
                ui::warn(&format!("Seeding finished with failures: {report}"));
            } else {
                ui::success(&format!("Seeding complete: {report}"));
            }
        }

        Commands::Status { models, database } => {
            let models = resolve(models, file_config.models.as_deref(), config::default_models_path());
            let database = resolve(database, file_config.database.as_deref(), config::default_database_path());

            let registry = load_registry(&models)?;
            let mut backend = SqliteBackend::open(&database)?;

            let mut rows = Vec::new();
            for entity in registry.all() {
                let count = match backend.row_count(entity).await {
                    Ok(count) => count.to_string(),
                    // Table not created yet
                    Err(_) => "-".to_string(),
                };
                let references = resolver::references_of(entity, &registry);
                rows.push(ui::EntityRow {
                    entity: entity.name.clone(),
                    table: entity.table_name(),
                    rows: count,
                    references: if references.is_empty() {
                        String::new()
                    } else {
                        references.join(", ")
                    },
                });
            }

            println!("{} Modelsync status ({})", Icons::STATS, database.display());
            ui::section("Entities");
            println!("{}", ui::entity_table(&rows));
        }

        Commands::Refs { entity, models } => {
            let models = resolve(models, file_config.models.as_deref(), config::default_models_path());
            let registry = load_registry(&models)?;

            let Some(target) = registry.get(&entity) else {
                anyhow::bail!("unknown entity '{entity}'");
            };

            println!("{} {} ({})", Icons::PACKAGE, entity, target.table_name());
            for attribute in &target.attributes {
                let mut line = format!("  {} {}", attribute.name, attribute.kind);
                if attribute.primary_key {
                    line.push_str(" [pk]");
                }
                if let Some(reference) = &attribute.references {
                    line.push_str(&format!(" -> {reference}"));
                }
                println!("{}", ui::dim(&line));
            }

            let references = resolver::references_of(target, &registry);
            if references.is_empty() {
                println!("{} references nothing", Icons::LINK);
            } else {
                println!("{} references: {}", Icons::LINK, references.join(", "));
            }
        }

        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            let defaults = ModelsyncConfig {
                database: Some(config::default_database_path().display().to_string()),
                models: Some(config::default_models_path().display().to_string()),
                fixtures: Some(config::default_fixtures_dir().display().to_string()),
            };
            config::write_config(&path, &defaults, force)?;
            ui::success(&format!("Wrote {}", path.display()));
        }
    }

    Ok(())
}
