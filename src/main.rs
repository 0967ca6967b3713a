//! # Corpus Studio CLI (`corpus`)
//!
//! A thin collaborator over the state engine, exercising the same mutation
//! entry points a desktop front-end would. State lives in a single JSON
//! file; the engine loads it at startup and saves it before exit.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `corpus add <title>` | Add a source text |
//! | `corpus list` | List source texts |
//! | `corpus rm <id>` | Delete a source text (cascades into datasets) |
//! | `corpus dataset create <name>` | Create a dataset |
//! | `corpus dataset add-source <dataset-id> <source-id>` | Link a source text |
//! | `corpus dataset list` | List datasets |
//! | `corpus export [path]` | Write a portable export document |
//! | `corpus import <path>` | Merge an export document into local state |
//! | `corpus settings theme <value>` | Update settings through the validated path |
//! | `corpus sync` | Force-consistency pass against the backend |
//!
//! The binary runs against the in-memory backend; a real deployment wires
//! the engine to the host application's backend implementation instead.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use corpus_studio::backend::memory::InMemoryBackend;
use corpus_studio::backend::Backend;
use corpus_studio::models::{NewDataset, NewSourceText, SourceKind};
use corpus_studio::persist;
use corpus_studio::settings::SettingsPatch;
use corpus_studio::store::EntityStore;
use corpus_studio::sync::SyncService;

#[derive(Parser)]
#[command(
    name = "corpus",
    about = "Corpus Studio — state engine for corpus preparation",
    version
)]
struct Cli {
    /// Path to the state file. Defaults to the platform app-data location.
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a source text.
    Add {
        title: String,
        /// Author attribution.
        #[arg(long)]
        author: Option<String>,
        /// Language code, e.g. "en" or "grc".
        #[arg(long)]
        language: Option<String>,
        /// Source kind: book, article, manuscript, scripture, other.
        #[arg(long, default_value = "other")]
        kind: String,
    },
    /// List source texts.
    List,
    /// Delete a source text, cascading out of any datasets.
    Rm { id: String },
    /// Dataset operations.
    Dataset {
        #[command(subcommand)]
        command: DatasetCommands,
    },
    /// Write a portable export document to a file or stdout.
    Export { path: Option<PathBuf> },
    /// Merge an export document into the local state.
    Import { path: PathBuf },
    /// Update settings through the validated path.
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Push local entities to the backend, then pull its view back.
    Sync,
}

#[derive(Subcommand)]
enum DatasetCommands {
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    AddSource {
        dataset_id: String,
        source_id: String,
    },
    List,
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Set the theme: light, dark, or system.
    Theme { value: String },
    /// Toggle autosave.
    Autosave { value: bool },
    /// Show current settings.
    Show,
}

fn parse_kind(kind: &str) -> Result<SourceKind> {
    Ok(match kind {
        "book" => SourceKind::Book,
        "article" => SourceKind::Article,
        "manuscript" => SourceKind::Manuscript,
        "scripture" => SourceKind::Scripture,
        "other" => SourceKind::Other,
        other => anyhow::bail!(
            "unknown source kind '{}' (expected book, article, manuscript, scripture, other)",
            other
        ),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let state_path = cli.state.unwrap_or_else(persist::default_state_path);

    let store = Arc::new(EntityStore::new());
    persist::load_state(&store, &state_path);
    let backend: Arc<dyn Backend> = Arc::new(InMemoryBackend::new());

    match cli.command {
        Commands::Add {
            title,
            author,
            language,
            kind,
        } => {
            let id = store.add_source_text(NewSourceText {
                title,
                author,
                language,
                kind: parse_kind(&kind)?,
                ..Default::default()
            });
            println!("added {}", id);
        }
        Commands::List => {
            for st in store.source_texts() {
                println!(
                    "{}  [{:?}] {} ({})",
                    st.id,
                    st.status,
                    st.title,
                    st.author.as_deref().unwrap_or("unknown")
                );
            }
        }
        Commands::Rm { id } => {
            if store.delete_source_text(&id) {
                println!("removed {}", id);
            } else {
                println!("no source text {}", id);
            }
        }
        Commands::Dataset { command } => match command {
            DatasetCommands::Create { name, description } => {
                let id = store.create_dataset(NewDataset {
                    name,
                    description,
                    ..Default::default()
                });
                println!("created {}", id);
            }
            DatasetCommands::AddSource {
                dataset_id,
                source_id,
            } => {
                if store.add_source_to_dataset(&dataset_id, &source_id) {
                    println!("linked {} -> {}", source_id, dataset_id);
                } else {
                    println!("nothing to do");
                }
            }
            DatasetCommands::List => {
                for ds in store.datasets() {
                    println!(
                        "{}  [{:?}] {} — {} sources, {} chunks",
                        ds.id,
                        ds.status,
                        ds.name,
                        ds.source_ids.len(),
                        ds.metadata.total_chunks
                    );
                }
            }
        },
        Commands::Export { path } => {
            let json = persist::export_json(&store)?;
            match path {
                Some(path) => {
                    std::fs::write(&path, &json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("exported to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::Import { path } => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let summary = persist::import_state(&store, &json)?;
            println!(
                "imported {} source texts, {} datasets",
                summary.source_texts, summary.datasets
            );
        }
        Commands::Settings { command } => match command {
            SettingsCommands::Theme { value } => {
                let patch = SettingsPatch::default().theme_from_str(&value)?;
                store.update_settings(patch, backend.as_ref()).await?;
                println!("theme set to {}", value);
            }
            SettingsCommands::Autosave { value } => {
                let patch = SettingsPatch {
                    autosave: Some(value),
                    ..Default::default()
                };
                store.update_settings(patch, backend.as_ref()).await?;
                println!("autosave set to {}", value);
            }
            SettingsCommands::Show => {
                println!("{}", serde_json::to_string_pretty(&store.settings())?);
            }
        },
        Commands::Sync => {
            let service = SyncService::new(Arc::clone(&store), Arc::clone(&backend));
            let report = service.manual_sync().await?;
            println!("pushed {}, failed {}", report.pushed, report.failed);
            service.destroy();
        }
    }

    persist::save_state(&store, &state_path);
    if let Some(error) = store.take_error() {
        eprintln!("warning: {}", error);
    }
    Ok(())
}
