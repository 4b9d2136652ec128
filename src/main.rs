//! Main module for the VulnVault CLI application (vv).
//!
//! This module provides the main function and auxiliary functionalities for
//! the CLI application. It handles command parsing, configuration loading, and
//! initialization, as well as invoking the appropriate functionalities based on
//! the provided command-line arguments.
//!
//! # Examples
//!
//! Initializing the configuration and database:
//!
//! ```sh
//! vv init
//! ```
//!
//! Ingesting a corpus and searching it:
//!
//! ```sh
//! vv ingest ~/cvelistV5/cves --cwe-catalog ~/cwe.csv
//! vv search "script injection in web form" -k 10
//! vv similar "Cross-Site Scripting" 2023-1111
//! ```

use clap::Parser;
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::{env, error::Error, fs, path::PathBuf};
use tracing::{debug, info};

use vulnvault::commands::{self, Commands};
use vulnvault::config::{self, VaultConfig};
use vulnvault::db::{self, Database, SearchHit};
use vulnvault::embeddings::{EmbeddingProvider, SentenceEmbedder};
use vulnvault::{config_dir, ingest, resolve_model_dir};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt::init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

/// Main asynchronous function of the VulnVault CLI application.
///
/// Loads configuration, parses command-line arguments, builds the embedding
/// provider, and executes the appropriate command.
///
/// # Errors
///
/// Returns an error if there is an issue loading the configuration, opening
/// the store, loading the embedding model, or executing the specified command.
async fn run() -> Result<(), Box<dyn Error>> {
    let cli = commands::Cli::parse();

    let config_path = match env::var("VULNVAULT_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => config_dir()?.join("config.yaml"),
    };

    if matches!(cli.command, Commands::Init) {
        return init(&config_path);
    }

    debug!("Loading config from: {}", config_path.display());
    let vault_config = config::load_config(
        config_path
            .to_str()
            .ok_or("config path is not valid UTF-8")?,
    )?;
    debug!("Config loaded: {:?}", vault_config);

    let model_dir = resolve_model_dir(cli.model_dir.clone().or(vault_config.model_dir.clone()))?;
    let provider: Box<dyn EmbeddingProvider> = match model_dir {
        Some(dir) => {
            info!("Loading embedding model from {}", dir.display());
            Box::new(SentenceEmbedder::from_dir(&dir)?)
        }
        None => {
            info!("Loading embedding model from the Hugging Face Hub");
            Box::new(SentenceEmbedder::from_hub()?)
        }
    };
    let mut db = Database::open(&vault_config, provider).await?;

    match cli.command {
        Commands::Init => unreachable!("handled before the store is opened"),
        Commands::Ingest {
            corpus_dir,
            cwe_catalog,
            cwes,
        } => {
            let filter: Option<HashSet<String>> = if cwes.is_empty() {
                None
            } else {
                Some(cwes.into_iter().collect())
            };
            let report =
                ingest::ingest_corpus(&mut db, &corpus_dir, &cwe_catalog, filter.as_ref()).await?;
            println!(
                "{} ingested, {} skipped, {} failed",
                report.ingested, report.skipped, report.failed
            );
        }
        Commands::Search { query, top_k } => {
            let hits = db.search_by_description(query.as_str(), top_k).await?;
            print_hits(&hits);
        }
        Commands::Similar {
            cwe_name,
            cve_id,
            top_k,
        } => {
            let hits = db.search_by_constraint(&cwe_name, &cve_id, top_k).await?;
            print_hits(&hits);
        }
    }

    Ok(())
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No matches.");
        return;
    }
    for hit in hits {
        let name = hit.cwe.name.as_deref().unwrap_or("unnamed");
        let mut description: String = hit
            .cve
            .description
            .replace('\n', " ")
            .chars()
            .take(120)
            .collect();
        if description.len() < hit.cve.description.len() {
            description.push('…');
        }
        println!(
            "{:.4}  CVE-{}  CWE-{} ({name})",
            hit.similarity, hit.cve.id, hit.cwe.id
        );
        println!("        {description}");
    }
}

/// Initializes the application's configuration and database.
///
/// Creates the configuration directory, writes a starter `config.yaml`, and
/// creates the database schema so `ingest` can run immediately afterwards.
///
/// # Errors
///
/// Returns an error if there is an issue creating the directories or files, or
/// serializing the configuration to YAML.
fn init(config_path: &PathBuf) -> Result<(), Box<dyn Error>> {
    let config_dir = config_dir()?;
    info!("Creating config directory: {}", config_dir.display());
    fs::create_dir_all(&config_dir)?;

    let config = VaultConfig {
        database_url: config_dir.join("vulnvault.db").to_string_lossy().into_owned(),
        model_dir: None,
        vector_dimension: 1024,
    };

    info!("Creating config file: {}", config_path.display());
    let config_yaml = serde_yaml::to_string(&config)?;
    fs::write(config_path, config_yaml)?;

    let mut connection = config::establish_connection(&config.database_url)?;
    db::init_schema(&mut connection)?;
    info!("Created database at {}", config.database_url);

    Ok(())
}
