//! This module defines the command-line interface for the application using `clap`.
//!
//! It provides a `Cli` struct that represents the parsed command-line arguments,
//! and a `Commands` enum that represents the available subcommands and their
//! options.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Represents the parsed command-line arguments.
///
/// This struct is constructed by parsing the command-line arguments using `clap`.
/// It contains a `command` field that holds the parsed subcommand and its options.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,

    /// Local embedding-model directory (config.json / tokenizer.json /
    /// model.safetensors). Falls back to `./e5-large-v2`, then the config
    /// directory, then the Hugging Face Hub.
    #[arg(long = "model-dir", global = true, env = "VULNVAULT_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// The 'init' subcommand: writes a starter config file and creates the
    /// database schema.
    Init,

    /// The 'ingest' subcommand: walks a cvelistV5-layout corpus directory and
    /// stores every classified CVE it finds.
    #[clap(name = "ingest")]
    Ingest {
        /// Directory containing the CVE JSON feed.
        corpus_dir: PathBuf,

        /// CWE catalog CSV with `cwe_id,cwe_name` columns.
        #[arg(long = "cwe-catalog")]
        cwe_catalog: PathBuf,

        /// Restrict ingestion to these CWE numbers (repeatable).
        #[arg(long = "cwe")]
        cwes: Vec<String>,
    },

    /// The 'search' subcommand: free-text semantic search over stored records.
    #[clap(name = "search", alias = "s")]
    Search {
        /// The text to search for.
        query: String,

        /// How many results to return.
        #[arg(short = 'k', long = "top-k", default_value_t = 5)]
        top_k: usize,
    },

    /// The 'similar' subcommand: find records similar to an existing one.
    #[clap(name = "similar", alias = "sim")]
    Similar {
        /// Display name of the anchor's weakness category.
        cwe_name: String,

        /// Id of the anchor record (e.g. `2023-1111`).
        cve_id: String,

        /// How many results to return.
        #[arg(short = 'k', long = "top-k", default_value_t = 5)]
        top_k: usize,
    },
}
