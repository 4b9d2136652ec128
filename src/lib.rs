//! # VulnVault (library root)
//!
//! This crate provides the core plumbing for the **VulnVault** CLI and library:
//! - Relational storage of CWE weakness categories and the CVE records that
//!   belong to them (`config`, `models`, `schema`, `db`).
//! - Semantic similarity search over record descriptions via an HNSW index
//!   (`vector_index`) and a Candle sentence-embedding model (`embeddings`).
//! - Corpus ingestion for cvelistV5 feeds (`ingest`).
//! - CLI parsing (`commands`).
//!
//! In addition, this module exposes utilities for:
//! - Discovering the per-platform configuration directory ([`config_dir`]).
//! - Resolving a **local** copy of the `e5-large-v2` sentence-embedding model
//!   ([`resolve_model_dir`]), so repeated runs don't have to touch the
//!   Hugging Face Hub.
//!
//! ## Embedding model layout & discovery
//! A local model directory must contain `config.json`, `tokenizer.json`, and
//! `model.safetensors`. [`resolve_model_dir`] checks, in priority order:
//!
//! 1. An explicit override path — typically the `--model-dir` flag or the
//!    `VULNVAULT_MODEL_DIR` env var.
//! 2. `./e5-large-v2` under the current working directory.
//! 3. `e5-large-v2` under the per-platform config directory, e.g.:
//!    - macOS: `~/Library/Application Support/com.awful-sec.vv/e5-large-v2`
//!    - Linux (XDG): `~/.config/vv/e5-large-v2`
//!    - Windows: `C:\Users\<you>\AppData\Roaming\vv\e5-large-v2`
//!
//! When none of those exist the embedder is loaded from the Hub instead (see
//! [`embeddings::SentenceEmbedder::from_hub`]), which caches under the
//! standard `hf-hub` location.
//!
//! ## Modules
//! - [`commands`], [`config`], [`db`], [`embeddings`], [`error`], [`ingest`],
//!   [`models`], [`schema`], [`vector_index`]

use directories::ProjectDirs;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub mod commands;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod models;
pub mod schema;
pub mod vector_index;

use crate::error::{Result, VaultError};

/// Directory name a local model copy is looked up under.
const MODEL_DIR_NAME: &str = "e5-large-v2";

/// Return the per-platform configuration directory used by VulnVault.
///
/// This uses [`directories::ProjectDirs`] with the application triple
/// `("com", "awful-sec", "vv")`, so you get the right place on each OS
/// (e.g., `~/Library/Application Support/com.awful-sec.vv` on macOS).
///
/// The directory is **not** created by this function; callers that need it
/// should create it with `fs::create_dir_all`.
///
/// # Errors
/// Returns an error if the platform configuration directory cannot be
/// determined (rare, but possible in heavily sandboxed environments).
pub fn config_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "awful-sec", "vv")
        .ok_or_else(|| VaultError::Config("Unable to determine config directory".to_string()))?;
    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Internal: does `p` look like a **non-empty directory**?
fn exists_nonempty_dir(p: &Path) -> bool {
    p.is_dir()
        && fs::read_dir(p)
            .map(|mut it| it.next().is_some())
            .unwrap_or(false)
}

/// Resolve a usable local model directory **without downloading**.
///
/// Checks the override, then `./e5-large-v2`, then the config directory (see
/// the crate docs for the full lookup order). Returns `Ok(None)` when nothing
/// local exists — callers fall back to the Hub.
///
/// # Errors
/// The override path was provided but does not exist or is empty.
pub fn resolve_model_dir(cli_override: Option<PathBuf>) -> Result<Option<PathBuf>> {
    // 1) If caller provided a path (flag or env), prefer it
    if let Some(dir) = cli_override {
        if !exists_nonempty_dir(&dir) {
            return Err(VaultError::Config(format!(
                "--model-dir points to a non-existent/empty directory: {}",
                dir.display()
            )));
        }
        return Ok(Some(dir));
    }

    // 2) A copy in the current working directory
    let cwd_dir = std::env::current_dir()?.join(MODEL_DIR_NAME);
    if exists_nonempty_dir(&cwd_dir) {
        return Ok(Some(cwd_dir));
    }

    // 3) Fallback to config_dir()/e5-large-v2
    let cfg_dir = config_dir()?.join(MODEL_DIR_NAME);
    if exists_nonempty_dir(&cfg_dir) {
        return Ok(Some(cfg_dir));
    }

    Ok(None)
}
