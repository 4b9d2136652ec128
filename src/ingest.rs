//! # Ingestion pipeline
//!
//! Walks a CVE corpus (cvelistV5 layout: one JSON file per CVE), extracts the
//! weakness category and description from each file, and drives the mutation
//! layer. The CWE catalog CSV supplies human-readable category names.
//!
//! The walk is failure-tolerant by contract: a malformed file, a record
//! missing its CWE classification, or a store error is logged and counted,
//! never fatal. The aggregate [`IngestReport`] comes back at the end.
//!
//! Category creation is deduplicated with an in-memory seen-set so
//! [`Database::insert_cwe`] runs at most once per distinct category per run;
//! records whose category arrives later (or never) still land via
//! `insert_cve`'s placeholder upsert.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db::Database;
use crate::error::{Result, VaultError};

/// One `(category, record, text)` triple extracted from a corpus file.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    /// Numeric part of the CWE id (`"79"` from `CWE-79`).
    pub cwe_id: String,
    /// Display name from the catalog, when the catalog knows the id.
    pub cwe_name: Option<String>,
    /// Numeric part of the CVE id (`"2023-1111"` from `CVE-2023-1111`).
    pub cve_id: String,
    /// Free-text vulnerability description.
    pub description: String,
}

/// Aggregate outcome of one corpus walk.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestReport {
    /// Records inserted into the store.
    pub ingested: usize,
    /// Files that yielded no usable entry, were filtered out, or duplicated
    /// an already-stored record.
    pub skipped: usize,
    /// Records the store or the embedding provider rejected.
    pub failed: usize,
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    cwe_id: String,
    cwe_name: String,
}

/// Load the CWE catalog CSV (`cwe_id,cwe_name` columns) into an id → name map.
pub fn load_cwe_catalog(path: &Path) -> Result<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| VaultError::Config(format!("cannot read CWE catalog: {e}")))?;
    let mut catalog = HashMap::new();
    for row in reader.deserialize() {
        let row: CatalogRow =
            row.map_err(|e| VaultError::Config(format!("malformed CWE catalog row: {e}")))?;
        catalog.insert(row.cwe_id, row.cwe_name);
    }
    Ok(catalog)
}

/// Extract a [`CorpusEntry`] from one cvelistV5 JSON file.
///
/// Returns `None` when the file is not parseable as a CVE record, carries no
/// CWE classification, or is excluded by `cwe_filter`. Mirrors the feed
/// layout: description under `containers.cna.descriptions[].value`, the CWE
/// under `containers.cna.problemTypes[].descriptions[].cweId`, and the CVE id
/// under `cveMetadata.cveId`.
pub fn parse_feed_file(
    path: &Path,
    catalog: &HashMap<String, String>,
    cwe_filter: Option<&HashSet<String>>,
) -> Option<CorpusEntry> {
    let content = std::fs::read_to_string(path).ok()?;
    let data: serde_json::Value = serde_json::from_str(&content).ok()?;

    let cna = data.get("containers")?.get("cna")?;

    let description = cna
        .get("descriptions")?
        .as_array()?
        .iter()
        .filter_map(|d| d.get("value")?.as_str())
        .last()?
        .to_string();

    let cwe_id = cna
        .get("problemTypes")?
        .as_array()?
        .iter()
        .filter_map(|p| p.get("descriptions")?.as_array())
        .flatten()
        .filter_map(|d| d.get("cweId")?.as_str()?.strip_prefix("CWE-"))
        .last()?
        .to_string();

    if let Some(filter) = cwe_filter {
        if !filter.contains(&cwe_id) {
            debug!("skipping {}: CWE-{cwe_id} not in filter", path.display());
            return None;
        }
    }

    let cve_id = data
        .get("cveMetadata")?
        .get("cveId")?
        .as_str()?
        .strip_prefix("CVE-")?
        .to_string();

    Some(CorpusEntry {
        cwe_name: catalog.get(&cwe_id).cloned(),
        cwe_id,
        cve_id,
        description,
    })
}

/// Walk `corpus_dir` and ingest every CVE JSON file found.
///
/// Per-record failures are logged and counted, never fatal; the whole walk
/// always runs to completion. Pass `cwe_filter` to restrict ingestion to an
/// allowlist of CWE numbers.
pub async fn ingest_corpus(
    db: &mut Database,
    corpus_dir: &Path,
    catalog_path: &Path,
    cwe_filter: Option<&HashSet<String>>,
) -> Result<IngestReport> {
    let catalog = load_cwe_catalog(catalog_path)?;
    info!(
        "ingesting corpus at {} ({} catalog entries)",
        corpus_dir.display(),
        catalog.len()
    );

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} {msg}").expect("static template"));
    bar.enable_steady_tick(Duration::from_millis(120));

    let mut seen_cwes: HashSet<String> = HashSet::new();
    let mut report = IngestReport::default();

    for file in WalkDir::new(corpus_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
    {
        let Some(entry) = parse_feed_file(file.path(), &catalog, cwe_filter) else {
            report.skipped += 1;
            continue;
        };

        // First sighting of a category: create it with its catalog name before
        // any record references it. A Duplicate just means a previous run (or
        // a placeholder) got there first.
        if seen_cwes.insert(entry.cwe_id.clone()) {
            if let Some(name) = &entry.cwe_name {
                match db.insert_cwe(&entry.cwe_id, name).await {
                    Ok(()) | Err(VaultError::Duplicate(_)) => {}
                    Err(e) => warn!("could not create CWE-{}: {e}", entry.cwe_id),
                }
            }
        }

        match db
            .insert_cve(&entry.cwe_id, &entry.cve_id, &entry.description)
            .await
        {
            Ok(()) => report.ingested += 1,
            Err(VaultError::Duplicate(_)) => {
                debug!("CVE-{} already stored", entry.cve_id);
                report.skipped += 1;
            }
            Err(e) => {
                warn!("failed to ingest {}: {e}", file.path().display());
                report.failed += 1;
            }
        }
        bar.set_message(format!(
            "{} ingested, {} skipped, {} failed",
            report.ingested, report.skipped, report.failed
        ));
    }

    bar.finish_and_clear();
    info!(
        "corpus walk done: {} ingested, {} skipped, {} failed",
        report.ingested, report.skipped, report.failed
    );
    Ok(report)
}
