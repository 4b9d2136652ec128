//! # Database (mutation layer + similarity search)
//!
//! [`Database`] is the one handle the rest of the system talks to. It owns:
//!
//! - a SQLite connection (Diesel) holding the `cwes` / `cves` tables,
//! - the injected [`EmbeddingProvider`] used to embed descriptions, and
//! - the derived [`VectorIndex`] used to answer nearest-neighbor queries.
//!
//! Every operation runs in its own transactional scope: begin → act →
//! commit-or-abort, released on all exit paths. The embedding call is the one
//! slow, blocking step of a mutation and always happens **before** the write
//! transaction opens, so a provider failure aborts with no partial write and
//! no lock held.
//!
//! Missing targets of rename/update/delete resolve as silent no-ops (the
//! idempotent-mutation design the ingestion pipeline relies on). Anchor
//! search is different: there the caller named a specific record, so absence
//! is [`VaultError::NotFound`].
//!
//! ## Quick Example
//! ```no_run
//! use vulnvault::config::VaultConfig;
//! use vulnvault::db::Database;
//! use vulnvault::embeddings::SentenceEmbedder;
//!
//! # async fn demo() -> Result<(), vulnvault::error::VaultError> {
//! let config = VaultConfig {
//!     database_url: "vulnvault.db".into(),
//!     model_dir: None,
//!     vector_dimension: 1024,
//! };
//! let embedder = SentenceEmbedder::from_hub()?;
//! let mut db = Database::open(&config, Box::new(embedder)).await?;
//!
//! db.insert_cwe("79", "Cross-Site Scripting").await?;
//! db.insert_cve("79", "2023-1111", "An XSS vulnerability allows ...").await?;
//!
//! for hit in db.search_by_description("script injection in web form", 5).await? {
//!     println!("{} [{:?}] {:.3}", hit.cve.id, hit.cwe.name, hit.similarity);
//! }
//! # Ok(()) }
//! ```

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::{VaultConfig, establish_connection};
use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, VaultError};
use crate::models::{Cve, Cwe, decode_embedding, encode_embedding};
use crate::schema::{cves, cwes};
use crate::vector_index::VectorIndex;

/// Embedded DDL. `CREATE TABLE IF NOT EXISTS`, so applying it is idempotent.
const SCHEMA_DDL: &str = "\
CREATE TABLE IF NOT EXISTS cwes (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT UNIQUE
);
CREATE TABLE IF NOT EXISTS cves (
    id TEXT PRIMARY KEY NOT NULL,
    cwe_id TEXT NOT NULL REFERENCES cwes(id),
    description TEXT NOT NULL,
    embedding BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS cves_cwe_id_idx ON cves(cwe_id);
";

/// Create the `cwes` / `cves` tables if they do not exist yet.
pub fn init_schema(connection: &mut SqliteConnection) -> Result<()> {
    connection.batch_execute(SCHEMA_DDL)?;
    Ok(())
}

/// Map Diesel constraint failures onto the crate's taxonomy.
fn constraint_error(what: String, err: diesel::result::Error) -> VaultError {
    use diesel::result::{DatabaseErrorKind, Error};
    match err {
        Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => VaultError::Duplicate(what),
        Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            VaultError::Referential(what)
        }
        other => VaultError::Database(other),
    }
}

/// Query input for [`Database::search_by_description`]: free text to embed, or
/// a pre-computed vector.
#[derive(Debug, Clone)]
pub enum SearchQuery {
    Text(String),
    Vector(Vec<f32>),
}

impl From<&str> for SearchQuery {
    fn from(text: &str) -> Self {
        SearchQuery::Text(text.to_string())
    }
}

impl From<String> for SearchQuery {
    fn from(text: String) -> Self {
        SearchQuery::Text(text)
    }
}

impl From<Vec<f32>> for SearchQuery {
    fn from(vector: Vec<f32>) -> Self {
        SearchQuery::Vector(vector)
    }
}

/// One search result: the record, its owning category, and
/// `1 − cosine_distance(query, record)`.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub cve: Cve,
    pub cwe: Cwe,
    pub similarity: f32,
}

/// Handle over the relational store, the ANN index, and the embedding model.
pub struct Database {
    connection: SqliteConnection,
    provider: Box<dyn EmbeddingProvider>,
    index: VectorIndex,
    dimension: usize,
}

impl Database {
    /// Open (and if necessary create) the store at `config.database_url`.
    ///
    /// Applies the schema, then rebuilds the ANN index from the stored
    /// embeddings — the relational store is the sole durable artifact, the
    /// HNSW graph is derived state.
    ///
    /// # Errors
    /// - [`VaultError::Config`] if the provider's dimension disagrees with
    ///   `config.vector_dimension`.
    /// - Connection, schema, or codec failures.
    pub async fn open(config: &VaultConfig, provider: Box<dyn EmbeddingProvider>) -> Result<Self> {
        if provider.dimension() != config.vector_dimension {
            return Err(VaultError::Config(format!(
                "provider produces {}-d vectors but the store is configured for {}",
                provider.dimension(),
                config.vector_dimension
            )));
        }

        let mut connection = establish_connection(&config.database_url)?;
        init_schema(&mut connection)?;

        let dimension = config.vector_dimension;
        let mut index = VectorIndex::new(dimension);
        let stored: Vec<(String, Vec<u8>)> = cves::table
            .select((cves::id, cves::embedding))
            .load(&mut connection)?;
        for (id, blob) in stored {
            index.insert(&id, decode_embedding(&blob)?)?;
        }
        debug!("loaded {} embeddings into the vector index", index.len());

        Ok(Self {
            connection,
            provider,
            index,
            dimension,
        })
    }

    /// Dimensionality of stored embeddings.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Insert a weakness category.
    ///
    /// # Errors
    /// [`VaultError::Duplicate`] if `cwe_id` or `cwe_name` is already taken
    /// (a placeholder row created by [`insert_cve`](Self::insert_cve) counts —
    /// it owns the id).
    pub async fn insert_cwe(&mut self, cwe_id: &str, cwe_name: &str) -> Result<()> {
        let cwe = Cwe {
            id: cwe_id.to_string(),
            name: Some(cwe_name.to_string()),
        };
        self.connection.transaction::<_, VaultError, _>(|conn| {
            diesel::insert_into(cwes::table)
                .values(&cwe)
                .execute(conn)
                .map_err(|e| {
                    constraint_error(format!("cwe id '{cwe_id}' or name '{cwe_name}'"), e)
                })?;
            Ok(())
        })
    }

    /// Insert a vulnerability record.
    ///
    /// The description is embedded before the write transaction opens. If the
    /// category does not exist yet, a nameless placeholder row is upserted in
    /// the same transaction (`ON CONFLICT DO NOTHING`), which keeps
    /// out-of-order and concurrent ingestion benign.
    ///
    /// # Errors
    /// - [`VaultError::Duplicate`] if `cve_id` already exists.
    /// - [`VaultError::Provider`] if embedding fails; nothing is written.
    pub async fn insert_cve(
        &mut self,
        cwe_id: &str,
        cve_id: &str,
        description: &str,
    ) -> Result<()> {
        let vector = self.provider.embed(description)?;
        let cve = Cve {
            id: cve_id.to_string(),
            cwe_id: cwe_id.to_string(),
            description: description.to_string(),
            embedding: encode_embedding(&vector)?,
        };

        self.connection.transaction::<_, VaultError, _>(|conn| {
            let placeholder = Cwe {
                id: cwe_id.to_string(),
                name: None,
            };
            diesel::insert_into(cwes::table)
                .values(&placeholder)
                .on_conflict(cwes::id)
                .do_nothing()
                .execute(conn)?;

            diesel::insert_into(cves::table)
                .values(&cve)
                .execute(conn)
                .map_err(|e| constraint_error(format!("cve '{cve_id}'"), e))?;
            Ok(())
        })?;

        self.index.insert(cve_id, vector)
    }

    /// Rename a weakness category. No-op if `old_name` does not exist.
    ///
    /// The foreign key is on the id, not the name, so dependent records are
    /// unaffected.
    ///
    /// # Errors
    /// [`VaultError::Duplicate`] if `new_name` is already taken; both rows
    /// keep their names.
    pub async fn rename_cwe(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        self.connection.transaction::<_, VaultError, _>(|conn| {
            let existing = cwes::table
                .filter(cwes::name.eq(old_name))
                .first::<Cwe>(conn)
                .optional()?;
            let Some(cwe) = existing else {
                debug!("rename_cwe: no category named '{old_name}', nothing to do");
                return Ok(());
            };
            diesel::update(cwes::table.find(&cwe.id))
                .set(cwes::name.eq(new_name))
                .execute(conn)
                .map_err(|e| constraint_error(format!("cwe name '{new_name}'"), e))?;
            Ok(())
        })
    }

    /// Replace a record's description, re-embedding it.
    ///
    /// No-op if the category or the record is missing. Otherwise the new
    /// description and its embedding are committed together — never one
    /// without the other.
    ///
    /// # Errors
    /// [`VaultError::Provider`] if embedding fails; the stored description and
    /// embedding are left exactly as they were.
    pub async fn update_cve_description(
        &mut self,
        cwe_name: &str,
        cve_id: &str,
        new_description: &str,
    ) -> Result<()> {
        let Some((cve, _)) = self.find_cve(cwe_name, cve_id).await? else {
            debug!("update_cve_description: no '{cve_id}' under '{cwe_name}', nothing to do");
            return Ok(());
        };

        let vector = self.provider.embed(new_description)?;
        let blob = encode_embedding(&vector)?;

        let updated = self.connection.transaction::<usize, VaultError, _>(|conn| {
            diesel::update(
                cves::table
                    .filter(cves::id.eq(cve_id))
                    .filter(cves::cwe_id.eq(&cve.cwe_id)),
            )
            .set((
                cves::description.eq(new_description),
                cves::embedding.eq(blob.as_slice()),
            ))
            .execute(conn)
            .map_err(VaultError::from)
        })?;

        if updated > 0 {
            self.index.insert(cve_id, vector)?;
        }
        Ok(())
    }

    /// Delete a weakness category and all of its records. No-op if `cwe_name`
    /// does not exist.
    pub async fn delete_cwe(&mut self, cwe_name: &str) -> Result<()> {
        let removed: Vec<String> = self.connection.transaction::<_, VaultError, _>(|conn| {
            let existing = cwes::table
                .filter(cwes::name.eq(cwe_name))
                .first::<Cwe>(conn)
                .optional()?;
            let Some(cwe) = existing else {
                debug!("delete_cwe: no category named '{cwe_name}', nothing to do");
                return Ok(Vec::new());
            };
            let ids = cves::table
                .filter(cves::cwe_id.eq(&cwe.id))
                .select(cves::id)
                .load::<String>(conn)?;
            diesel::delete(cves::table.filter(cves::cwe_id.eq(&cwe.id))).execute(conn)?;
            diesel::delete(cwes::table.find(&cwe.id)).execute(conn)?;
            Ok(ids)
        })?;

        for id in &removed {
            self.index.remove(id);
        }
        Ok(())
    }

    /// Delete a single record. No-op if the category or the record is missing.
    pub async fn delete_cve(&mut self, cwe_name: &str, cve_id: &str) -> Result<()> {
        let removed = self.connection.transaction::<bool, VaultError, _>(|conn| {
            let existing = cwes::table
                .filter(cwes::name.eq(cwe_name))
                .first::<Cwe>(conn)
                .optional()?;
            let Some(cwe) = existing else {
                return Ok(false);
            };
            let n = diesel::delete(
                cves::table
                    .filter(cves::id.eq(cve_id))
                    .filter(cves::cwe_id.eq(&cwe.id)),
            )
            .execute(conn)?;
            Ok(n > 0)
        })?;

        if removed {
            self.index.remove(cve_id);
        }
        Ok(())
    }

    /// Look up a category by display name.
    pub async fn find_cwe_by_name(&mut self, name: &str) -> Result<Option<Cwe>> {
        self.connection.transaction::<_, VaultError, _>(|conn| {
            cwes::table
                .filter(cwes::name.eq(name))
                .first::<Cwe>(conn)
                .optional()
                .map_err(VaultError::from)
        })
    }

    /// Look up a record (and its category) by `(category name, record id)`.
    ///
    /// The record id is a primary key, so this resolves to at most one row.
    pub async fn find_cve(&mut self, cwe_name: &str, cve_id: &str) -> Result<Option<(Cve, Cwe)>> {
        self.connection.transaction::<_, VaultError, _>(|conn| {
            cves::table
                .inner_join(cwes::table)
                .filter(cwes::name.eq(cwe_name))
                .filter(cves::id.eq(cve_id))
                .select((Cve::as_select(), Cwe::as_select()))
                .first::<(Cve, Cwe)>(conn)
                .optional()
                .map_err(VaultError::from)
        })
    }

    /// Free-text / vector similarity search.
    ///
    /// Returns at most `top_k` hits, highest similarity first, each joined
    /// with its owning category in a single query. Ties are broken by record
    /// id, so result order is deterministic.
    ///
    /// # Errors
    /// - [`VaultError::InvalidQuery`] for a query vector of the wrong
    ///   dimension.
    /// - [`VaultError::Provider`] if embedding a text query fails.
    pub async fn search_by_description(
        &mut self,
        query: impl Into<SearchQuery>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let vector = match query.into() {
            SearchQuery::Text(text) => self.provider.embed(&text)?,
            SearchQuery::Vector(vector) => {
                if vector.len() != self.dimension {
                    return Err(VaultError::InvalidQuery(format!(
                        "expected a {}-d query vector, got {}",
                        self.dimension,
                        vector.len()
                    )));
                }
                vector
            }
        };

        let candidates = self.index.search(&vector, top_k)?;
        self.load_hits(candidates)
    }

    /// "Find similar" search anchored on an existing record.
    ///
    /// Uses the anchor's **stored** embedding (no re-embedding), and never
    /// includes the anchor itself in the results.
    ///
    /// # Errors
    /// [`VaultError::NotFound`] if `(cwe_name, cve_id)` does not resolve.
    pub async fn search_by_constraint(
        &mut self,
        cwe_name: &str,
        cve_id: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let (anchor, _) = self.find_cve(cwe_name, cve_id).await?.ok_or_else(|| {
            VaultError::NotFound(format!("CVE '{cve_id}' not found in CWE '{cwe_name}'"))
        })?;
        let vector = anchor.embedding_vector()?;

        // One extra candidate so dropping the anchor still leaves top_k.
        let mut candidates = self.index.search(&vector, top_k.saturating_add(1))?;
        candidates.retain(|(id, _)| id != cve_id);
        candidates.truncate(top_k);
        self.load_hits(candidates)
    }

    /// Fetch the rows for ranked candidates — one joined query, no per-hit
    /// lookups — and stitch similarities back on in candidate order.
    fn load_hits(&mut self, candidates: Vec<(String, f32)>) -> Result<Vec<SearchHit>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&String> = candidates.iter().map(|(id, _)| id).collect();
        let rows: Vec<(Cve, Cwe)> = self.connection.transaction::<_, VaultError, _>(|conn| {
            cves::table
                .inner_join(cwes::table)
                .filter(cves::id.eq_any(ids))
                .select((Cve::as_select(), Cwe::as_select()))
                .load::<(Cve, Cwe)>(conn)
                .map_err(VaultError::from)
        })?;

        let mut by_id: HashMap<String, (Cve, Cwe)> = rows
            .into_iter()
            .map(|(cve, cwe)| (cve.id.clone(), (cve, cwe)))
            .collect();

        let mut hits = Vec::with_capacity(candidates.len());
        for (id, similarity) in candidates {
            match by_id.remove(&id) {
                Some((cve, cwe)) => hits.push(SearchHit {
                    cve,
                    cwe,
                    similarity,
                }),
                // Index and store disagree; the index is derived state, trust the store.
                None => warn!("vector index returned '{id}' but the store has no such record"),
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::testing::{FlakyEmbedder, HashEmbedder};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    const DIM: usize = 16;

    fn test_config() -> VaultConfig {
        VaultConfig {
            database_url: ":memory:".to_string(),
            model_dir: None,
            vector_dimension: DIM,
        }
    }

    async fn test_db() -> Database {
        Database::open(&test_config(), Box::new(HashEmbedder::new(DIM)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_then_search_returns_top_hit() {
        let mut db = test_db().await;
        db.insert_cwe("89", "SQL Injection").await.unwrap();
        db.insert_cve("89", "2023-0001", "SQL injection in the login form of the admin panel")
            .await
            .unwrap();

        let hits = db
            .search_by_description("SQL injection in the login form of the admin panel", 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].cve.id, "2023-0001");
        assert_eq!(hits[0].cwe.name.as_deref(), Some("SQL Injection"));
        assert!(hits[0].similarity > 0.999);
    }

    #[tokio::test]
    async fn test_insert_cwe_duplicate_id_and_name() {
        let mut db = test_db().await;
        db.insert_cwe("79", "Cross-Site Scripting").await.unwrap();

        let same_id = db.insert_cwe("79", "Something Else").await;
        assert!(matches!(same_id, Err(VaultError::Duplicate(_))));

        let same_name = db.insert_cwe("80", "Cross-Site Scripting").await;
        assert!(matches!(same_name, Err(VaultError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_insert_cve_duplicate_id() {
        let mut db = test_db().await;
        db.insert_cve("79", "2023-0001", "an XSS bug").await.unwrap();

        let dup = db.insert_cve("79", "2023-0001", "the same XSS bug again").await;
        assert!(matches!(dup, Err(VaultError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_insert_cve_auto_creates_placeholder_category() {
        let mut db = test_db().await;
        db.insert_cve("918", "2023-0002", "server side request forgery in webhook handler")
            .await
            .unwrap();

        let hits = db
            .search_by_description("server side request forgery in webhook handler", 1)
            .await
            .unwrap();
        assert_eq!(hits[0].cve.id, "2023-0002");
        assert_eq!(hits[0].cwe.id, "918");
        assert_eq!(hits[0].cwe.name, None);

        // The placeholder owns the id now, so an explicit create collides.
        let explicit = db.insert_cwe("918", "SSRF").await;
        assert!(matches!(explicit, Err(VaultError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_rename_cwe_missing_is_noop() {
        let mut db = test_db().await;
        db.rename_cwe("No Such Category", "Whatever").await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_cwe_to_taken_name_fails_and_changes_nothing() {
        let mut db = test_db().await;
        db.insert_cwe("79", "Cross-Site Scripting").await.unwrap();
        db.insert_cwe("89", "SQL Injection").await.unwrap();

        let result = db.rename_cwe("SQL Injection", "Cross-Site Scripting").await;
        assert!(matches!(result, Err(VaultError::Duplicate(_))));

        assert!(db.find_cwe_by_name("SQL Injection").await.unwrap().is_some());
        let xss = db.find_cwe_by_name("Cross-Site Scripting").await.unwrap();
        assert_eq!(xss.unwrap().id, "79");
    }

    #[tokio::test]
    async fn test_rename_cwe_keeps_records_reachable() {
        let mut db = test_db().await;
        db.insert_cwe("79", "Cross-Site Scripting").await.unwrap();
        db.insert_cve("79", "2023-0001", "stored XSS in comment field")
            .await
            .unwrap();

        db.rename_cwe("Cross-Site Scripting", "XSS").await.unwrap();

        let found = db.find_cve("XSS", "2023-0001").await.unwrap();
        assert!(found.is_some());
        assert!(db.find_cve("Cross-Site Scripting", "2023-0001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_description_reembeds() {
        let mut db = test_db().await;
        db.insert_cwe("119", "Buffer Overflow").await.unwrap();
        db.insert_cve("119", "2023-0003", "heap overflow in png decoder")
            .await
            .unwrap();

        db.update_cve_description("Buffer Overflow", "2023-0003", "stack smashing in kernel driver ioctl path")
            .await
            .unwrap();

        let (cve, _) = db.find_cve("Buffer Overflow", "2023-0003").await.unwrap().unwrap();
        assert_eq!(cve.description, "stack smashing in kernel driver ioctl path");

        let hits = db
            .search_by_description("stack smashing in kernel driver ioctl path", 1)
            .await
            .unwrap();
        assert_eq!(hits[0].cve.id, "2023-0003");
        assert!(hits[0].similarity > 0.999);
    }

    #[tokio::test]
    async fn test_update_description_missing_is_noop() {
        let mut db = test_db().await;
        db.update_cve_description("Nope", "2023-0404", "whatever").await.unwrap();
    }

    #[tokio::test]
    async fn test_update_description_provider_failure_is_atomic() {
        let fail = Arc::new(AtomicBool::new(false));
        let provider = FlakyEmbedder::new(DIM, fail.clone());
        let mut db = Database::open(&test_config(), Box::new(provider)).await.unwrap();

        db.insert_cwe("79", "Cross-Site Scripting").await.unwrap();
        db.insert_cve("79", "2023-0001", "reflected XSS in search box")
            .await
            .unwrap();

        fail.store(true, Ordering::SeqCst);
        let result = db
            .update_cve_description("Cross-Site Scripting", "2023-0001", "totally different text")
            .await;
        assert!(matches!(result, Err(VaultError::Provider(_))));
        fail.store(false, Ordering::SeqCst);

        // Neither the description nor the embedding moved.
        let (cve, _) = db.find_cve("Cross-Site Scripting", "2023-0001").await.unwrap().unwrap();
        assert_eq!(cve.description, "reflected XSS in search box");
        let hits = db
            .search_by_description("reflected XSS in search box", 1)
            .await
            .unwrap();
        assert_eq!(hits[0].cve.id, "2023-0001");
        assert!(hits[0].similarity > 0.999);
    }

    #[tokio::test]
    async fn test_delete_cwe_cascades_to_records() {
        let mut db = test_db().await;
        db.insert_cwe("89", "SQL Injection").await.unwrap();
        db.insert_cve("89", "2023-0001", "blind SQL injection in order lookup")
            .await
            .unwrap();
        db.insert_cve("89", "2023-0002", "union based SQL injection in report export")
            .await
            .unwrap();

        db.delete_cwe("SQL Injection").await.unwrap();

        assert!(db.find_cwe_by_name("SQL Injection").await.unwrap().is_none());
        let hits = db
            .search_by_description("blind SQL injection in order lookup", 5)
            .await
            .unwrap();
        assert!(hits.iter().all(|h| h.cve.id != "2023-0001" && h.cve.id != "2023-0002"));
    }

    #[tokio::test]
    async fn test_delete_cve_and_missing_noop() {
        let mut db = test_db().await;
        db.insert_cwe("79", "Cross-Site Scripting").await.unwrap();
        db.insert_cve("79", "2023-0001", "DOM XSS via postMessage")
            .await
            .unwrap();

        db.delete_cve("Cross-Site Scripting", "2023-0001").await.unwrap();
        assert!(db.find_cve("Cross-Site Scripting", "2023-0001").await.unwrap().is_none());
        assert!(db.search_by_description("DOM XSS via postMessage", 5).await.unwrap().is_empty());

        // Absent record and absent category are both silent no-ops.
        db.delete_cve("Cross-Site Scripting", "2023-0001").await.unwrap();
        db.delete_cve("No Such Category", "2023-0001").await.unwrap();
    }

    #[tokio::test]
    async fn test_search_with_precomputed_vector() {
        let mut db = test_db().await;
        db.insert_cwe("22", "Path Traversal").await.unwrap();
        db.insert_cve("22", "2023-0004", "directory traversal in zip extraction")
            .await
            .unwrap();

        let embedder = HashEmbedder::new(DIM);
        let vector = embedder.embed("directory traversal in zip extraction").unwrap();
        let hits = db.search_by_description(vector, 1).await.unwrap();
        assert_eq!(hits[0].cve.id, "2023-0004");
        assert!(hits[0].similarity > 0.999);
    }

    #[tokio::test]
    async fn test_search_rejects_wrong_dimension_vector() {
        let mut db = test_db().await;
        let result = db.search_by_description(vec![1.0_f32, 2.0], 3).await;
        assert!(matches!(result, Err(VaultError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_search_top_k_zero_is_empty() {
        let mut db = test_db().await;
        db.insert_cve("79", "2023-0001", "an XSS bug").await.unwrap();
        assert!(db.search_by_description("an XSS bug", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_constraint_search_excludes_anchor_and_finds_near_duplicate() {
        let mut db = test_db().await;
        db.insert_cwe("89", "SQL Injection").await.unwrap();
        db.insert_cve(
            "89",
            "2023-1001",
            "A SQL injection vulnerability in the login form allows remote attackers to execute arbitrary SQL commands",
        )
        .await
        .unwrap();
        db.insert_cve(
            "89",
            "2023-1002",
            "A SQL injection vulnerability in the search form allows remote attackers to execute arbitrary SQL commands",
        )
        .await
        .unwrap();
        db.insert_cve("89", "2023-1003", "completely unrelated use after free in font renderer")
            .await
            .unwrap();

        let hits = db.search_by_constraint("SQL Injection", "2023-1001", 5).await.unwrap();
        assert!(hits.iter().all(|h| h.cve.id != "2023-1001"));
        assert_eq!(hits[0].cve.id, "2023-1002");
        assert!(hits[0].similarity > 0.8);

        for top_k in 1..=3 {
            let hits = db.search_by_constraint("SQL Injection", "2023-1001", top_k).await.unwrap();
            assert!(hits.iter().all(|h| h.cve.id != "2023-1001"));
            assert!(hits.len() <= top_k);
        }
    }

    #[tokio::test]
    async fn test_constraint_search_uses_stored_embedding_not_reembedding() {
        let fail = Arc::new(AtomicBool::new(false));
        let provider = FlakyEmbedder::new(DIM, fail.clone());
        let mut db = Database::open(&test_config(), Box::new(provider)).await.unwrap();

        db.insert_cwe("89", "SQL Injection").await.unwrap();
        db.insert_cve("89", "2023-1001", "SQL injection in login").await.unwrap();
        db.insert_cve("89", "2023-1002", "SQL injection in signup").await.unwrap();

        // Anchor search must keep working while the provider is down.
        fail.store(true, Ordering::SeqCst);
        let hits = db.search_by_constraint("SQL Injection", "2023-1001", 1).await.unwrap();
        assert_eq!(hits[0].cve.id, "2023-1002");
    }

    #[tokio::test]
    async fn test_constraint_search_missing_anchor_is_not_found() {
        let mut db = test_db().await;
        db.insert_cwe("89", "SQL Injection").await.unwrap();
        db.insert_cve("89", "2023-1001", "SQL injection in login").await.unwrap();

        let missing_cve = db.search_by_constraint("SQL Injection", "2099-9999", 5).await;
        assert!(matches!(missing_cve, Err(VaultError::NotFound(_))));

        let missing_cwe = db.search_by_constraint("No Such Category", "2023-1001", 5).await;
        assert!(matches!(missing_cwe, Err(VaultError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_xss_scenario() {
        let mut db = test_db().await;
        db.insert_cwe("79", "Cross-Site Scripting").await.unwrap();
        db.insert_cve(
            "79",
            "2023-1111",
            "An XSS vulnerability allows script injection through an unsanitized web form field",
        )
        .await
        .unwrap();

        let hits = db.search_by_description("script injection in web form", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].cve.id, "2023-1111");
    }

    #[tokio::test]
    async fn test_reopen_rebuilds_index_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = VaultConfig {
            database_url: dir.path().join("vault.db").to_string_lossy().into_owned(),
            model_dir: None,
            vector_dimension: DIM,
        };

        {
            let mut db = Database::open(&config, Box::new(HashEmbedder::new(DIM))).await.unwrap();
            db.insert_cwe("79", "Cross-Site Scripting").await.unwrap();
            db.insert_cve("79", "2023-0001", "persistent XSS in profile page").await.unwrap();
        }

        let mut db = Database::open(&config, Box::new(HashEmbedder::new(DIM))).await.unwrap();
        let hits = db.search_by_description("persistent XSS in profile page", 1).await.unwrap();
        assert_eq!(hits[0].cve.id, "2023-0001");
        assert!(hits[0].similarity > 0.999);
    }

    #[tokio::test]
    async fn test_open_rejects_dimension_mismatch() {
        let result = Database::open(&test_config(), Box::new(HashEmbedder::new(DIM + 1))).await;
        assert!(matches!(result, Err(VaultError::Config(_))));
    }
}
