//! # Database models
//!
//! Data structures that map to the project's SQLite schema via **Diesel**.
//!
//! Two tables, two models:
//!
//! - [`Cwe`]: a weakness category (e.g. `79` / "Cross-Site Scripting").
//! - [`Cve`]: a vulnerability record belonging to exactly one [`Cwe`], with a
//!   free-text description and the embedding derived from it.
//!
//! Embeddings are stored in the `cves.embedding` BLOB column as
//! bincode-encoded `Vec<f32>`; [`encode_embedding`] and [`decode_embedding`]
//! are the only two places that know the wire format.
//!
//! ## Diesel expectations
//!
//! This module assumes the `cwes` and `cves` tables exist (see `crate::schema`
//! and [`crate::db::init_schema`]). Each struct derives the appropriate Diesel
//! traits and is annotated with `#[diesel(table_name = ...)]` and
//! `#[diesel(belongs_to(...))]` where needed.

use diesel::prelude::*;

use crate::error::{Result, VaultError};

/// A weakness category (CWE).
///
/// ### Table
/// - `cwes`
///
/// ### Notes
/// - `id` is the stable external identifier (the numeric part of `CWE-79`),
///   stored as text because it is an opaque key, not a number we do math on.
/// - `name` is unique across all categories but **nullable**: a category
///   auto-created as a placeholder during out-of-order ingestion has no name
///   until an explicit insert or rename supplies one.
#[derive(Queryable, Identifiable, Insertable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::cwes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Cwe {
    /// External identifier, primary key.
    pub id: String,
    /// Unique display name; `None` for placeholder rows.
    pub name: Option<String>,
}

/// A vulnerability record (CVE).
///
/// ### Table
/// - `cves`
///
/// ### Associations
/// - `belongs_to(Cwe)` via `cwe_id`
///
/// ### Invariant
/// `embedding` is always derived from the current `description`; the two are
/// written together in one transaction and never diverge.
#[derive(Queryable, Identifiable, Associations, Insertable, Selectable, Debug, Clone, PartialEq)]
#[diesel(belongs_to(Cwe, foreign_key = cwe_id))]
#[diesel(table_name = crate::schema::cves)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Cve {
    /// External identifier (the `2023-1111` part of `CVE-2023-1111`), primary key.
    pub id: String,
    /// Foreign key to the owning [`Cwe`].
    pub cwe_id: String,
    /// Free-text vulnerability description.
    pub description: String,
    /// Bincode-encoded embedding vector of the description.
    pub embedding: Vec<u8>,
}

impl Cve {
    /// Decode this record's stored embedding back into a vector.
    pub fn embedding_vector(&self) -> Result<Vec<f32>> {
        decode_embedding(&self.embedding)
    }
}

/// Encode an embedding vector into the BLOB representation used by `cves.embedding`.
pub fn encode_embedding(vector: &[f32]) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(vector, bincode::config::standard())
        .map_err(|e| VaultError::Codec(e.to_string()))
}

/// Decode a `cves.embedding` BLOB back into an embedding vector.
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    let (vector, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| VaultError::Codec(e.to_string()))?;
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_codec_roundtrip() {
        let vector = vec![0.25_f32, -1.5, 0.0, 3.125];
        let bytes = encode_embedding(&vector).unwrap();
        let decoded = decode_embedding(&bytes).unwrap();
        assert_eq!(vector, decoded);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode_embedding(&[0xff, 0x01]);
        assert!(matches!(result, Err(VaultError::Codec(_))));
    }
}
