//! # Embedding provider
//!
//! Everything that turns vulnerability descriptions into fixed-length
//! vectors. The rest of the crate only sees the [`EmbeddingProvider`] trait;
//! the model behind it is constructed once at process start and injected into
//! [`crate::db::Database`].
//!
//! The production implementation is [`SentenceEmbedder`]: an E5 sentence
//! embedding model run with Candle (pure Rust ML framework). It tokenizes the
//! input, mean-pools the token embeddings under the attention mask, and
//! L2-normalizes the result into a 1024-d vector.
//!
//! ## Model layout & discovery
//! Weights come either from the Hugging Face Hub ([`SentenceEmbedder::from_hub`])
//! or from a local directory containing `config.json`, `tokenizer.json`, and
//! `model.safetensors` ([`SentenceEmbedder::from_dir`], see
//! [`crate::resolve_model_dir`] for the lookup order).

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::error::{Result, VaultError};

/// Hub identifier of the default sentence embedding model.
pub const DEFAULT_MODEL_ID: &str = "intfloat/e5-large-v2";

/// Maps text to a fixed-length real vector.
///
/// Implementations must be deterministic for a given input, report a stable
/// [`dimension`](Self::dimension), and fail on blank input rather than return
/// a degenerate vector.
pub trait EmbeddingProvider {
    /// Length of every vector produced by [`embed`](Self::embed).
    fn dimension(&self) -> usize;

    /// Embed `text` into a vector of exactly [`dimension`](Self::dimension) floats.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Sentence embeddings model using Candle (pure Rust).
pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
}

impl SentenceEmbedder {
    /// Load the default model from the Hugging Face Hub.
    ///
    /// Downloads (or reuses the hub cache for) `config.json`, `tokenizer.json`
    /// and `model.safetensors`, then builds the model on CPU.
    ///
    /// # Errors
    /// Network failures, a malformed config, or unloadable weights.
    pub fn from_hub() -> Result<Self> {
        let repo = Repo::with_revision(
            DEFAULT_MODEL_ID.to_string(),
            RepoType::Model,
            "main".to_string(),
        );
        let api = Api::new().map_err(|e| VaultError::Provider(e.to_string()))?;
        let api_repo = api.repo(repo);

        let config_filename = api_repo
            .get("config.json")
            .map_err(|e| VaultError::Provider(e.to_string()))?;
        let tokenizer_filename = api_repo
            .get("tokenizer.json")
            .map_err(|e| VaultError::Provider(e.to_string()))?;
        let weights_filename = api_repo
            .get("model.safetensors")
            .map_err(|e| VaultError::Provider(e.to_string()))?;

        Self::load_files(&config_filename, &tokenizer_filename, &weights_filename)
    }

    /// Load the model from a local directory.
    ///
    /// The directory must contain `config.json`, `tokenizer.json`, and
    /// `model.safetensors` — the same three files [`from_hub`](Self::from_hub)
    /// fetches.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        Self::load_files(
            &dir.join("config.json"),
            &dir.join("tokenizer.json"),
            &dir.join("model.safetensors"),
        )
    }

    fn load_files(config: &PathBuf, tokenizer: &PathBuf, weights: &PathBuf) -> Result<Self> {
        let device = Device::Cpu;

        let config = std::fs::read_to_string(config)?;
        let config: Config =
            serde_json::from_str(&config).map_err(|e| VaultError::Provider(e.to_string()))?;

        let tokenizer = Tokenizer::from_file(tokenizer)
            .map_err(|e| VaultError::Provider(format!("Failed to load tokenizer: {e}")))?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DTYPE, &device)? };
        let dimension = config.hidden_size;
        let model = BertModel::load(vb, &config)?;

        Ok(Self {
            model,
            tokenizer,
            device,
            dimension,
        })
    }

    /// Encode text into an embedding.
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        // Tokenize with automatic truncation at the model's max length
        let tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| VaultError::Provider(format!("Tokenization error: {e}")))?;

        let token_ids = Tensor::new(tokens.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(tokens.get_type_ids(), &self.device)?.unsqueeze(0)?;

        let output = self.model.forward(&token_ids, &token_type_ids, None)?;

        let embedding = self.mean_pooling(&output, tokens.get_attention_mask())?;
        let embedding = self.normalize(&embedding)?;

        Ok(embedding.to_vec1::<f32>()?)
    }

    /// Mean pooling over token embeddings, considering attention mask.
    fn mean_pooling(&self, embeddings: &Tensor, attention_mask: &[u32]) -> Result<Tensor> {
        // embeddings: [1, seq_len, hidden]; mask must broadcast as [1, seq_len, 1]
        let mask = Tensor::new(attention_mask, &self.device)?
            .to_dtype(DType::F32)?
            .unsqueeze(0)?
            .unsqueeze(2)?;

        let masked = embeddings.broadcast_mul(&mask)?;
        let sum = masked.sum(1)?;
        let count = mask.sum(1)?.clamp(1f32, f32::INFINITY)?;
        let mean = sum.broadcast_div(&count)?;

        Ok(mean.squeeze(0)?)
    }

    /// L2 normalize the embedding vector.
    fn normalize(&self, tensor: &Tensor) -> Result<Tensor> {
        let norm = tensor.sqr()?.sum_all()?.sqrt()?;
        Ok(tensor.broadcast_div(&norm)?)
    }
}

impl EmbeddingProvider for SentenceEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(VaultError::Provider(
                "refusing to embed empty text".to_string(),
            ));
        }
        self.encode(text)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic in-process providers so tests never need model weights.

    use super::*;
    use std::hash::{Hash, Hasher};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Hashed bag-of-words embedder: each lowercased token bumps one bucket,
    /// the result is L2-normalized. Identical text maps to identical vectors
    /// and near-duplicate text to nearby ones, which is all the search tests
    /// need.
    pub struct HashEmbedder {
        dimension: usize,
    }

    impl HashEmbedder {
        pub fn new(dimension: usize) -> Self {
            Self { dimension }
        }
    }

    impl EmbeddingProvider for HashEmbedder {
        fn dimension(&self) -> usize {
            self.dimension
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.trim().is_empty() {
                return Err(VaultError::Provider(
                    "refusing to embed empty text".to_string(),
                ));
            }
            let mut vector = vec![0f32; self.dimension];
            for token in text
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
            {
                let mut hasher = std::hash::DefaultHasher::new();
                token.hash(&mut hasher);
                vector[(hasher.finish() as usize) % self.dimension] += 1.0;
            }
            let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut vector {
                    *v /= norm;
                }
            }
            Ok(vector)
        }
    }

    /// Wraps a [`HashEmbedder`] behind a switch the test can flip to simulate
    /// a provider outage mid-run.
    pub struct FlakyEmbedder {
        inner: HashEmbedder,
        pub fail: Arc<AtomicBool>,
    }

    impl FlakyEmbedder {
        pub fn new(dimension: usize, fail: Arc<AtomicBool>) -> Self {
            Self {
                inner: HashEmbedder::new(dimension),
                fail,
            }
        }
    }

    impl EmbeddingProvider for FlakyEmbedder {
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(VaultError::Provider("model exploded".to_string()));
            }
            self.inner.embed(text)
        }
    }

    #[test]
    fn test_hash_embedder_deterministic() {
        let embedder = HashEmbedder::new(16);
        let a = embedder.embed("stack buffer overflow in parser").unwrap();
        let b = embedder.embed("stack buffer overflow in parser").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_hash_embedder_rejects_blank_input() {
        let embedder = HashEmbedder::new(16);
        assert!(matches!(
            embedder.embed("   "),
            Err(VaultError::Provider(_))
        ));
    }
}
