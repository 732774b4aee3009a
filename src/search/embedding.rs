//! Embedding providers
//!
//! The engine only consumes vectors through [`EmbeddingProvider`]; any model
//! can sit behind it. Two providers ship with the crate:
//!
//! - [`HarmonicEmbedder`]: Harmonic Token Projection (HTP), a deterministic,
//!   training-free embedding. Each token is read as a base-2^16 integer `N`,
//!   reduced modulo a set of coprime moduli `m_i`, and projected onto the unit
//!   circle as `[sin(2πr_i/m_i), cos(2πr_i/m_i)]`. Token vectors are mean
//!   pooled and L2 normalized. See https://arxiv.org/html/2511.20665
//! - [`DisabledProvider`]: always unavailable.

use std::f64::consts::PI;

use crate::core::config::{EmbeddingConfig, ProviderKind};

/// Default embedding dimension (2 * number of moduli).
pub const DEFAULT_DIMENSION: usize = 512;

/// Maximum token length (Unicode code points)
const MAX_TOKEN_LENGTH: usize = 64;

/// Text-to-vector capability consumed by the indexer and search engine.
///
/// `None` means the provider could not produce a vector for that input
/// (model missing, unsupported language, empty text). Callers treat it as a
/// skipped chunk or an empty result, never as a fault.
pub trait EmbeddingProvider: Send + Sync {
    fn is_available(&self) -> bool;

    /// Length of the vectors this provider produces.
    fn dimension(&self) -> usize;

    fn generate_vector(&self, text: &str) -> Option<Vec<f64>>;

    /// Order-preserving, one entry per input.
    fn generate_vectors(&self, texts: &[&str]) -> Vec<Option<Vec<f64>>> {
        texts.iter().map(|t| self.generate_vector(t)).collect()
    }
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Box<P> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn generate_vector(&self, text: &str) -> Option<Vec<f64>> {
        (**self).generate_vector(text)
    }

    fn generate_vectors(&self, texts: &[&str]) -> Vec<Option<Vec<f64>>> {
        (**self).generate_vectors(texts)
    }
}

/// Builds the provider selected in configuration.
pub fn provider_from_config(config: &EmbeddingConfig) -> Box<dyn EmbeddingProvider> {
    match config.provider {
        ProviderKind::Harmonic => Box::new(HarmonicEmbedder::with_dimension(config.dimension)),
        ProviderKind::Disabled => Box::new(DisabledProvider::new(config.dimension)),
    }
}

/// HTP embedding model.
pub struct HarmonicEmbedder {
    moduli: Vec<u64>,
}

impl HarmonicEmbedder {
    pub fn new() -> Self {
        Self::with_dimension(DEFAULT_DIMENSION)
    }

    /// `dimension` is rounded down to an even number (two components per modulus).
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            moduli: first_primes((dimension / 2).max(1)),
        }
    }

    /// Embed a single token: harmonic projection per modulus.
    fn embed_token(&self, token: &str) -> Vec<f64> {
        let n = token_to_integer(token);

        let mut embedding = Vec::with_capacity(self.moduli.len() * 2);
        for &m in &self.moduli {
            let r = n % m;
            let theta = 2.0 * PI * (r as f64) / (m as f64);
            embedding.push(theta.sin());
            embedding.push(theta.cos());
        }
        embedding
    }
}

impl Default for HarmonicEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for HarmonicEmbedder {
    fn is_available(&self) -> bool {
        true
    }

    fn dimension(&self) -> usize {
        self.moduli.len() * 2
    }

    /// Returns `None` for text with no tokens.
    fn generate_vector(&self, text: &str) -> Option<Vec<f64>> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return None;
        }

        let mut sum = vec![0.0f64; self.dimension()];
        for token in &tokens {
            for (acc, val) in sum.iter_mut().zip(self.embed_token(token)) {
                *acc += val;
            }
        }

        // Mean pooling, then L2 normalize
        let count = tokens.len() as f64;
        sum.iter_mut().for_each(|v| *v /= count);
        let norm = sum.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            sum.iter_mut().for_each(|v| *v /= norm);
        }
        Some(sum)
    }
}

/// Provider that never produces vectors.
pub struct DisabledProvider {
    dimension: usize,
}

impl DisabledProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl EmbeddingProvider for DisabledProvider {
    fn is_available(&self) -> bool {
        false
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn generate_vector(&self, _text: &str) -> Option<Vec<f64>> {
        None
    }
}

/// N = Σ u_j * B^(L-j) where B = 2^16, wrapping on overflow.
fn token_to_integer(token: &str) -> u64 {
    token
        .chars()
        .take(MAX_TOKEN_LENGTH)
        .fold(0u64, |n, c| n.wrapping_mul(65536).wrapping_add(c as u64))
}

/// First `count` primes; pairwise coprime by construction.
fn first_primes(count: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Cosine similarity: `dot(a, b) / (|a| * |b|)`.
///
/// Returns 0.0 for empty or mismatched-length vectors and when either norm
/// is zero, so the result is never NaN.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0, 0.0, 0.0), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator > 0.0 {
        dot / denominator
    } else {
        0.0
    }
}
