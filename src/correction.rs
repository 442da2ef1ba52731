//! Spelling correction used by the resolver's fallback stages.
//!
//! Two tiers are exposed: a cheap `quick_correct` tried first and a
//! `full_correct` tried only when the quick tier did not lead to a location.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{AppError, AppResult};

/// String-to-string spelling correction.
pub trait Corrector: Send + Sync {
    /// Fast, low-effort correction.
    fn quick_correct(&self, text: &str) -> String;
    /// Slower, more thorough correction.
    fn full_correct(&self, text: &str) -> String;
}

impl<T: Corrector + ?Sized> Corrector for Box<T> {
    fn quick_correct(&self, text: &str) -> String {
        (**self).quick_correct(text)
    }

    fn full_correct(&self, text: &str) -> String {
        (**self).full_correct(text)
    }
}

/// Returns every input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCorrection;

impl Corrector for NoCorrection {
    fn quick_correct(&self, text: &str) -> String {
        text.to_string()
    }

    fn full_correct(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Correction from a fixed table of known misspellings.
///
/// The quick tier only replaces the whole phrase; the full tier also
/// replaces individual words.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: HashMap<String, String>,
}

impl Lexicon {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into().to_lowercase(), v.into().to_lowercase()))
                .collect(),
        }
    }

    /// Load a JSON object of `"misspelling": "correction"` pairs.
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| AppError::Config {
            message: format!("Cannot read corrections file {}: {}", path.display(), e),
        })?;
        let entries: HashMap<String, String> =
            serde_json::from_str(&raw).map_err(|e| AppError::Config {
                message: format!("Invalid corrections file {}: {}", path.display(), e),
            })?;
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn report(original: &str, corrected: String) -> String {
        if corrected != original {
            debug!(original = %original, corrected = %corrected, "Spelling corrected");
        }
        corrected
    }
}

impl Corrector for Lexicon {
    fn quick_correct(&self, text: &str) -> String {
        let corrected = self
            .entries
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string());
        Self::report(text, corrected)
    }

    fn full_correct(&self, text: &str) -> String {
        if let Some(phrase) = self.entries.get(text) {
            return Self::report(text, phrase.clone());
        }
        let corrected = text
            .split_whitespace()
            .map(|word| self.entries.get(word).map(String::as_str).unwrap_or(word))
            .collect::<Vec<_>>()
            .join(" ");
        Self::report(text, corrected)
    }
}
