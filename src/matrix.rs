//! Key x model rotation: the failover order a run walks through when the
//! API keeps reporting exhausted quotas.

use crate::config::ApiKey;

/// Model catalog in fallback order. A run starts at the configured entry and
/// walks toward the end; it never wraps back to earlier entries.
pub const MODEL_CATALOG: &[&str] = &[
    "gemini-3-flash-preview",
    "gemini-3-pro-preview",
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-2.5-pro",
];

/// Catalog index a walk starting at `start_model` begins from. Unknown
/// names fall back to the first entry.
pub fn catalog_start_index(start_model: &str) -> usize {
    MODEL_CATALOG
        .iter()
        .position(|model| *model == start_model)
        .unwrap_or(0)
}

/// Current position in the cross product of API keys and models.
///
/// Keys rotate within the current model row; when the row is spent the matrix
/// moves to the next model and the keys start over from the first. Once the
/// last key of the last model is spent the matrix is exhausted for good —
/// [`KeyModelMatrix::current`] returns `None` from then on.
#[derive(Debug, Clone)]
pub struct KeyModelMatrix {
    keys: Vec<ApiKey>,
    models: Vec<String>,
    key_index: usize,
    model_index: usize,
}

impl KeyModelMatrix {
    /// Builds the matrix from the configured keys, walking the catalog from
    /// `start_model` onward. An unknown starting model falls back to the
    /// first catalog entry.
    pub fn new(keys: Vec<ApiKey>, start_model: &str) -> Self {
        let models = MODEL_CATALOG[catalog_start_index(start_model)..]
            .iter()
            .map(|model| model.to_string())
            .collect();
        Self::with_models(keys, models)
    }

    /// Builds the matrix over an explicit model walk order.
    pub fn with_models(keys: Vec<ApiKey>, models: Vec<String>) -> Self {
        Self {
            keys,
            models,
            key_index: 0,
            model_index: 0,
        }
    }

    /// The (key, model) pair attempts currently run against, or `None` once
    /// the matrix is exhausted.
    pub fn current(&self) -> Option<(&ApiKey, &str)> {
        let key = self.keys.get(self.key_index)?;
        let model = self.models.get(self.model_index)?;
        Some((key, model.as_str()))
    }

    /// Moves to the next key within the current model row. Returns `false`
    /// without changing position when the row has no keys left; the caller
    /// must then advance the model.
    pub fn advance_credential(&mut self) -> bool {
        if self.key_index + 1 < self.keys.len() {
            self.key_index += 1;
            true
        } else {
            false
        }
    }

    /// Resets to the first key and moves to the next model row. Returns
    /// `false` when the catalog walk is over, which is terminal: the matrix
    /// stays exhausted and `current()` yields `None` from here on.
    pub fn advance_model(&mut self) -> bool {
        self.key_index = 0;
        self.model_index += 1;
        self.model_index < self.models.len()
    }

    /// 1-based key position for log lines ("key #1").
    pub fn key_number(&self) -> usize {
        self.key_index + 1
    }
}
