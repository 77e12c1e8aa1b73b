//! Complexity heuristic: single-shot answer or multi-agent debate.

use parley_config::ComplexityConfig;

#[derive(Debug, Clone)]
pub struct ComplexityClassifier {
    length_threshold: usize,
    keywords: Vec<String>,
}

impl ComplexityClassifier {
    pub fn new(length_threshold: usize, keywords: Vec<String>) -> Self {
        Self {
            length_threshold,
            keywords: keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &ComplexityConfig) -> Self {
        Self::new(config.length_threshold, config.keywords.clone())
    }

    /// True when `text` is longer than the threshold (in characters) or
    /// contains a trigger keyword.
    pub fn is_complex(&self, text: &str) -> bool {
        if text.chars().count() > self.length_threshold {
            return true;
        }
        let lowered = text.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

impl Default for ComplexityClassifier {
    fn default() -> Self {
        Self::from_config(&ComplexityConfig::default())
    }
}
