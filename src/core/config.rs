use serde::{Deserialize, Serialize};
use std::path::Path;

/// Similarity thresholds used when re-locating a target inside a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityThresholds {
    /// Used by the `random` and aspect workflows.
    #[serde(default = "default_strict")]
    pub strict: f64,
    /// Used by the noun and adjective/adverb workflows.
    #[serde(default = "default_loose")]
    pub loose: f64,
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            strict: default_strict(),
            loose: default_loose(),
        }
    }
}

/// What the batch runner does with a record that fails to augment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Stop the whole run on the first failing record.
    #[default]
    Halt,
    /// Log the record, keep its original triple and move on.
    Skip,
}

/// Tunables of the augmentation engine.
///
/// Every field has a default, so a JSON file only needs the values it overrides:
///
/// ```json
/// { "similarity": { "loose": 0.8 }, "seed": 7 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentConfig {
    #[serde(default)]
    pub similarity: SimilarityThresholds,
    /// Share of eligible sub-word tokens the `random` policy may send to the model.
    #[serde(default = "default_mask_probability")]
    pub mask_probability: f64,
    /// Probability that a visited token is predicted by the model (`random` policy).
    #[serde(default = "default_predict_share")]
    pub predict_share: f64,
    /// Probability that a visited token is kept as is (`random` policy).
    /// The remainder is replaced by a random vocabulary token.
    #[serde(default = "default_keep_share")]
    pub keep_share: f64,
    /// Share of adjectives and adverbs substituted per sentence.
    #[serde(default = "default_adj_adv_fraction")]
    pub adj_adv_fraction: f64,
    /// Seed of the sampling RNG, reset before every batch run.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub error_mode: ErrorMode,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            similarity: SimilarityThresholds::default(),
            mask_probability: default_mask_probability(),
            predict_share: default_predict_share(),
            keep_share: default_keep_share(),
            adj_adv_fraction: default_adj_adv_fraction(),
            seed: default_seed(),
            error_mode: ErrorMode::default(),
        }
    }
}

impl AugmentConfig {
    /// Reads a JSON configuration file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::Error::msg(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::Error::msg(format!("Failed to parse augment config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(anyhow::anyhow!("`{name}` must lie in [0, 1], got {v}"))
            }
        };
        unit("similarity.strict", self.similarity.strict)?;
        unit("similarity.loose", self.similarity.loose)?;
        unit("mask_probability", self.mask_probability)?;
        unit("predict_share", self.predict_share)?;
        unit("keep_share", self.keep_share)?;
        unit("adj_adv_fraction", self.adj_adv_fraction)?;
        if self.predict_share + self.keep_share > 1.0 {
            anyhow::bail!(
                "`predict_share` + `keep_share` must not exceed 1, got {}",
                self.predict_share + self.keep_share
            );
        }
        Ok(())
    }
}

fn default_strict() -> f64 {
    0.95
}

fn default_loose() -> f64 {
    0.70
}

fn default_mask_probability() -> f64 {
    0.15
}

fn default_predict_share() -> f64 {
    0.8
}

fn default_keep_share() -> f64 {
    0.1
}

fn default_adj_adv_fraction() -> f64 {
    0.15
}

fn default_seed() -> u64 {
    546297
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AugmentConfig =
            serde_json::from_str(r#"{ "similarity": { "loose": 0.8 }, "error_mode": "skip" }"#)
                .unwrap();
        assert_eq!(config.similarity.loose, 0.8);
        assert_eq!(config.similarity.strict, 0.95);
        assert_eq!(config.seed, 546297);
        assert_eq!(config.error_mode, ErrorMode::Skip);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn shares_above_one_are_rejected() {
        let config = AugmentConfig {
            predict_share: 0.95,
            keep_share: 0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
