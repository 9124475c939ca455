use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One assignment of values to every dimension of a space.
pub type Params = BTreeMap<String, f64>;

/// Prior distribution of a single hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dimension {
    /// `exp(uniform(ln low, ln high))`.
    LogUniform { low: f64, high: f64 },
    /// `round(uniform(low, high) / q) * q`.
    QUniform { low: f64, high: f64, q: f64 },
    /// One of a fixed set of values, uniformly.
    Choice { options: Vec<f64> },
}

impl Dimension {
    pub fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            Dimension::LogUniform { low, high } => rng.random_range(low.ln()..=high.ln()).exp(),
            Dimension::QUniform { low, high, q } => quantize(rng.random_range(*low..=*high), *q),
            Dimension::Choice { options } => options[rng.random_range(0..options.len())],
        }
    }

    /// Bounds of the continuous working space the estimator lives in: log
    /// space for `LogUniform`, linear otherwise. `None` for choices.
    pub(crate) fn working_bounds(&self) -> Option<(f64, f64)> {
        match self {
            Dimension::LogUniform { low, high } => Some((low.ln(), high.ln())),
            Dimension::QUniform { low, high, .. } => Some((*low, *high)),
            Dimension::Choice { .. } => None,
        }
    }

    pub(crate) fn to_working(&self, value: f64) -> f64 {
        match self {
            Dimension::LogUniform { .. } => value.ln(),
            _ => value,
        }
    }

    pub(crate) fn from_working(&self, value: f64) -> f64 {
        match self {
            Dimension::LogUniform { .. } => value.exp(),
            Dimension::QUniform { q, .. } => quantize(value, *q),
            Dimension::Choice { .. } => value,
        }
    }

    fn validate(&self, name: &str) -> anyhow::Result<()> {
        match self {
            Dimension::LogUniform { low, high } => {
                anyhow::ensure!(
                    *low > 0.0 && low < high,
                    "`{name}`: log-uniform bounds must satisfy 0 < low < high"
                );
            }
            Dimension::QUniform { low, high, q } => {
                anyhow::ensure!(low < high, "`{name}`: low must be below high");
                anyhow::ensure!(*q > 0.0, "`{name}`: q must be positive");
            }
            Dimension::Choice { options } => {
                anyhow::ensure!(!options.is_empty(), "`{name}`: no options to choose from");
            }
        }
        Ok(())
    }
}

fn quantize(value: f64, q: f64) -> f64 {
    (value / q).round() * q
}

/// Named dimensions, kept in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub dimensions: Vec<(String, Dimension)>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            dimensions: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, dimension: Dimension) -> Self {
        self.dimensions.push((name.into(), dimension));
        self
    }

    /// The space searched for the LCR-Rot-hop classifier.
    pub fn lcr_rot_hop() -> Self {
        Self::new()
            .with(
                "learning_rate",
                Dimension::LogUniform {
                    low: 0.01,
                    high: 0.1,
                },
            )
            .with(
                "keep_prob",
                Dimension::QUniform {
                    low: 0.45,
                    high: 0.75,
                    q: 0.1,
                },
            )
            .with(
                "momentum",
                Dimension::Choice {
                    options: vec![0.85, 0.9, 0.95],
                },
            )
            .with(
                "l2",
                Dimension::Choice {
                    options: vec![0.0001, 0.001],
                },
            )
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.dimensions.is_empty(), "search space is empty");
        for (name, dimension) in &self.dimensions {
            dimension.validate(name)?;
        }
        Ok(())
    }

    /// Draws every dimension from its prior.
    pub fn sample(&self, rng: &mut StdRng) -> Params {
        self.dimensions
            .iter()
            .map(|(name, dimension)| (name.clone(), dimension.sample(rng)))
            .collect()
    }
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self::lcr_rot_hop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn prior_samples_respect_the_space() {
        let space = SearchSpace::lcr_rot_hop();
        space.validate().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..200 {
            let params = space.sample(&mut rng);
            let lr = params["learning_rate"];
            assert!((0.01..=0.1).contains(&lr));
            let keep = params["keep_prob"];
            assert!([0.4, 0.5, 0.6, 0.7, 0.8]
                .iter()
                .any(|v| (v - keep).abs() < 1e-9));
            assert!([0.85, 0.9, 0.95].contains(&params["momentum"]));
            assert!([0.0001, 0.001].contains(&params["l2"]));
        }
    }

    #[test]
    fn bad_bounds_are_rejected() {
        let space = SearchSpace::new().with("lr", Dimension::LogUniform { low: 0.0, high: 1.0 });
        assert!(space.validate().is_err());
    }
}
