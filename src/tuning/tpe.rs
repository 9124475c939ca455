//! Tree-structured Parzen estimator.
//!
//! After a warm-up of prior samples, completed trials are split at the `gamma`
//! loss quantile into a good and a bad set. Each dimension gets one density
//! per set; candidates are drawn from the good density and the one with the
//! highest `l(x) / g(x)` is proposed. Dimensions are treated independently.

use super::space::{Dimension, Params, SearchSpace};
use super::trials::Trials;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Normal;
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tpe {
    /// Trials drawn from the prior before the estimator takes over.
    pub n_startup: usize,
    /// Share of completed trials treated as good.
    pub gamma: f64,
    /// Candidates scored per dimension and proposal.
    pub n_candidates: usize,
}

impl Default for Tpe {
    fn default() -> Self {
        Self {
            n_startup: 20,
            gamma: 0.25,
            n_candidates: 24,
        }
    }
}

impl Tpe {
    /// Proposes the next point to evaluate.
    pub fn suggest(
        &self,
        space: &SearchSpace,
        trials: &Trials,
        rng: &mut StdRng,
    ) -> anyhow::Result<Params> {
        let mut completed: Vec<(&Params, f64)> = trials.completed().collect();
        if completed.len() < self.n_startup.max(1) {
            return Ok(space.sample(rng));
        }

        completed.sort_by(|a, b| a.1.total_cmp(&b.1));
        let n_good = ((self.gamma * completed.len() as f64).ceil() as usize).max(1);
        let (good, bad) = completed.split_at(n_good.min(completed.len()));
        tracing::debug!(good = good.len(), bad = bad.len(), "tpe split");

        let mut params = Params::new();
        for (name, dimension) in &space.dimensions {
            let observed = |set: &[(&Params, f64)]| -> Vec<f64> {
                set.iter().filter_map(|(p, _)| p.get(name).copied()).collect()
            };
            let value = match dimension {
                Dimension::Choice { options } => {
                    let l = Categorical::fit(options, &observed(good));
                    let g = Categorical::fit(options, &observed(bad));
                    let best = self.best_candidate(rng, |rng| l.sample(rng), |k| {
                        l.log_pdf(k) - g.log_pdf(k)
                    })?;
                    options[best]
                }
                _ => {
                    let (low, high) = dimension
                        .working_bounds()
                        .ok_or_else(|| anyhow::anyhow!("`{name}` has no continuous bounds"))?;
                    let working = |set: &[(&Params, f64)]| -> Vec<f64> {
                        observed(set).into_iter().map(|v| dimension.to_working(v)).collect()
                    };
                    let l = Parzen::fit(&working(good), low, high);
                    let g = Parzen::fit(&working(bad), low, high);
                    let best = self.best_candidate(rng, |rng| l.sample(rng), |x| {
                        l.log_pdf(x) - g.log_pdf(x)
                    })?;
                    dimension.from_working(best)
                }
            };
            params.insert(name.clone(), value);
        }
        Ok(params)
    }

    fn best_candidate<T: Copy>(
        &self,
        rng: &mut StdRng,
        mut draw: impl FnMut(&mut StdRng) -> anyhow::Result<T>,
        score: impl Fn(T) -> f64,
    ) -> anyhow::Result<T> {
        let mut best = draw(rng)?;
        let mut best_score = score(best);
        for _ in 1..self.n_candidates.max(1) {
            let candidate = draw(rng)?;
            let s = score(candidate);
            if s > best_score {
                best = candidate;
                best_score = s;
            }
        }
        Ok(best)
    }
}

/// Mixture of Gaussians centred on the observations plus one wide prior
/// component, truncated to `[low, high]`.
#[derive(Debug, Clone)]
struct Parzen {
    mus: Vec<f64>,
    sigmas: Vec<f64>,
    low: f64,
    high: f64,
}

impl Parzen {
    fn fit(observations: &[f64], low: f64, high: f64) -> Self {
        let span = high - low;
        let prior_mu = low + span / 2.0;

        // (centre, is_prior), sorted so neighbours are adjacent
        let mut centres: Vec<(f64, bool)> = observations.iter().map(|&x| (x, false)).collect();
        centres.push((prior_mu, true));
        centres.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mus: Vec<f64> = centres.iter().map(|c| c.0).collect();

        let min_sigma = span / (100.0f64).min(1.0 + mus.len() as f64);
        let sigmas = (0..mus.len())
            .map(|i| {
                if centres[i].1 {
                    return span;
                }
                let left = if i > 0 { mus[i] - mus[i - 1] } else { mus[i] - low };
                let right = if i + 1 < mus.len() {
                    mus[i + 1] - mus[i]
                } else {
                    high - mus[i]
                };
                left.max(right).clamp(min_sigma, span)
            })
            .collect();

        Self {
            mus,
            sigmas,
            low,
            high,
        }
    }

    fn sample(&self, rng: &mut StdRng) -> anyhow::Result<f64> {
        let component = rng.random_range(0..self.mus.len());
        let normal = Normal::new(self.mus[component], self.sigmas[component])?;
        for _ in 0..32 {
            let x = normal.sample(rng);
            if (self.low..=self.high).contains(&x) {
                return Ok(x);
            }
        }
        Ok(self.mus[component].clamp(self.low, self.high))
    }

    fn log_pdf(&self, x: f64) -> f64 {
        let density: f64 = self
            .mus
            .iter()
            .zip(&self.sigmas)
            .map(|(mu, sigma)| {
                let z = (x - mu) / sigma;
                (-0.5 * z * z).exp() / (sigma * (2.0 * PI).sqrt())
            })
            .sum::<f64>()
            / self.mus.len() as f64;
        density.max(f64::MIN_POSITIVE).ln()
    }
}

/// Option frequencies smoothed with one pseudo-count each.
#[derive(Debug, Clone)]
struct Categorical {
    weights: Vec<f64>,
}

impl Categorical {
    fn fit(options: &[f64], observations: &[f64]) -> Self {
        let mut weights = vec![1.0; options.len()];
        for value in observations {
            if let Some(k) = options.iter().position(|o| (o - value).abs() < 1e-12) {
                weights[k] += 1.0;
            }
        }
        Self { weights }
    }

    fn sample(&self, rng: &mut StdRng) -> anyhow::Result<usize> {
        Ok(WeightedIndex::new(&self.weights)?.sample(rng))
    }

    fn log_pdf(&self, k: usize) -> f64 {
        (self.weights[k] / self.weights.iter().sum::<f64>()).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn warm_up_samples_the_prior() {
        let space = SearchSpace::lcr_rot_hop();
        let tpe = Tpe::default();
        let mut rng = StdRng::seed_from_u64(7);
        let params = tpe.suggest(&space, &Trials::new(), &mut rng).unwrap();
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn proposals_concentrate_near_good_trials() {
        // loss is lowest for learning rates near 0.02
        let space = SearchSpace::new().with(
            "learning_rate",
            Dimension::LogUniform {
                low: 0.01,
                high: 0.1,
            },
        );
        let loss = |lr: f64| (lr.ln() - 0.02f64.ln()).abs();
        let mut rng = StdRng::seed_from_u64(546297);
        let mut trials = Trials::new();
        let tpe = Tpe {
            n_startup: 10,
            ..Default::default()
        };
        for _ in 0..40 {
            let params = tpe.suggest(&space, &trials, &mut rng).unwrap();
            let l = loss(params["learning_rate"]);
            trials.push(params, Some(l));
        }
        let late: Vec<f64> = trials.trials[30..]
            .iter()
            .map(|t| t.params["learning_rate"])
            .collect();
        let near = late.iter().filter(|lr| (0.01..0.045).contains(*lr)).count();
        assert!(near >= 5, "late proposals: {late:?}");
    }

    #[test]
    fn categorical_favours_frequent_good_options() {
        let c = Categorical::fit(&[0.85, 0.9, 0.95], &[0.9, 0.9, 0.9]);
        assert!(c.log_pdf(1) > c.log_pdf(0));
        assert_eq!(c.weights, vec![1.0, 4.0, 1.0]);
    }

    #[test]
    fn parzen_stays_in_bounds() {
        let p = Parzen::fit(&[0.1, 0.15], 0.0, 1.0);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let x = p.sample(&mut rng).unwrap();
            assert!((0.0..=1.0).contains(&x));
        }
        assert!(p.log_pdf(0.12) > p.log_pdf(0.9));
    }
}
