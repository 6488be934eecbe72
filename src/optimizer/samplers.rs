//! Sampling strategies for hyperparameter optimization
//!
//! The TPE sampler models the unit-normalized history with two Gaussian
//! kernel density estimates: `l(x)` over the best `gamma` fraction of
//! trials and `g(x)` over the rest. Candidates are drawn mostly around
//! good trials and the one maximizing `l(x) / g(x)` is proposed.

use super::search_space::{SearchSpace, TrialParams};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Type of sampler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerType {
    /// Independent uniform / log-uniform draws
    Random,
    /// Tree-structured Parzen Estimator
    TPE,
}

/// Tuning knobs of the TPE sampler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpeConfig {
    /// Trials drawn at random before the density model kicks in
    pub n_startup_trials: usize,
    /// Quantile of trials treated as "good"
    pub gamma: f64,
    /// Candidates scored per proposal
    pub n_candidates: usize,
    /// Lower bound on the per-dimension standard deviation
    pub bandwidth_floor: f64,
}

impl Default for TpeConfig {
    fn default() -> Self {
        Self {
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
            bandwidth_floor: 0.01,
        }
    }
}

/// Proposes the next assignment given scored history.
///
/// History scores are oriented so that higher is better; failed trials
/// carry `f64::NEG_INFINITY`.
pub trait Sampler: Send + Sync {
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams;
}

fn seeded_rng(seed: Option<u64>) -> Xoshiro256PlusPlus {
    match seed {
        Some(s) => Xoshiro256PlusPlus::seed_from_u64(s),
        None => Xoshiro256PlusPlus::from_entropy(),
    }
}

/// Random sampler
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    pub fn new(seed: Option<u64>) -> Self {
        Self { rng: seeded_rng(seed) }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, search_space: &SearchSpace, _history: &[(TrialParams, f64)]) -> TrialParams {
        search_space.sample(&mut self.rng)
    }
}

/// Tree-structured Parzen Estimator sampler
#[derive(Debug)]
pub struct TPESampler {
    rng: Xoshiro256PlusPlus,
    config: TpeConfig,
}

impl TPESampler {
    pub fn new(seed: Option<u64>) -> Self {
        Self::with_config(seed, TpeConfig::default())
    }

    pub fn with_config(seed: Option<u64>, config: TpeConfig) -> Self {
        Self {
            rng: seeded_rng(seed),
            config,
        }
    }

    pub fn with_n_startup(mut self, n: usize) -> Self {
        self.config.n_startup_trials = n;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.config.gamma = gamma.clamp(0.01, 0.5);
        self
    }

    /// Split normalized observations into good and bad sets.
    /// Needs at least two observations.
    fn split(&self, points: &[(Vec<f64>, f64)]) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let mut order: Vec<usize> = (0..points.len()).collect();
        order.sort_by(|&a, &b| points[b].1.total_cmp(&points[a].1));

        let n_good = ((points.len() as f64) * self.config.gamma).ceil() as usize;
        let n_good = n_good.clamp(1, points.len() - 1);

        let good = order[..n_good].iter().map(|&i| points[i].0.clone()).collect();
        let bad = order[n_good..].iter().map(|&i| points[i].0.clone()).collect();
        (good, bad)
    }

    /// Scott's rule bandwidth for one dimension
    fn bandwidth(&self, samples: &[f64]) -> f64 {
        if samples.len() < 2 {
            return 1.0;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        var.sqrt().max(self.config.bandwidth_floor) * n.powf(-0.2)
    }

    fn log_density(&self, set: &[Vec<f64>], bandwidths: &[f64], point: &[f64]) -> f64 {
        point
            .iter()
            .enumerate()
            .map(|(dim, &x)| {
                let h = bandwidths[dim];
                let n = set.len() as f64;
                let sum: f64 = set
                    .iter()
                    .map(|obs| {
                        let z = (x - obs[dim]) / h;
                        (-0.5 * z * z).exp()
                    })
                    .sum();
                let density = sum / ((2.0 * std::f64::consts::PI).sqrt() * h * n);
                (density + 1e-300).ln()
            })
            .sum()
    }

    fn draw_candidate(&mut self, good: &[Vec<f64>], bandwidths: &[f64], n_dims: usize) -> Vec<f64> {
        // A quarter of the candidates explore uniformly
        if good.is_empty() || self.rng.gen::<f64>() < 0.25 {
            return (0..n_dims).map(|_| self.rng.gen::<f64>()).collect();
        }
        let center = &good[self.rng.gen_range(0..good.len())];
        (0..n_dims)
            .map(|dim| (center[dim] + bandwidths[dim] * standard_normal(&mut self.rng)).clamp(0.0, 1.0))
            .collect()
    }
}

impl Sampler for TPESampler {
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams {
        let params = search_space.parameters();
        if params.is_empty() || history.len() < self.config.n_startup_trials.max(2) {
            return search_space.sample(&mut self.rng);
        }

        let points: Vec<(Vec<f64>, f64)> = history
            .iter()
            .map(|(trial, score)| {
                let unit = params
                    .iter()
                    .map(|p| trial.get(&p.name).map(|v| p.normalize(v)).unwrap_or(0.5))
                    .collect();
                (unit, *score)
            })
            .collect();

        let (good, bad) = self.split(&points);
        let n_dims = params.len();
        let dim_bandwidths = |set: &[Vec<f64>]| -> Vec<f64> {
            (0..n_dims)
                .map(|d| {
                    let column: Vec<f64> = set.iter().map(|obs| obs[d]).collect();
                    self.bandwidth(&column)
                })
                .collect()
        };
        let good_bw = dim_bandwidths(&good);
        let bad_bw = dim_bandwidths(&bad);

        let mut best: Option<(Vec<f64>, f64)> = None;
        for _ in 0..self.config.n_candidates.max(1) {
            let candidate = self.draw_candidate(&good, &good_bw, n_dims);
            let ratio = self.log_density(&good, &good_bw, &candidate)
                - self.log_density(&bad, &bad_bw, &candidate);
            if best.as_ref().map_or(true, |(_, r)| ratio > *r) {
                best = Some((candidate, ratio));
            }
        }

        match best {
            Some((unit, _)) => params
                .iter()
                .zip(unit)
                .map(|(p, u)| (p.name.clone(), p.denormalize(u)))
                .collect(),
            None => search_space.sample(&mut self.rng),
        }
    }
}

/// Box-Muller draw from N(0, 1)
fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Create a sampler from type
pub fn create_sampler(sampler_type: SamplerType, tpe: &TpeConfig, seed: Option<u64>) -> Box<dyn Sampler> {
    match sampler_type {
        SamplerType::Random => Box::new(RandomSampler::new(seed)),
        SamplerType::TPE => Box::new(TPESampler::with_config(seed, tpe.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::search_space::ParameterValue;

    fn space() -> SearchSpace {
        SearchSpace::new().log_float("lr", 0.001, 1.0).int("depth", 1, 20)
    }

    #[test]
    fn test_random_sampler() {
        let mut sampler = RandomSampler::new(Some(42));
        let params = sampler.sample(&space(), &[]);
        assert!(params.contains_key("lr"));
        assert!(params.contains_key("depth"));
    }

    #[test]
    fn test_tpe_startup_is_random() {
        let mut a = TPESampler::new(Some(7));
        let mut b = RandomSampler::new(Some(7));
        assert_eq!(a.sample(&space(), &[]), b.sample(&space(), &[]));
    }

    #[test]
    fn test_tpe_concentrates_on_good_region() {
        // Score peaks at depth = 15
        let objective = |p: &TrialParams| -> f64 {
            let d = p["depth"].as_float().unwrap();
            -(d - 15.0).powi(2)
        };
        let space = SearchSpace::new().int("depth", 1, 20);
        let mut sampler = TPESampler::new(Some(3)).with_n_startup(8);
        let mut history: Vec<(TrialParams, f64)> = Vec::new();
        for _ in 0..40 {
            let p = sampler.sample(&space, &history);
            let s = objective(&p);
            history.push((p, s));
        }
        let late: Vec<f64> = history[20..]
            .iter()
            .map(|(p, _)| p["depth"].as_float().unwrap())
            .collect();
        let near = late.iter().filter(|&&d| (d - 15.0).abs() <= 3.0).count();
        assert!(near >= 8, "late samples: {:?}", late);
    }

    #[test]
    fn test_tpe_handles_failed_trials() {
        let space = space();
        let mut sampler = TPESampler::new(Some(1)).with_n_startup(2);
        let mut history = Vec::new();
        for i in 0..6 {
            let p = sampler.sample(&space, &history);
            let score = if i % 2 == 0 { f64::NEG_INFINITY } else { 0.5 };
            history.push((p, score));
        }
        let next = sampler.sample(&space, &history);
        let lr = match next["lr"] {
            ParameterValue::Float(v) => v,
            other => panic!("unexpected {:?}", other),
        };
        assert!((0.001..=1.0).contains(&lr));
    }

    #[test]
    fn test_empty_space() {
        let mut sampler = TPESampler::new(Some(1));
        let history = vec![(TrialParams::new(), 1.0); 20];
        assert!(sampler.sample(&SearchSpace::new(), &history).is_empty());
    }
}
