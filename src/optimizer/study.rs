//! Trials and studies
//!
//! A [`Study`] is the ordered record of every trial run for one model
//! family on one dataset. Failed trials are kept with the sentinel worst
//! score so the history always has one entry per trial.

use super::config::OptimizeDirection;
use super::search_space::TrialParams;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of evaluating one sampled assignment
#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    Scored(f64),
    Failed(String),
}

/// A scored trial. Never mutated once added to a study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub number: usize,
    pub params: TrialParams,
    /// Cross-validated score, or the direction's worst value on failure
    #[serde(with = "score_serde")]
    pub value: f64,
    /// Failure message when evaluation raised
    pub error: Option<String>,
    pub duration_secs: f64,
}

impl Trial {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// One row of the optimization history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub trial: usize,
    #[serde(with = "score_serde")]
    pub score: f64,
    pub params: TrialParams,
}

/// Study containing all trials of one search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub trials: Vec<Trial>,
    pub best_trial_idx: Option<usize>,
    pub direction: OptimizeDirection,
    pub total_duration_secs: f64,
}

impl Study {
    pub fn new(direction: OptimizeDirection) -> Self {
        Self {
            trials: Vec::new(),
            best_trial_idx: None,
            direction,
            total_duration_secs: 0.0,
        }
    }

    /// Record a trial, folding a failure into the sentinel score
    pub fn add_trial(&mut self, params: TrialParams, outcome: TrialOutcome, duration_secs: f64) -> &Trial {
        let number = self.trials.len();
        let (value, error) = match outcome {
            TrialOutcome::Scored(v) => (v, None),
            TrialOutcome::Failed(e) => (self.direction.worst(), Some(e)),
        };

        let is_better = error.is_none()
            && match self.best_trial_idx {
                None => true,
                Some(best) => self.direction.is_better(value, self.trials[best].value),
            };
        if is_better {
            self.best_trial_idx = Some(number);
        }

        self.total_duration_secs += duration_secs;
        self.trials.push(Trial {
            number,
            params,
            value,
            error,
            duration_secs,
        });
        &self.trials[number]
    }

    pub fn best_trial(&self) -> Option<&Trial> {
        self.best_trial_idx.map(|idx| &self.trials[idx])
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().map(|t| t.value)
    }

    pub fn best_params(&self) -> Option<&TrialParams> {
        self.best_trial().map(|t| &t.params)
    }

    pub fn n_trials(&self) -> usize {
        self.trials.len()
    }

    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| t.failed()).count()
    }

    /// Scores oriented so that higher is better, as samplers expect
    pub fn sampler_history(&self) -> Vec<(TrialParams, f64)> {
        self.trials
            .iter()
            .map(|t| (t.params.clone(), self.direction.oriented(t.value)))
            .collect()
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        self.trials
            .iter()
            .map(|t| HistoryRecord {
                trial: t.number,
                score: t.value,
                params: t.params.clone(),
            })
            .collect()
    }

    /// Save the study as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// JSON has no infinities; non-finite scores travel as strings
pub(crate) mod score_serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_f64(*value)
        } else if value.is_nan() {
            s.serialize_str("nan")
        } else if *value > 0.0 {
            s.serialize_str("inf")
        } else {
            s.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(t) => match t.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(D::Error::custom(format!("invalid score '{}'", other))),
            },
        }
    }
}
