use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use thiserror::Error;

use crate::models::Profile;

/// Probability returned whenever no usable model exists
pub const NEUTRAL_PROBABILITY: f64 = 0.5;

/// Fraction of rows held out for the accuracy check
pub const TEST_FRACTION: f64 = 0.2;

/// Fixed shuffle seed so the same profiles always give the same split
const SPLIT_SEED: u64 = 42;

const EPOCHS: usize = 1_000;
const LEARNING_RATE: f64 = 0.1;
const L2_PENALTY: f64 = 1e-3;

/// Reasons a training run produces no model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrainingError {
    #[error("no profiles to train on")]
    EmptyDataset,

    #[error("need at least 2 rows for a train/test split, got {0}")]
    InsufficientRows(usize),

    #[error("training split contains a single class")]
    SingleClass,
}

/// Outcome of a successful training run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub version: u64,
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Held-out accuracy over donor rows; `None` when the test split has none
    pub accuracy: Option<f64>,
}

/// Immutable trained classifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainedModel {
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    pub accuracy: Option<f64>,
    weights: [f64; 2],
    bias: f64,
    mean: [f64; 2],
    scale: [f64; 2],
}

impl TrainedModel {
    /// Probability of a successful pairing, in [0, 1]
    pub fn probability(&self, donor_age: f64, recipient_urgency: f64) -> f64 {
        let p = self.raw_probability([donor_age, recipient_urgency]);
        if p.is_finite() {
            p.clamp(0.0, 1.0)
        } else {
            tracing::debug!(
                "Non-finite prediction for age={}, urgency={}, using neutral probability",
                donor_age,
                recipient_urgency
            );
            NEUTRAL_PROBABILITY
        }
    }

    fn raw_probability(&self, features: [f64; 2]) -> f64 {
        let z = self.standardize(features);
        sigmoid(self.weights[0] * z[0] + self.weights[1] * z[1] + self.bias)
    }

    fn standardize(&self, features: [f64; 2]) -> [f64; 2] {
        [
            (features[0] - self.mean[0]) / self.scale[0],
            (features[1] - self.mean[1]) / self.scale[1],
        ]
    }
}

/// One training example
#[derive(Debug, Clone, Copy)]
struct Row {
    features: [f64; 2],
    label: bool,
    /// Only donor rows count toward held-out accuracy
    evaluate: bool,
}

/// Heuristic outcome label
///
/// Donors of group O, or donors without a recorded comorbidity, count as
/// successful. Recipient rows are always labelled 0.
pub fn heuristic_label(profile: &Profile) -> bool {
    match profile {
        Profile::Donor(d) => d.blood_type.is_group_o() || !d.has_comorbidity(),
        Profile::Recipient(_) => false,
    }
}

fn to_row(profile: &Profile) -> Row {
    match profile {
        // Donors carry no urgency score
        Profile::Donor(d) => Row {
            features: [d.age as f64, 0.0],
            label: heuristic_label(profile),
            evaluate: true,
        },
        Profile::Recipient(r) => Row {
            features: [r.age as f64, r.urgency_or_zero() as f64],
            label: false,
            evaluate: false,
        },
    }
}

/// Success-probability estimator: one exclusive trainer, many concurrent readers
///
/// A logistic-regression classifier over (donor age, recipient urgency)
/// trained on heuristic outcome labels. The trained model is an immutable,
/// versioned artifact: retraining builds a new one and swaps it in whole, so
/// readers see either the previous model or the new one.
#[derive(Debug, Default)]
pub struct SuccessEstimator {
    training: Mutex<()>,
    model: RwLock<Option<Arc<TrainedModel>>>,
}

impl SuccessEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_trained(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Current model, if any
    pub fn snapshot(&self) -> Option<Arc<TrainedModel>> {
        self.model
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Train on the given profiles and install the result
    ///
    /// A failed run leaves the current model (or the untrained state) in place.
    pub fn train(&self, profiles: &[Profile]) -> Result<TrainingReport, TrainingError> {
        let _guard = self
            .training
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let version = self.snapshot().map(|m| m.version + 1).unwrap_or(1);
        let (model, report) = fit(profiles, version)?;

        *self
            .model
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(model));

        Ok(report)
    }

    /// Probability of success for a pairing; neutral when untrained
    pub fn predict(&self, donor_age: u32, recipient_urgency: u8) -> f64 {
        match self.snapshot() {
            Some(model) => model.probability(donor_age as f64, recipient_urgency as f64),
            None => NEUTRAL_PROBABILITY,
        }
    }
}

/// Fit a model on an 80/20 split of the profiles
fn fit(profiles: &[Profile], version: u64) -> Result<(TrainedModel, TrainingReport), TrainingError> {
    if profiles.is_empty() {
        return Err(TrainingError::EmptyDataset);
    }

    let mut rows: Vec<Row> = profiles.iter().map(to_row).collect();
    let n = rows.len();

    let test_len = ((n as f64) * TEST_FRACTION).ceil() as usize;
    if n < 2 || test_len == 0 || test_len >= n {
        return Err(TrainingError::InsufficientRows(n));
    }

    let mut rng = ChaCha20Rng::seed_from_u64(SPLIT_SEED);
    rows.shuffle(&mut rng);
    let (test, train) = rows.split_at(test_len);

    let positives = train.iter().filter(|r| r.label).count();
    if positives == 0 || positives == train.len() {
        return Err(TrainingError::SingleClass);
    }

    let (mean, scale) = feature_scaling(train);
    let mut model = TrainedModel {
        version,
        trained_at: Utc::now(),
        accuracy: None,
        weights: [0.0; 2],
        bias: 0.0,
        mean,
        scale,
    };

    gradient_descent(&mut model, train);

    let evaluated: Vec<&Row> = test.iter().filter(|r| r.evaluate).collect();
    let accuracy = if evaluated.is_empty() {
        None
    } else {
        let correct = evaluated
            .iter()
            .filter(|r| (model.raw_probability(r.features) >= 0.5) == r.label)
            .count();
        Some(correct as f64 / evaluated.len() as f64)
    };
    model.accuracy = accuracy;

    let report = TrainingReport {
        version,
        rows: n,
        train_rows: train.len(),
        test_rows: test.len(),
        accuracy,
    };

    Ok((model, report))
}

/// Per-feature mean and standard deviation (1.0 for constant features)
fn feature_scaling(rows: &[Row]) -> ([f64; 2], [f64; 2]) {
    let n = rows.len() as f64;
    let mut mean = [0.0; 2];
    let mut scale = [1.0; 2];

    for i in 0..2 {
        mean[i] = rows.iter().map(|r| r.features[i]).sum::<f64>() / n;
        let var = rows
            .iter()
            .map(|r| (r.features[i] - mean[i]).powi(2))
            .sum::<f64>()
            / n;
        if var > f64::EPSILON {
            scale[i] = var.sqrt();
        }
    }

    (mean, scale)
}

/// Full-batch gradient descent on L2-regularised log loss
fn gradient_descent(model: &mut TrainedModel, rows: &[Row]) {
    let n = rows.len() as f64;
    let standardized: Vec<([f64; 2], f64)> = rows
        .iter()
        .map(|r| (model.standardize(r.features), if r.label { 1.0 } else { 0.0 }))
        .collect();

    for _ in 0..EPOCHS {
        let mut grad_w = [0.0; 2];
        let mut grad_b = 0.0;

        for (z, y) in &standardized {
            let p = sigmoid(model.weights[0] * z[0] + model.weights[1] * z[1] + model.bias);
            let err = p - y;
            grad_w[0] += err * z[0];
            grad_w[1] += err * z[1];
            grad_b += err;
        }

        for i in 0..2 {
            model.weights[i] -= LEARNING_RATE * (grad_w[i] / n + L2_PENALTY * model.weights[i]);
        }
        model.bias -= LEARNING_RATE * grad_b / n;
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
