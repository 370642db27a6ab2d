use std::sync::{Mutex, MutexGuard};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::error::MatchError;

/// Sensitivity of the compatibility score, whose domain is [0, 1]
pub const SCORE_SENSITIVITY: f64 = 1.0;
pub const DEFAULT_SCORE_EPSILON: f64 = 0.5;

/// Sensitivity of the donor/recipient age difference
pub const AGE_SENSITIVITY: f64 = 10.0;
/// Sensitivity used with the simplified calibration (full age domain)
pub const AGE_SENSITIVITY_SIMPLIFIED: f64 = 80.0;
pub const DEFAULT_AGE_EPSILON: f64 = 1.0;

pub const DEFAULT_DELTA: f64 = 1e-5;

/// How σ is derived from (Δ, ε, δ)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Calibration {
    /// σ = Δ·√(2 ln(1.25/δ))/ε
    #[default]
    Classic,
    /// σ = Δ/ε
    Simplified,
}

/// Gaussian noise mechanism with fixed (ε, δ, Δ)
///
/// Noise is drawn fresh on every call from N(0, σ²), where σ is calibrated
/// from the query sensitivity Δ and the privacy parameters:
///
/// ```text
/// classic:    σ = Δ · √(2 ln(1.25/δ)) / ε
/// simplified: σ = Δ / ε
/// ```
///
/// Samples come from the Box-Muller transform over a ChaCha20 stream seeded
/// from OS entropy.
#[derive(Debug)]
pub struct GaussianMechanism {
    epsilon: f64,
    delta: f64,
    sensitivity: f64,
    sigma: f64,
    rng: Mutex<ChaCha20Rng>,
}

impl GaussianMechanism {
    /// Create a mechanism with classic calibration
    ///
    /// # Errors
    /// `InvalidPrivacyParameter` when ε ≤ 0, δ ∉ (0, 1) or Δ ≤ 0
    pub fn new(epsilon: f64, delta: f64, sensitivity: f64) -> Result<Self, MatchError> {
        Self::with_calibration(epsilon, delta, sensitivity, Calibration::Classic)
    }

    pub fn with_calibration(
        epsilon: f64,
        delta: f64,
        sensitivity: f64,
        calibration: Calibration,
    ) -> Result<Self, MatchError> {
        Self::build(epsilon, delta, sensitivity, calibration, ChaCha20Rng::from_entropy())
    }

    /// Deterministic stream for reproducible tests and benchmarks
    pub fn seeded(
        epsilon: f64,
        delta: f64,
        sensitivity: f64,
        calibration: Calibration,
        seed: u64,
    ) -> Result<Self, MatchError> {
        Self::build(epsilon, delta, sensitivity, calibration, ChaCha20Rng::seed_from_u64(seed))
    }

    fn build(
        epsilon: f64,
        delta: f64,
        sensitivity: f64,
        calibration: Calibration,
        rng: ChaCha20Rng,
    ) -> Result<Self, MatchError> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(MatchError::InvalidPrivacyParameter(format!(
                "epsilon must be positive and finite, got {}",
                epsilon
            )));
        }
        if !delta.is_finite() || delta <= 0.0 || delta >= 1.0 {
            return Err(MatchError::InvalidPrivacyParameter(format!(
                "delta must be in (0, 1), got {}",
                delta
            )));
        }
        if !sensitivity.is_finite() || sensitivity <= 0.0 {
            return Err(MatchError::InvalidPrivacyParameter(format!(
                "sensitivity must be positive and finite, got {}",
                sensitivity
            )));
        }

        let sigma = compute_sigma(epsilon, delta, sensitivity, calibration);

        Ok(Self {
            epsilon,
            delta,
            sensitivity,
            sigma,
            rng: Mutex::new(rng),
        })
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    /// Standard deviation of the added noise
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Return `value` plus freshly sampled N(0, σ²) noise
    pub fn randomise(&self, value: f64) -> f64 {
        value + self.sample_standard_normal() * self.sigma
    }

    fn sample_standard_normal(&self) -> f64 {
        let mut rng = self.lock_rng();

        // u1 in (0, 1] keeps ln(u1) finite
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = rng.gen::<f64>();

        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    fn lock_rng(&self) -> MutexGuard<'_, ChaCha20Rng> {
        // A panic while holding the guard cannot leave the RNG in an invalid state
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// σ for the given calibration
pub fn compute_sigma(epsilon: f64, delta: f64, sensitivity: f64, calibration: Calibration) -> f64 {
    match calibration {
        Calibration::Classic => sensitivity * (2.0 * (1.25 / delta).ln()).sqrt() / epsilon,
        Calibration::Simplified => sensitivity / epsilon,
    }
}

/// The perturbations applied to values that leave the engine
///
/// The score path clamps into [0, 1] after perturbation. That is
/// post-processing for display and carries no formal (ε, δ) composition
/// guarantee across queries.
#[derive(Debug)]
pub struct PrivacyLayer {
    score: GaussianMechanism,
    age: GaussianMechanism,
}

impl PrivacyLayer {
    pub fn new(score: GaussianMechanism, age: GaussianMechanism) -> Self {
        Self { score, age }
    }

    /// Score ε = 0.5, age ε = 1.0, δ = 1e-5, classic calibration
    pub fn with_defaults() -> Result<Self, MatchError> {
        Ok(Self {
            score: GaussianMechanism::new(DEFAULT_SCORE_EPSILON, DEFAULT_DELTA, SCORE_SENSITIVITY)?,
            age: GaussianMechanism::new(DEFAULT_AGE_EPSILON, DEFAULT_DELTA, AGE_SENSITIVITY)?,
        })
    }

    /// Perturbed score, clamped into [0, 1]
    pub fn noisy_score(&self, score: f64) -> f64 {
        self.score.randomise(score).clamp(0.0, 1.0)
    }

    /// Perturbed age difference, unclamped and truncated toward zero
    pub fn noisy_age_diff(&self, age_diff: f64) -> i64 {
        self.age.randomise(age_diff) as i64
    }

    pub fn score_mechanism(&self) -> &GaussianMechanism {
        &self.score
    }

    pub fn age_mechanism(&self) -> &GaussianMechanism {
        &self.age
    }
}
