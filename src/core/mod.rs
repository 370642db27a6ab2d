// Core algorithm exports
pub mod compatibility;
pub mod distance;
pub mod estimator;
pub mod filters;
pub mod matcher;
pub mod noise;
pub mod scoring;

pub use compatibility::{blood_compatible, is_blood_compatible, parse_hla};
pub use distance::distance_km;
pub use estimator::{SuccessEstimator, TrainedModel, TrainingError, TrainingReport};
pub use matcher::{Matcher, ScoredCandidate, SiteRanking};
pub use noise::{Calibration, GaussianMechanism, PrivacyLayer};
pub use scoring::{score, CompatibilityScore};
