//! Organ Match - privacy-preserving donor/recipient matching
//!
//! This library ranks organ donors for a recipient by a weighted
//! compatibility score, perturbs the values it exposes with a Gaussian
//! differential-privacy mechanism, and attaches a learned probability of
//! success. Ranking can run centrally or federated across sites.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::core::{blood_compatible, distance_km, parse_hla, Matcher, PrivacyLayer, SuccessEstimator};
pub use crate::engine::MatchingEngine;
pub use crate::error::MatchError;
pub use crate::models::{Donor, MatchMode, MatchRequest, MatchResponse, MatchResult, Profile, Recipient};
