use crate::core::distance::distance_km;
use crate::models::{BloodType, Donor, Recipient, ScoreBreakdown};

/// Component weights; they sum to 1 so the combined score stays in [0, 1]
pub const BLOOD_WEIGHT: f64 = 0.4;
pub const HLA_WEIGHT: f64 = 0.3;
pub const PROXIMITY_WEIGHT: f64 = 0.2;
pub const URGENCY_WEIGHT: f64 = 0.1;

/// Distance at which the proximity component reaches zero
pub const PROXIMITY_HORIZON_KM: f64 = 10_000.0;

/// Urgency component used when the recipient has no urgency score
pub const URGENCY_COMPONENT_DEFAULT: f64 = 0.5;

/// Deterministic compatibility of one donor for one recipient
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompatibilityScore {
    /// Weighted score, rounded to 3 decimals
    pub raw_score: f64,
    /// Components, each rounded to 2 decimals
    pub breakdown: ScoreBreakdown,
    /// Site-to-site distance, rounded to 1 decimal
    pub distance_km: f64,
}

/// Calculate the compatibility score (0-1) of a donor for a recipient
///
/// Scoring formula:
/// score = (
///     blood * 0.4 +        # identical 1.0, group O donor / group AB recipient 0.5
///     hla * 0.3 +          # HLA numerator / 6
///     proximity * 0.2 +    # linear decay to zero at 10,000km
///     urgency * 0.1        # urgency / 10, 0.5 when absent
/// )
///
/// Pure: identical inputs always yield identical output.
pub fn score(recipient: &Recipient, donor: &Donor) -> CompatibilityScore {
    let blood = blood_component(donor.blood_type, recipient.blood_type);
    let hla = donor.hla_markers.fraction();

    let distance = distance_km(&recipient.location, &donor.location);
    let proximity = proximity_component(distance);

    let urgency = urgency_component(recipient.urgency_score);

    let total = blood * BLOOD_WEIGHT
        + hla * HLA_WEIGHT
        + proximity * PROXIMITY_WEIGHT
        + urgency * URGENCY_WEIGHT;

    CompatibilityScore {
        raw_score: round_to(total.clamp(0.0, 1.0), 3),
        breakdown: ScoreBreakdown {
            blood: round_to(blood, 2),
            hla: round_to(hla, 2),
            proximity: round_to(proximity, 2),
            urgency: round_to(urgency, 2),
        },
        distance_km: round_to(distance, 1),
    }
}

/// Softened blood-type heuristic used for ranking (not the hard lattice)
#[inline]
pub fn blood_component(donor: BloodType, recipient: BloodType) -> f64 {
    if donor == recipient {
        1.0
    } else if donor.is_group_o() || recipient.is_group_ab() {
        0.5
    } else {
        0.0
    }
}

#[inline]
pub fn proximity_component(distance_km: f64) -> f64 {
    (1.0 - distance_km / PROXIMITY_HORIZON_KM).max(0.0)
}

#[inline]
pub fn urgency_component(urgency_score: Option<u8>) -> f64 {
    match urgency_score {
        Some(u) => (u.min(10) as f64) / 10.0,
        None => URGENCY_COMPONENT_DEFAULT,
    }
}

/// Round half away from zero to `decimals` places
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
