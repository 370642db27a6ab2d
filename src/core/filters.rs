use std::cmp::Ordering;

use crate::core::compatibility::is_blood_compatible;
use crate::models::{Donor, Recipient};

/// Candidates must score strictly above this to be ranked
pub const MIN_RAW_SCORE: f64 = 0.2;

/// Check the hard blood-type constraint for a pairing
///
/// This is Stage 1 of the matching pipeline.
#[inline]
pub fn matches_blood_constraint(recipient: &Recipient, donor: &Donor) -> bool {
    is_blood_compatible(donor.blood_type, recipient.blood_type)
}

/// Check the minimum score cutoff
///
/// This is Stage 3, applied after scoring.
#[inline]
pub fn passes_score_threshold(raw_score: f64) -> bool {
    raw_score > MIN_RAW_SCORE
}

/// Stable sort, highest key first; ties keep encounter order
pub fn sort_descending_by<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> f64,
{
    items.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BloodType, HlaMatch};

    fn create_recipient(blood_type: BloodType) -> Recipient {
        Recipient {
            id: "r".to_string(),
            name: None,
            blood_type,
            age: 50,
            location: "USA-New York".to_string(),
            hla_markers: HlaMatch::default(),
            urgency_score: Some(7),
            organ_required: Some("Kidney".to_string()),
            comorbidities: None,
        }
    }

    fn create_donor(blood_type: BloodType) -> Donor {
        Donor {
            id: "d".to_string(),
            name: None,
            blood_type,
            age: 30,
            location: "USA-New York".to_string(),
            hla_markers: HlaMatch::new(4),
            organs: vec![],
            comorbidities: None,
        }
    }

    #[test]
    fn test_blood_constraint() {
        let recipient = create_recipient(BloodType::OPos);

        assert!(matches_blood_constraint(&recipient, &create_donor(BloodType::ONeg)));
        assert!(matches_blood_constraint(&recipient, &create_donor(BloodType::OPos)));
        assert!(!matches_blood_constraint(&recipient, &create_donor(BloodType::APos)));
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!passes_score_threshold(0.2));
        assert!(passes_score_threshold(0.201));
        assert!(!passes_score_threshold(0.0));
    }

    #[test]
    fn test_sort_is_stable() {
        let mut items = vec![("a", 0.5), ("b", 0.9), ("c", 0.5), ("d", 0.9), ("e", 0.1)];
        sort_descending_by(&mut items, |(_, score)| *score);

        let order: Vec<_> = items.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec!["b", "d", "a", "c", "e"]);
    }
}
