use crate::models::BloodType;

/// Highest HLA match numerator
pub const HLA_MAX: u8 = 6;

/// Numerator used when an HLA marker string cannot be parsed
pub const HLA_DEFAULT: u8 = 0;

/// Recipients each donor group may give to (ABO/Rh lattice, keyed by donor)
const LATTICE: [(BloodType, &[BloodType]); 8] = {
    use BloodType::*;
    [
        (ONeg, &[ONeg, OPos, ANeg, APos, BNeg, BPos, AbNeg, AbPos]),
        (OPos, &[OPos, APos, BPos, AbPos]),
        (ANeg, &[ANeg, APos, AbNeg, AbPos]),
        (APos, &[APos, AbPos]),
        (BNeg, &[BNeg, BPos, AbNeg, AbPos]),
        (BPos, &[BPos, AbPos]),
        (AbNeg, &[AbNeg, AbPos]),
        (AbPos, &[AbPos]),
    ]
};

/// Hard blood-type constraint between typed groups
#[inline]
pub fn is_blood_compatible(donor: BloodType, recipient: BloodType) -> bool {
    LATTICE
        .iter()
        .find(|(d, _)| *d == donor)
        .map(|(_, recipients)| recipients.contains(&recipient))
        .unwrap_or(false)
}

/// Hard blood-type constraint on raw strings
///
/// Unknown types are incompatible with everything.
pub fn blood_compatible(donor_type: &str, recipient_type: &str) -> bool {
    match (donor_type.parse::<BloodType>(), recipient_type.parse::<BloodType>()) {
        (Ok(donor), Ok(recipient)) => is_blood_compatible(donor, recipient),
        _ => false,
    }
}

/// Extract the numerator from an "X/Y" HLA marker string
///
/// Missing separator, non-numeric or out-of-range numerators and absent
/// input all yield [`HLA_DEFAULT`].
pub fn parse_hla(markers: Option<&str>) -> u8 {
    let parsed = markers
        .and_then(|s| s.split_once('/'))
        .and_then(|(numerator, _)| numerator.trim().parse::<u8>().ok())
        .filter(|n| *n <= HLA_MAX);

    match parsed {
        Some(n) => n,
        None => {
            tracing::trace!("Unparseable HLA markers {:?}, using default", markers);
            HLA_DEFAULT
        }
    }
}
