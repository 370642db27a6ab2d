use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::core::{
    estimator::SuccessEstimator,
    filters::{matches_blood_constraint, passes_score_threshold, sort_descending_by},
    noise::PrivacyLayer,
    scoring::{round_to, score, CompatibilityScore},
};
use crate::error::MatchError;
use crate::models::{Donor, MatchResult, Recipient};

/// Results returned in single-recipient mode
pub const SINGLE_TOP_N: usize = 10;
/// Candidates each site contributes in federated mode
pub const LOCAL_TOP_N: usize = 5;
/// Results returned in federated mode unless configured otherwise
pub const DEFAULT_GLOBAL_TOP_K: usize = 3;

/// A donor that passed filtering, with its exact score
#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate<'a> {
    pub donor: &'a Donor,
    pub score: CompatibilityScore,
}

/// One site's ranked candidates; only this crosses the site boundary
#[derive(Debug, Clone)]
pub struct SiteRanking<'a> {
    pub site: String,
    pub candidates: Vec<ScoredCandidate<'a>>,
}

/// Matching orchestrator - implements the ranking pipeline
///
/// # Pipeline Stages
/// 1. Hard blood-type filter
/// 2. Compatibility scoring
/// 3. Score threshold
/// 4. Ranking and truncation
/// 5. Privacy noise and success prediction on the survivors
#[derive(Debug, Clone)]
pub struct Matcher {
    privacy: Arc<PrivacyLayer>,
    global_top_k: usize,
}

impl Matcher {
    pub fn new(privacy: PrivacyLayer) -> Self {
        Self {
            privacy: Arc::new(privacy),
            global_top_k: DEFAULT_GLOBAL_TOP_K,
        }
    }

    /// Default privacy parameters and global top-3
    pub fn with_defaults() -> Result<Self, MatchError> {
        Ok(Self::new(PrivacyLayer::with_defaults()?))
    }

    pub fn with_global_top_k(mut self, k: usize) -> Self {
        self.global_top_k = k;
        self
    }

    pub fn global_top_k(&self) -> usize {
        self.global_top_k
    }

    pub fn privacy(&self) -> &PrivacyLayer {
        &self.privacy
    }

    /// Filter, score and threshold candidates, preserving input order
    pub fn score_candidates<'a>(
        &self,
        recipient: &Recipient,
        donors: &'a [Donor],
    ) -> Vec<ScoredCandidate<'a>> {
        let refs: Vec<&'a Donor> = donors.iter().collect();
        score_refs(recipient, &refs)
    }

    /// Rank donors for one recipient
    ///
    /// Sorted by exact score, top 10, each carrying a noisy score, a noisy
    /// age-difference note and a success probability.
    pub fn find_matches(
        &self,
        recipient: &Recipient,
        donors: &[Donor],
        estimator: &SuccessEstimator,
    ) -> Vec<MatchResult> {
        let mut candidates = self.score_candidates(recipient, donors);

        sort_descending_by(&mut candidates, |c| c.score.raw_score);
        candidates.truncate(SINGLE_TOP_N);

        candidates
            .into_iter()
            .map(|c| {
                let mut result = self.calibrate(recipient, &c, estimator);
                result.privacy_note = Some(self.privacy_note(recipient, &c, result.noisy_score));
                result
            })
            .collect()
    }

    /// Per-site top-5 by exact score, sites in first-seen order
    pub fn local_rankings<'a>(
        &self,
        recipient: &Recipient,
        donors: &'a [Donor],
    ) -> Vec<SiteRanking<'a>> {
        group_by_site(donors)
            .into_iter()
            .map(|(site, members)| {
                let mut candidates = score_refs(recipient, &members);
                sort_descending_by(&mut candidates, |c| c.score.raw_score);
                candidates.truncate(LOCAL_TOP_N);
                SiteRanking {
                    site: site.to_string(),
                    candidates,
                }
            })
            .collect()
    }

    /// Merge per-site rankings into a global top-k by noisy score
    pub fn find_matches_federated(
        &self,
        recipient: &Recipient,
        donors: &[Donor],
        estimator: &SuccessEstimator,
    ) -> Vec<MatchResult> {
        let rankings = self.local_rankings(recipient, donors);

        tracing::debug!(
            "Federated merge over {} sites for recipient {}",
            rankings.len(),
            recipient.id
        );

        let mut merged: Vec<MatchResult> = rankings
            .iter()
            .flat_map(|site| site.candidates.iter())
            .map(|c| self.calibrate(recipient, c, estimator))
            .collect();

        sort_descending_by(&mut merged, |m| m.noisy_score);
        merged.truncate(self.global_top_k);
        merged
    }

    /// Single highest exact score among blood-compatible donors
    ///
    /// Only the 0.2 ranking threshold is skipped; a pairing must still score
    /// above zero. The first donor seen wins ties.
    pub fn best_match<'a>(
        &self,
        recipient: &Recipient,
        donors: &'a [Donor],
    ) -> Option<ScoredCandidate<'a>> {
        donors
            .iter()
            .filter(|d| matches_blood_constraint(recipient, d))
            .map(|d| ScoredCandidate {
                donor: d,
                score: score(recipient, d),
            })
            .filter(|c| c.score.raw_score > 0.0)
            .fold(None, |best: Option<ScoredCandidate<'a>>, c| match best {
                Some(b) if b.score.raw_score >= c.score.raw_score => Some(b),
                _ => Some(c),
            })
    }

    fn calibrate(
        &self,
        recipient: &Recipient,
        candidate: &ScoredCandidate<'_>,
        estimator: &SuccessEstimator,
    ) -> MatchResult {
        let donor = candidate.donor;
        let raw = candidate.score.raw_score;

        let noisy_score = round_to(self.privacy.noisy_score(raw), 3);
        let success_probability =
            round_to(estimator.predict(donor.age, recipient.urgency_or_zero()), 3);

        MatchResult {
            donor_id: donor.id.clone(),
            blood_type: donor.blood_type,
            location: donor.location.clone(),
            organs: donor.organs.clone(),
            raw_score: raw,
            noisy_score,
            distance_km: candidate.score.distance_km,
            success_probability,
            breakdown: candidate.score.breakdown,
            match_reason: format!("Combined Score {:.2} (Blood/HLA/Loc)", raw),
            privacy_note: None,
        }
    }

    fn privacy_note(&self, recipient: &Recipient, candidate: &ScoredCandidate<'_>, noisy_score: f64) -> String {
        let age_diff = (candidate.donor.age as i64 - recipient.age as i64).abs();
        let noisy_age_diff = self.privacy.noisy_age_diff(age_diff as f64);
        let score_shift = round_to((noisy_score - candidate.score.raw_score).abs(), 2);

        format!(
            "DP Applied: Age ±{}, Score ±{}",
            (noisy_age_diff - age_diff).abs(),
            score_shift
        )
    }
}

fn score_refs<'a>(recipient: &Recipient, donors: &[&'a Donor]) -> Vec<ScoredCandidate<'a>> {
    donors
        .par_iter()
        .filter(|d| matches_blood_constraint(recipient, d))
        .map(|d| ScoredCandidate {
            donor: *d,
            score: score(recipient, d),
        })
        .filter(|c| passes_score_threshold(c.score.raw_score))
        .collect()
}

/// Partition donors by location, sites in first-seen order
fn group_by_site(donors: &[Donor]) -> Vec<(&str, Vec<&Donor>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut sites: Vec<(&str, Vec<&Donor>)> = Vec::new();

    for donor in donors {
        let site = donor.location.as_str();
        match index.get(site) {
            Some(&i) => sites[i].1.push(donor),
            None => {
                index.insert(site, sites.len());
                sites.push((site, vec![donor]));
            }
        }
    }

    sites
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::noise::{Calibration, GaussianMechanism, DEFAULT_DELTA};
    use crate::models::{BloodType, HlaMatch};
    use std::collections::HashSet;

    fn create_recipient(blood_type: BloodType, location: &str) -> Recipient {
        Recipient {
            id: "recipient".to_string(),
            name: None,
            blood_type,
            age: 50,
            location: location.to_string(),
            hla_markers: HlaMatch::default(),
            urgency_score: Some(6),
            organ_required: None,
            comorbidities: None,
        }
    }

    fn create_donor(id: &str, blood_type: BloodType, hla: u8, location: &str) -> Donor {
        Donor {
            id: id.to_string(),
            name: None,
            blood_type,
            age: 40,
            location: location.to_string(),
            hla_markers: HlaMatch::new(hla),
            organs: vec!["Liver".to_string()],
            comorbidities: None,
        }
    }

    fn seeded_matcher() -> Matcher {
        let privacy = PrivacyLayer::new(
            GaussianMechanism::seeded(0.5, DEFAULT_DELTA, 1.0, Calibration::Classic, 11).unwrap(),
            GaussianMechanism::seeded(1.0, DEFAULT_DELTA, 10.0, Calibration::Classic, 12).unwrap(),
        );
        Matcher::new(privacy)
    }

    #[test]
    fn test_incompatible_donors_filtered() {
        let matcher = seeded_matcher();
        let recipient = create_recipient(BloodType::OPos, "Europe-UK");
        let donors = vec![
            create_donor("1", BloodType::ONeg, 6, "Europe-UK"),
            create_donor("2", BloodType::APos, 6, "Europe-UK"),
            create_donor("3", BloodType::AbPos, 6, "Europe-UK"),
        ];

        let results = matcher.find_matches(&recipient, &donors, &SuccessEstimator::new());

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].donor_id, "1");
        assert_eq!(results[0].success_probability, 0.5);
        assert!(results[0].privacy_note.as_deref().unwrap().starts_with("DP Applied: Age ±"));
    }

    #[test]
    fn test_low_scores_dropped() {
        let matcher = seeded_matcher();
        let mut recipient = create_recipient(BloodType::APos, "USA-California");
        recipient.urgency_score = Some(0);

        // A- gives to A+, but earns no blood, HLA or urgency credit
        let donors = vec![
            create_donor("far", BloodType::ANeg, 0, "Asia-India"),
            create_donor("near", BloodType::ANeg, 0, "USA-California"),
        ];

        // "near" scores exactly 0.2 from proximity alone; the cutoff is strict
        assert!(matcher.score_candidates(&recipient, &donors).is_empty());

        let with_hla = vec![create_donor("hla", BloodType::ANeg, 1, "USA-California")];
        assert_eq!(matcher.score_candidates(&recipient, &with_hla).len(), 1);
    }

    #[test]
    fn test_sorted_by_raw_score_and_capped() {
        let matcher = seeded_matcher();
        let recipient = create_recipient(BloodType::AbPos, "USA-New York");
        let donors: Vec<Donor> = (0..15)
            .map(|i| create_donor(&i.to_string(), BloodType::OPos, (i % 7) as u8, "USA-New York"))
            .collect();

        let results = matcher.find_matches(&recipient, &donors, &SuccessEstimator::new());

        assert_eq!(results.len(), SINGLE_TOP_N);
        for pair in results.windows(2) {
            assert!(pair[0].raw_score >= pair[1].raw_score);
        }
        for r in &results {
            assert!((0.0..=1.0).contains(&r.noisy_score));
        }
    }

    #[test]
    fn test_ties_keep_encounter_order() {
        let matcher = seeded_matcher();
        let recipient = create_recipient(BloodType::APos, "Europe-UK");
        let donors: Vec<Donor> = ["a", "b", "c"]
            .iter()
            .map(|id| create_donor(id, BloodType::APos, 4, "Europe-UK"))
            .collect();

        let results = matcher.find_matches(&recipient, &donors, &SuccessEstimator::new());
        let ids: Vec<_> = results.iter().map(|r| r.donor_id.as_str()).collect();

        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_local_rankings_per_site() {
        let matcher = seeded_matcher();
        let recipient = create_recipient(BloodType::AbPos, "Europe-UK");
        let mut donors = Vec::new();
        for site in ["Europe-UK", "Asia-India", "USA-California"] {
            for i in 0..7 {
                donors.push(create_donor(&format!("{}-{}", site, i), BloodType::BPos, i as u8 % 7, site));
            }
        }

        let rankings = matcher.local_rankings(&recipient, &donors);

        let sites: Vec<_> = rankings.iter().map(|r| r.site.as_str()).collect();
        assert_eq!(sites, vec!["Europe-UK", "Asia-India", "USA-California"]);
        for ranking in &rankings {
            assert_eq!(ranking.candidates.len(), LOCAL_TOP_N);
            assert!(ranking.candidates.iter().all(|c| c.donor.location == ranking.site));
        }
    }

    #[test]
    fn test_federated_top_k_drawn_from_local_lists() {
        let matcher = seeded_matcher().with_global_top_k(3);
        let recipient = create_recipient(BloodType::AbPos, "Europe-UK");
        let mut donors = Vec::new();
        for site in ["Europe-UK", "Asia-India", "Africa-South Africa"] {
            for i in 0..6 {
                donors.push(create_donor(&format!("{}-{}", site, i), BloodType::APos, i as u8, site));
            }
        }

        let local: HashSet<String> = matcher
            .local_rankings(&recipient, &donors)
            .iter()
            .flat_map(|r| r.candidates.iter().map(|c| c.donor.id.clone()))
            .collect();

        let global = matcher.find_matches_federated(&recipient, &donors, &SuccessEstimator::new());

        assert_eq!(global.len(), 3);
        assert!(global.iter().all(|m| local.contains(&m.donor_id)));
        for pair in global.windows(2) {
            assert!(pair[0].noisy_score >= pair[1].noisy_score);
        }
        assert!(global.iter().all(|m| m.privacy_note.is_none()));
    }

    #[test]
    fn test_best_match_prefers_first_on_tie() {
        let matcher = seeded_matcher();
        let recipient = create_recipient(BloodType::BPos, "Europe-UK");
        let donors = vec![
            create_donor("first", BloodType::BPos, 5, "Europe-UK"),
            create_donor("second", BloodType::BPos, 5, "Europe-UK"),
            create_donor("blocked", BloodType::APos, 6, "Europe-UK"),
        ];

        let best = matcher.best_match(&recipient, &donors).unwrap();
        assert_eq!(best.donor.id, "first");

        assert!(matcher.best_match(&recipient, &donors[2..]).is_none());
    }

    #[test]
    fn test_best_match_ignores_zero_scores() {
        let matcher = seeded_matcher();
        let mut recipient = create_recipient(BloodType::APos, "USA-California");
        recipient.urgency_score = Some(0);

        // Compatible, but no blood, HLA, proximity or urgency credit
        let donors = vec![create_donor("far", BloodType::ANeg, 0, "Asia-India")];
        assert_eq!(score(&recipient, &donors[0]).raw_score, 0.0);
        assert!(matcher.best_match(&recipient, &donors).is_none());

        let donors = vec![
            create_donor("far", BloodType::ANeg, 0, "Asia-India"),
            create_donor("hla", BloodType::ANeg, 1, "Asia-India"),
        ];
        assert_eq!(matcher.best_match(&recipient, &donors).unwrap().donor.id, "hla");
    }
}
