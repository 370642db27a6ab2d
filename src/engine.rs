use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::core::{Matcher, SuccessEstimator, TrainingReport};
use crate::error::MatchError;
use crate::models::{
    Allocation, AllocationStatus, Donor, MatchMode, MatchRequest, MatchResponse, MatchResult,
    MatchSummary, Profile, Recipient, RecipientSummary, Role,
};
use crate::services::{MatchSink, ProfileStore};

/// Recipients considered by one allocation sweep
pub const ALLOCATION_SWEEP_SIZE: usize = 5;

/// Matching entry point shared across callers
///
/// Resolves profiles through a [`ProfileStore`], runs the [`Matcher`]
/// pipeline, and hands summaries to an optional [`MatchSink`]. Store reads
/// happen before the pipeline runs and sink writes after it, so the pipeline
/// itself never touches I/O.
pub struct MatchingEngine<S: ProfileStore> {
    store: Arc<S>,
    matcher: Matcher,
    estimator: Arc<SuccessEstimator>,
    sink: Option<Arc<dyn MatchSink>>,
}

impl<S: ProfileStore> MatchingEngine<S> {
    pub fn new(store: Arc<S>, matcher: Matcher) -> Self {
        Self {
            store,
            matcher,
            estimator: Arc::new(SuccessEstimator::new()),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn MatchSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Share an estimator with other engines
    pub fn with_estimator(mut self, estimator: Arc<SuccessEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn estimator(&self) -> &Arc<SuccessEstimator> {
        &self.estimator
    }

    /// Look up a recipient by id
    ///
    /// # Errors
    /// `NotFound` if the id is unknown, `InvalidRole` if it names a donor
    pub fn resolve_recipient(&self, recipient_id: &str) -> Result<Recipient, MatchError> {
        match self.store.get_by_id(recipient_id) {
            Some(Profile::Recipient(recipient)) => Ok(recipient),
            Some(Profile::Donor(_)) => Err(MatchError::InvalidRole {
                id: recipient_id.to_string(),
                expected: Role::Recipient,
            }),
            None => Err(MatchError::NotFound(recipient_id.to_string())),
        }
    }

    /// Rank the given candidate donors for a recipient
    ///
    /// Every call recomputes from scratch, including fresh noise.
    pub fn compute_matches(
        &self,
        recipient_id: &str,
        candidate_donors: &[Donor],
        mode: MatchMode,
    ) -> Result<MatchResponse, MatchError> {
        let recipient = self.resolve_recipient(recipient_id)?;
        let request_id = Uuid::new_v4().to_string();

        tracing::info!(
            "Computing {} matches for recipient {} over {} candidates (request {})",
            mode,
            recipient.id,
            candidate_donors.len(),
            request_id
        );

        let matches = match mode {
            MatchMode::Single => {
                self.matcher
                    .find_matches(&recipient, candidate_donors, &self.estimator)
            }
            MatchMode::Federated => {
                self.matcher
                    .find_matches_federated(&recipient, candidate_donors, &self.estimator)
            }
        };

        tracing::info!(
            "Request {} returned {} matches for recipient {}",
            request_id,
            matches.len(),
            recipient.id
        );

        if let Some((donor_id, score)) = best_exact(&matches) {
            self.persist(MatchSummary {
                request_id: request_id.clone(),
                recipient_id: recipient.id.clone(),
                organ: recipient.organ_required.clone(),
                urgency_score: recipient.urgency_score,
                best_match_donor_id: Some(donor_id),
                match_score: score,
                status: AllocationStatus::from_score(score),
                timestamp: chrono::Utc::now(),
            });
        }

        Ok(MatchResponse {
            request_id,
            mode,
            recipient: RecipientSummary {
                id: recipient.id,
                blood_type: recipient.blood_type,
                urgency: recipient.urgency_score,
            },
            matches,
            total_candidates: candidate_donors.len(),
        })
    }

    /// Rank every donor in the store for a recipient
    pub fn compute_matches_from_store(
        &self,
        recipient_id: &str,
        mode: MatchMode,
    ) -> Result<MatchResponse, MatchError> {
        let donors = self.store.list_donors();
        self.compute_matches(recipient_id, &donors, mode)
    }

    /// Validate and run a request against the store
    pub fn handle(&self, request: &MatchRequest) -> Result<MatchResponse, MatchError> {
        request
            .validate()
            .map_err(|e| MatchError::InvalidRequest(e.to_string()))?;

        self.compute_matches_from_store(&request.recipient_id, request.mode)
    }

    /// Best available donor for each of the most urgent recipients
    pub fn compute_allocations(&self) -> Vec<Allocation> {
        let mut recipients = self.store.list_recipients();
        let donors = self.store.list_donors();

        // Stable, so equal urgency keeps store order
        recipients.sort_by(|a, b| b.urgency_or_zero().cmp(&a.urgency_or_zero()));
        recipients.truncate(ALLOCATION_SWEEP_SIZE);

        tracing::info!(
            "Running allocation sweep over {} recipients and {} donors",
            recipients.len(),
            donors.len()
        );

        recipients
            .iter()
            .map(|recipient| {
                let best = self.matcher.best_match(recipient, &donors);
                let best_match_donor_id = best.as_ref().map(|c| c.donor.id.clone());
                let match_score = best.map(|c| c.score.raw_score).unwrap_or(0.0);
                let status = AllocationStatus::from_score(match_score);

                self.persist(MatchSummary {
                    request_id: Uuid::new_v4().to_string(),
                    recipient_id: recipient.id.clone(),
                    organ: recipient.organ_required.clone(),
                    urgency_score: recipient.urgency_score,
                    best_match_donor_id: best_match_donor_id.clone(),
                    match_score,
                    status,
                    timestamp: chrono::Utc::now(),
                });

                Allocation {
                    recipient_id: recipient.id.clone(),
                    organ: recipient.organ_required.clone(),
                    urgency_score: recipient.urgency_score,
                    best_match_donor_id,
                    match_score,
                    status,
                }
            })
            .collect()
    }

    /// Train the estimator on every profile in the store
    pub fn train_estimator(&self) -> Option<TrainingReport> {
        let profiles = self.store.list_all();
        self.train_estimator_with(&profiles)
    }

    /// Train on the given profiles
    ///
    /// Failures are logged and leave the current model in place.
    pub fn train_estimator_with(&self, profiles: &[Profile]) -> Option<TrainingReport> {
        tracing::info!("Training success estimator on {} profiles", profiles.len());

        match self.estimator.train(profiles) {
            Ok(report) => {
                match report.accuracy {
                    Some(accuracy) => tracing::info!(
                        "Estimator v{} trained on {} rows, held-out accuracy {:.3}",
                        report.version,
                        report.train_rows,
                        accuracy
                    ),
                    None => tracing::info!(
                        "Estimator v{} trained on {} rows, no donor rows held out",
                        report.version,
                        report.train_rows
                    ),
                }
                Some(report)
            }
            Err(e) => {
                tracing::warn!("Estimator training failed: {}", e);
                None
            }
        }
    }

    pub fn predict_success(&self, donor_age: u32, recipient_urgency: u8) -> f64 {
        self.estimator.predict(donor_age, recipient_urgency)
    }

    fn persist(&self, summary: MatchSummary) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.record(&summary) {
                tracing::warn!(
                    "Failed to persist summary {} for recipient {}: {}",
                    summary.request_id,
                    summary.recipient_id,
                    e
                );
            }
        }
    }
}

/// Highest exact score among results, first wins ties
fn best_exact(matches: &[MatchResult]) -> Option<(String, f64)> {
    matches
        .iter()
        .fold(None, |best: Option<&MatchResult>, m| match best {
            Some(b) if b.raw_score >= m.raw_score => Some(b),
            _ => Some(m),
        })
        .map(|m| (m.donor_id.clone(), m.raw_score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BloodType, HlaMatch};
    use crate::services::{InMemoryProfileStore, SinkError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<MatchSummary>>,
    }

    impl MatchSink for RecordingSink {
        fn record(&self, summary: &MatchSummary) -> Result<(), SinkError> {
            self.records.lock().unwrap().push(summary.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl MatchSink for FailingSink {
        fn record(&self, _summary: &MatchSummary) -> Result<(), SinkError> {
            Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }
    }

    fn donor(id: &str, blood_type: BloodType, hla: u8) -> Profile {
        Profile::Donor(Donor {
            id: id.to_string(),
            name: None,
            blood_type,
            age: 35,
            location: "Europe-UK".to_string(),
            hla_markers: HlaMatch::new(hla),
            organs: vec!["Kidney".to_string()],
            comorbidities: None,
        })
    }

    fn recipient(id: &str, blood_type: BloodType, urgency: Option<u8>) -> Profile {
        Profile::Recipient(Recipient {
            id: id.to_string(),
            name: None,
            blood_type,
            age: 50,
            location: "Europe-UK".to_string(),
            hla_markers: HlaMatch::default(),
            urgency_score: urgency,
            organ_required: Some("Kidney".to_string()),
            comorbidities: None,
        })
    }

    fn engine(profiles: Vec<Profile>) -> MatchingEngine<InMemoryProfileStore> {
        let store = Arc::new(InMemoryProfileStore::from_profiles(profiles));
        MatchingEngine::new(store, Matcher::with_defaults().unwrap())
    }

    #[test]
    fn test_unknown_and_wrong_role() {
        let engine = engine(vec![donor("d1", BloodType::ONeg, 3)]);

        assert!(matches!(
            engine.compute_matches_from_store("nobody", MatchMode::Single),
            Err(MatchError::NotFound(_))
        ));
        assert!(matches!(
            engine.compute_matches_from_store("d1", MatchMode::Single),
            Err(MatchError::InvalidRole { expected: Role::Recipient, .. })
        ));
    }

    #[test]
    fn test_summary_recorded_for_best_exact_score() {
        let sink = Arc::new(RecordingSink::default());
        let engine = engine(vec![
            recipient("r1", BloodType::APos, Some(9)),
            donor("d1", BloodType::ONeg, 2),
            donor("d2", BloodType::APos, 6),
        ])
        .with_sink(sink.clone());

        let response = engine
            .compute_matches_from_store("r1", MatchMode::Single)
            .unwrap();

        assert_eq!(response.matches[0].donor_id, "d2");

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].request_id, response.request_id);
        assert_eq!(records[0].best_match_donor_id.as_deref(), Some("d2"));
        // 0.4 + 0.3 + 0.2 + 0.09
        assert_eq!(records[0].match_score, 0.99);
        assert_eq!(records[0].status, AllocationStatus::MatchFound);
    }

    #[test]
    fn test_sink_failure_does_not_fail_request() {
        let engine = engine(vec![
            recipient("r1", BloodType::APos, Some(9)),
            donor("d1", BloodType::APos, 6),
        ])
        .with_sink(Arc::new(FailingSink));

        let response = engine.compute_matches_from_store("r1", MatchMode::Single);
        assert_eq!(response.unwrap().matches.len(), 1);
    }

    #[test]
    fn test_empty_result_not_persisted() {
        let sink = Arc::new(RecordingSink::default());
        let engine = engine(vec![
            recipient("r1", BloodType::ONeg, Some(9)),
            donor("d1", BloodType::APos, 6),
        ])
        .with_sink(sink.clone());

        let response = engine
            .compute_matches_from_store("r1", MatchMode::Single)
            .unwrap();

        assert!(response.matches.is_empty());
        assert!(sink.records.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_request_rejected() {
        let engine = engine(vec![]);
        let request = MatchRequest::new("", MatchMode::Single);

        assert!(matches!(
            engine.handle(&request),
            Err(MatchError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_allocations_take_most_urgent() {
        let mut profiles: Vec<Profile> = (0..7)
            .map(|i| recipient(&format!("r{}", i), BloodType::BPos, Some(i as u8)))
            .collect();
        profiles.push(recipient("no-urgency", BloodType::BPos, None));
        profiles.push(donor("d1", BloodType::BPos, 6));
        let engine = engine(profiles);

        let allocations = engine.compute_allocations();
        let ids: Vec<_> = allocations.iter().map(|a| a.recipient_id.as_str()).collect();

        assert_eq!(ids, vec!["r6", "r5", "r4", "r3", "r2"]);
        assert!(allocations
            .iter()
            .all(|a| a.best_match_donor_id.as_deref() == Some("d1")));
        assert_eq!(allocations[0].status, AllocationStatus::MatchFound);
    }

    #[test]
    fn test_allocation_without_compatible_donor_waits() {
        let engine = engine(vec![
            recipient("r1", BloodType::ONeg, Some(10)),
            donor("d1", BloodType::AbPos, 6),
        ]);

        let allocations = engine.compute_allocations();

        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].best_match_donor_id, None);
        assert_eq!(allocations[0].match_score, 0.0);
        assert_eq!(allocations[0].status, AllocationStatus::Waiting);
    }

    #[test]
    fn test_failed_training_reports_none() {
        let engine = engine(vec![]);

        assert!(engine.train_estimator().is_none());
        assert_eq!(engine.predict_success(40, 5), 0.5);
    }
}
