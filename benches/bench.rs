// Criterion benchmarks for Organ Match

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use organ_match::core::{distance::distance_km, scoring::score, Matcher, SuccessEstimator};
use organ_match::models::{BloodType, Donor, HlaMatch, Profile, Recipient};

const SITES: [&str; 5] = [
    "USA-California",
    "USA-New York",
    "Europe-UK",
    "Asia-India",
    "Africa-South Africa",
];

fn create_donor(id: usize) -> Donor {
    Donor {
        id: id.to_string(),
        name: None,
        blood_type: BloodType::ALL[id % 8],
        age: 18 + (id % 50) as u32,
        location: SITES[id % SITES.len()].to_string(),
        hla_markers: HlaMatch::new((id % 7) as u8),
        organs: vec!["Kidney".to_string()],
        comorbidities: if id % 3 == 0 { Some("Diabetes".to_string()) } else { None },
    }
}

fn create_recipient() -> Recipient {
    Recipient {
        id: "recipient".to_string(),
        name: None,
        blood_type: BloodType::AbPos,
        age: 54,
        location: "Europe-UK".to_string(),
        hla_markers: HlaMatch::new(3),
        urgency_score: Some(8),
        organ_required: Some("Kidney".to_string()),
        comorbidities: None,
    }
}

fn bench_distance(c: &mut Criterion) {
    c.bench_function("distance_km", |b| {
        b.iter(|| distance_km(black_box("USA-New York"), black_box("Asia-India")));
    });
}

fn bench_scoring(c: &mut Criterion) {
    let recipient = create_recipient();
    let donor = create_donor(7);

    c.bench_function("score_pair", |b| {
        b.iter(|| score(black_box(&recipient), black_box(&donor)));
    });
}

fn bench_matching(c: &mut Criterion) {
    let matcher = Matcher::with_defaults().expect("default privacy parameters are valid");
    let estimator = SuccessEstimator::new();
    let recipient = create_recipient();

    let mut group = c.benchmark_group("matching");

    for donor_count in [10, 100, 1000, 5000].iter() {
        let donors: Vec<Donor> = (0..*donor_count).map(create_donor).collect();

        group.bench_with_input(
            BenchmarkId::new("single", donor_count),
            donor_count,
            |b, _| {
                b.iter(|| matcher.find_matches(black_box(&recipient), black_box(&donors), &estimator));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("federated", donor_count),
            donor_count,
            |b, _| {
                b.iter(|| {
                    matcher.find_matches_federated(black_box(&recipient), black_box(&donors), &estimator)
                });
            },
        );
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let profiles: Vec<Profile> = (0..500).map(|i| Profile::Donor(create_donor(i))).collect();

    c.bench_function("train_estimator_500_profiles", |b| {
        b.iter(|| {
            let estimator = SuccessEstimator::new();
            black_box(estimator.train(black_box(&profiles)))
        });
    });
}

criterion_group!(benches, bench_distance, bench_scoring, bench_matching, bench_training);

criterion_main!(benches);
