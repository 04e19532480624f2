// Criterion benchmarks for Village Match

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashSet;
use village_match::core::{calculate_compatibility, rank, Matcher, SessionSwipeCache};
use village_match::models::{Child, FilterPreferences, Location, Profile, ScoringWeights, Strategy};

const CITIES: [&str; 3] = ["Leeds", "York", "Hull"];
const AREAS: [&str; 4] = ["Headingley", "Chapel Allerton", "Roundhay", "Meanwood"];
const TAGS: [&str; 6] = ["breastfeeding", "outdoors", "parks", "co-sleeping", "music", "vegan"];

fn create_candidate(id: usize) -> Profile {
    Profile {
        user_id: format!("parent_{}", id),
        name: format!("Parent {}", id),
        location: Location {
            region: "Yorkshire".to_string(),
            city: CITIES[id % CITIES.len()].to_string(),
            area: AREAS[id % AREAS.len()].to_string(),
        },
        children: vec![Child {
            age_months: (id % 48) as u16,
            name: None,
            gender: None,
        }],
        interests: vec![TAGS[id % TAGS.len()].to_string(), TAGS[(id + 2) % TAGS.len()].to_string()],
        lifestyle: vec![TAGS[(id + 1) % TAGS.len()].to_string()],
        is_active: id % 17 != 0,
        description: None,
        image_file_ids: vec![],
        created_at: None,
    }
}

fn create_viewer() -> Profile {
    let mut viewer = create_candidate(0);
    viewer.user_id = "viewer".to_string();
    viewer.is_active = true;
    viewer.interests = vec!["parks".to_string(), "breastfeeding".to_string()];
    viewer
}

fn bench_compatibility(c: &mut Criterion) {
    let viewer = create_viewer();
    let preferences = FilterPreferences::permissive("viewer");
    let weights = ScoringWeights::default();
    let candidate = create_candidate(7);

    c.bench_function("calculate_compatibility", |b| {
        b.iter(|| {
            calculate_compatibility(
                black_box(&viewer),
                black_box(&preferences),
                black_box(&candidate),
                black_box(&weights),
            )
        });
    });
}

fn bench_build_queue(c: &mut Criterion) {
    let matcher = Matcher::with_default_weights();
    let viewer = create_viewer();
    let preferences = FilterPreferences::permissive("viewer");
    let excluded = HashSet::new();
    let session = SessionSwipeCache::new();

    let mut group = c.benchmark_group("build_queue");

    for candidate_count in [10, 50, 100, 500, 1000].iter() {
        let candidates: Vec<Profile> = (1..=*candidate_count).map(create_candidate).collect();

        group.bench_with_input(
            BenchmarkId::new("recommended", candidate_count),
            candidate_count,
            |b, _| {
                b.iter(|| {
                    matcher.build_queue(
                        black_box(&viewer),
                        black_box(&preferences),
                        black_box(candidates.clone()),
                        &excluded,
                        &session,
                        Strategy::Recommended,
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_rerank(c: &mut Criterion) {
    let matcher = Matcher::with_default_weights();
    let viewer = create_viewer();
    let preferences = FilterPreferences::permissive("viewer");
    let scored = matcher
        .build_queue(
            &viewer,
            &preferences,
            (1..=500).map(create_candidate).collect(),
            &HashSet::new(),
            &SessionSwipeCache::new(),
            Strategy::Recommended,
        )
        .into_candidates();

    let mut group = c.benchmark_group("rank_500");
    for strategy in Strategy::ALL {
        group.bench_function(strategy.as_str(), |b| {
            b.iter(|| rank(black_box(scored.clone()), strategy));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compatibility, bench_build_queue, bench_rerank);

criterion_main!(benches);
