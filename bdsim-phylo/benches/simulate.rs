use bdsim_phylo::birth_death::{
    simulate_continuous_birth_death, simulate_discrete_birth_death, simulate_pure_birth,
    BirthDeathConfig, DiscreteBirthDeathConfig,
};
use bdsim_phylo::protracted::{ProtractedSpeciationModel, PsmOptions, PsmRates};
use bdsim_phylo::taxon::TaxonNamespace;
use bdsim_phylo::yule::fit_yule_model_to_tree;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn bench_continuous(c: &mut Criterion) {
    let mut group = c.benchmark_group("continuous_birth_death");

    let config = BirthDeathConfig {
        birth_rate: 1.0,
        death_rate: 0.3,
        ntax: Some(200),
        ..Default::default()
    };
    group.bench_function("200_tips", |b| {
        let mut rng = StdRng::seed_from_u64(42);
        b.iter(|| simulate_continuous_birth_death(black_box(&config), None, None, &mut rng))
    });

    let gsa = BirthDeathConfig {
        gsa_ntax: Some(400),
        ..config.clone()
    };
    group.bench_function("200_tips_gsa_400", |b| {
        let mut rng = StdRng::seed_from_u64(42);
        b.iter(|| simulate_continuous_birth_death(black_box(&gsa), None, None, &mut rng))
    });

    group.finish();
}

fn bench_discrete(c: &mut Criterion) {
    let mut group = c.benchmark_group("discrete_birth_death");

    let config = DiscreteBirthDeathConfig {
        birth_rate: 0.2,
        death_rate: 0.05,
        ntax: Some(200),
        repeat_until_success: true,
        ..Default::default()
    };
    group.bench_function("200_tips", |b| {
        let mut rng = StdRng::seed_from_u64(42);
        b.iter(|| simulate_discrete_birth_death(black_box(&config), None, None, &mut rng))
    });

    group.finish();
}

fn bench_pure_birth_and_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("yule");

    let ns = TaxonNamespace::with_generated(1_000);
    group.bench_function("simulate_1k_tips", |b| {
        let mut rng = StdRng::seed_from_u64(42);
        b.iter(|| simulate_pure_birth(black_box(&ns), 1.0, &mut rng))
    });

    let mut rng = StdRng::seed_from_u64(7);
    if let Ok(tree) = simulate_pure_birth(&ns, 1.0, &mut rng) {
        group.bench_function("fit_1k_tips", |b| {
            b.iter(|| fit_yule_model_to_tree(black_box(&tree)))
        });
    }

    group.finish();
}

fn bench_protracted(c: &mut Criterion) {
    let mut group = c.benchmark_group("protracted_speciation");

    let rates = PsmRates {
        full_species_birth_rate: 0.5,
        full_species_extinction_rate: 0.1,
        incipient_species_birth_rate: 0.5,
        incipient_species_conversion_rate: 0.5,
        incipient_species_extinction_rate: 0.1,
    };
    if let Ok(psm) = ProtractedSpeciationModel::new(rates) {
        let options = PsmOptions::new(6.0);
        group.bench_function("max_time_6", |b| {
            let mut rng = StdRng::seed_from_u64(42);
            b.iter(|| psm.generate_sample(black_box(&options), &mut rng))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_continuous,
    bench_discrete,
    bench_pure_birth_and_fit,
    bench_protracted
);
criterion_main!(benches);
