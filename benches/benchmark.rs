use criterion::{criterion_group, criterion_main, Criterion};
use headline_topics::{DocumentRecord, Pipeline, PipelineConfig, Tokenizer};
use rand::{rngs::StdRng, seq::IndexedRandom, Rng, SeedableRng};

const THEMES: [&[&str]; 4] = [
    &["stocks", "markets", "shares", "trading", "investors", "banks", "rally", "slump"],
    &["storm", "rain", "flooding", "weather", "winds", "drought", "heatwave", "snow"],
    &["election", "voters", "minister", "council", "parliament", "campaign", "policy", "senate"],
    &["football", "cricket", "players", "coach", "championship", "finals", "season", "injury"],
];

/// Synthetic headlines, each drawn mostly from one theme.
fn headlines(n: usize) -> Vec<DocumentRecord> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..n)
        .map(|i| {
            let theme = THEMES[rng.random_range(0..THEMES.len())];
            let len = rng.random_range(4..8);
            let words: Vec<&str> = (0..len)
                .map(|_| {
                    let pool = if rng.random::<f64>() < 0.85 {
                        theme
                    } else {
                        THEMES[rng.random_range(0..THEMES.len())]
                    };
                    *pool.choose(&mut rng).unwrap_or(&"news")
                })
                .collect();
            DocumentRecord::new(format!("{}", 20200101 + i % 28), words.join(" "))
        })
        .collect()
}

fn pipeline_benchmark(c: &mut Criterion) {
    let records = headlines(5_000);
    let config = PipelineConfig {
        min_doc_count: 5,
        num_topics: 4,
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::with_tokenizer(config, Tokenizer::new()).expect("valid config");

    c.bench_function("prepare", |b| {
        b.iter(|| pipeline.prepare(&records).expect("prepare"))
    });

    let prepared = pipeline.prepare(&records).expect("prepare");
    c.bench_function("train", |b| {
        b.iter(|| pipeline.train(&prepared).expect("train"))
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
