//! Benchmarks for the local detection pipeline.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use darija_detect::detector::Detector;
use darija_detect::language::DetectionOptions;
use darija_detect::normalize::normalize;
use darija_detect::script::ScriptAnalyzer;

const SAMPLES: &[&str] = &[
    "wach nta mezyan? ana bghit nmchi l casa ghda inchallah",
    "Bonjour, comment allez-vous? J'espère que tout va bien.",
    "مرحبا كيف حالك؟ واش كلشي مزيان؟",
    "je bghit la voiture dyali daba, 3lach ma jitich lbar7?",
];

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize", |bench| {
        bench.iter(|| {
            for s in SAMPLES {
                black_box(normalize(s));
            }
        })
    });
}

fn bench_script(c: &mut Criterion) {
    let analyzer = ScriptAnalyzer::default();
    let normalized: Vec<String> = SAMPLES.iter().map(|s| normalize(s)).collect();
    c.bench_function("script_analyze", |bench| {
        bench.iter(|| {
            for s in &normalized {
                black_box(analyzer.analyze(s));
            }
        })
    });
}

fn bench_detect_local(c: &mut Criterion) {
    let detector = Detector::with_defaults().unwrap();
    let uncached = DetectionOptions {
        bypass_cache: true,
        ..Default::default()
    };
    c.bench_function("detect_local_uncached", |bench| {
        bench.iter(|| {
            for s in SAMPLES {
                black_box(detector.detect_local(s, &uncached));
            }
        })
    });

    let cached = DetectionOptions::default();
    c.bench_function("detect_local_cached", |bench| {
        bench.iter(|| {
            for s in SAMPLES {
                black_box(detector.detect_local(s, &cached));
            }
        })
    });
}

fn bench_batch(c: &mut Criterion) {
    let detector = Detector::with_defaults().unwrap();
    let texts: Vec<&str> = SAMPLES.iter().cycle().take(256).copied().collect();
    let options = DetectionOptions {
        bypass_cache: true,
        ..Default::default()
    };
    c.bench_function("detect_batch_local_256", |bench| {
        bench.iter(|| black_box(detector.detect_batch_local(&texts, &options)))
    });
}

criterion_group!(
    benches,
    bench_normalize,
    bench_script,
    bench_detect_local,
    bench_batch
);
criterion_main!(benches);
