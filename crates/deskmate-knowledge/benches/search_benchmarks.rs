//! Benchmarks for FAQ retrieval.
//!
//! The FAQ corpus is small in practice (tens to hundreds of entries), so
//! exhaustive search is expected to stay well under a millisecond. The
//! default run uses 500 entries; set `BENCH_LARGE_FAQ=1` for 10,000.
//!
//! ```bash
//! BENCH_LARGE_FAQ=1 cargo bench -p deskmate-knowledge
//! ```

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use deskmate_core::types::{FaqEntry, IntentLabel};
use deskmate_knowledge::{Embedder, FaqIndex, HashedBagOfWords, KnowledgeBase};

const DEFAULT_FAQ_COUNT: usize = 500;
const LARGE_FAQ_COUNT: usize = 10_000;

const TOPICS: [&str; 8] = [
    "reset password login",
    "update email address profile",
    "refund charged twice invoice",
    "cancel subscription plan",
    "app crashes startup error",
    "delete account permanently",
    "payment method declined card",
    "terrible service disappointed",
];

fn faq_count() -> usize {
    if std::env::var("BENCH_LARGE_FAQ").is_ok() {
        LARGE_FAQ_COUNT
    } else {
        DEFAULT_FAQ_COUNT
    }
}

/// Each question mixes a topic with a unique token so no two embeddings are equal.
fn build_knowledge_base(count: usize, embedder: &HashedBagOfWords) -> KnowledgeBase {
    let entries: Vec<FaqEntry> = (0..count)
        .map(|i| FaqEntry {
            id: format!("faq-{:05}", i),
            question: format!("{} variant{}", TOPICS[i % TOPICS.len()], i),
            answer: format!("Answer {}", i),
            category: String::new(),
            intent: Some(IntentLabel::ALL[i % IntentLabel::ALL.len()]),
        })
        .collect();
    let index = FaqIndex::build(entries, embedder).expect("index build failed");
    assert_eq!(index.len(), count);
    KnowledgeBase::new(index)
}

fn bench_search(c: &mut Criterion) {
    let count = faq_count();
    let embedder = HashedBagOfWords::default();
    let kb = build_knowledge_base(count, &embedder);
    let query = embedder.embed("I forgot my password and cannot login");

    let mut group = c.benchmark_group("faq_search");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function(format!("top3_unfiltered_{}faqs", count), |b| {
        b.iter(|| {
            let matches = kb.search(&query, 3, None).expect("search failed");
            assert_eq!(matches.len(), 3);
            matches
        });
    });

    group.bench_function(format!("top3_intent_filtered_{}faqs", count), |b| {
        b.iter(|| {
            kb.lookup(&query, 3, Some(IntentLabel::Technical))
                .expect("lookup failed")
        });
    });

    group.finish();
}

fn bench_embed(c: &mut Criterion) {
    let embedder = HashedBagOfWords::default();
    c.bench_function("hashed_bow_embed_query", |b| {
        b.iter(|| embedder.embed("How do I reset my password? What if I don't get an email?"));
    });
}

criterion_group!(benches, bench_search, bench_embed);
criterion_main!(benches);
