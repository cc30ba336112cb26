//! Criterion benchmarks for Glaive.
//!
//! Covers the hot paths of a search:
//! - Boolean conjunctions and disjunctions
//! - Exact and sloppy phrase matching
//! - Sorted search and highlighting

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use glaive::lexical::memory::MemoryIndex;
use glaive::query::Query;
use glaive::query::boolean::BooleanQuery;
use glaive::query::phrase::PhraseQuery;
use glaive::query::term::TermQuery;
use glaive::search::highlight::HighlightOptions;
use glaive::search::searcher::{IndexSearcher, SearchRequest, Searcher};
use glaive::search::sort::{Sort, SortField, SortType};

/// Generate test documents for benchmarking.
fn generate_test_documents(count: usize) -> Vec<String> {
    let words = [
        "search",
        "engine",
        "full",
        "text",
        "index",
        "query",
        "document",
        "field",
        "term",
        "phrase",
        "boolean",
        "similarity",
        "relevance",
        "score",
        "analysis",
        "posting",
        "segment",
        "storage",
        "retrieval",
        "ranking",
        "filtering",
    ];

    let mut documents = Vec::with_capacity(count);
    for i in 0..count {
        let doc_length = 20 + (i % 60); // Variable length documents
        let mut doc_words = Vec::with_capacity(doc_length);

        for j in 0..doc_length {
            let word_idx = (i * 7 + j * 13) % words.len(); // Pseudo-random distribution
            doc_words.push(words[word_idx]);
        }

        documents.push(doc_words.join(" "));
    }

    documents
}

fn build_searcher(count: usize) -> IndexSearcher {
    let mut index = MemoryIndex::new();
    for (i, text) in generate_test_documents(count).iter().enumerate() {
        let id = format!("{:06}", i * 31 % count);
        index
            .add_document(&[("body", text.as_str()), ("id", id.as_str())])
            .unwrap();
    }
    IndexSearcher::new(Arc::new(index))
}

fn term(text: &str) -> TermQuery {
    TermQuery::new("body", text)
}

/// Benchmark boolean queries.
fn bench_boolean_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("boolean_search");
    let searcher = build_searcher(5000);
    let request = SearchRequest::new();

    let conjunction: Query = BooleanQuery::new()
        .must(term("search"))
        .must(term("index"))
        .into();
    group.bench_function("conjunction", |b| {
        b.iter(|| black_box(searcher.search(black_box(&conjunction), &request).unwrap()))
    });

    let disjunction: Query = BooleanQuery::new()
        .should(term("query"))
        .should(term("score"))
        .should(term("posting"))
        .must_not(term("storage"))
        .into();
    group.bench_function("disjunction", |b| {
        b.iter(|| black_box(searcher.search(black_box(&disjunction), &request).unwrap()))
    });

    let min_match: Query = BooleanQuery::new()
        .should(term("query"))
        .should(term("score"))
        .should(term("posting"))
        .should(term("segment"))
        .with_min_should_match(2)
        .into();
    group.bench_function("min_should_match", |b| {
        b.iter(|| black_box(searcher.search(black_box(&min_match), &request).unwrap()))
    });

    group.finish();
}

/// Benchmark phrase queries.
fn bench_phrase_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("phrase_search");
    let searcher = build_searcher(5000);
    let request = SearchRequest::new();

    let exact: Query = PhraseQuery::new("body")
        .term("search", 1)
        .term("text", 1)
        .into();
    group.bench_function("exact_phrase", |b| {
        b.iter(|| black_box(searcher.search(black_box(&exact), &request).unwrap()))
    });

    let sloppy: Query = PhraseQuery::new("body")
        .term("search", 1)
        .term("query", 1)
        .with_slop(4)
        .into();
    group.bench_function("sloppy_phrase", |b| {
        b.iter(|| black_box(searcher.search(black_box(&sloppy), &request).unwrap()))
    });

    group.finish();
}

/// Benchmark sorting and highlighting.
fn bench_search_extras(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_extras");
    let searcher = build_searcher(2000);
    let query: Query = term("ranking").into();

    let sorted = SearchRequest::new().sort(Sort::new(vec![SortField::new("id", SortType::String)]));
    group.bench_function("sorted_by_field", |b| {
        b.iter(|| black_box(searcher.search(black_box(&query), &sorted).unwrap()))
    });

    let options = HighlightOptions::new().excerpt_length(60).num_excerpts(2);
    group.throughput(Throughput::Elements(50));
    group.bench_function("highlight", |b| {
        b.iter(|| {
            for doc in 0..50 {
                let excerpts = searcher.highlight(&query, doc, "body", &options);
                let _ = black_box(excerpts);
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_boolean_search,
    bench_phrase_search,
    bench_search_extras
);

criterion_main!(benches);
