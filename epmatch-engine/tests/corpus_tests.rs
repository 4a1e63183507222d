//! Corpus persistence, filtered search and concurrent access

mod helpers;

use epmatch_engine::{
    Corpus, CorpusRecord, EngineConfig, EpisodeKey, Fingerprint, SearchQuery, SourceFormat,
};
use helpers::{embedding_record, memory_corpus, near_axis};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinSet;

#[tokio::test]
async fn test_series_filter_isolates_near_duplicates() {
    let corpus = memory_corpus().await;
    // A is closest to the query, B and C are near-duplicates of it
    for (series, offset) in [("A", 0.00), ("B", 0.05), ("C", 0.08)] {
        for episode in 1..=3 {
            corpus
                .upsert(embedding_record(series, 1, episode, near_axis(0, offset + episode as f32 * 0.01)))
                .await
                .unwrap();
        }
    }
    let query = Fingerprint::embedding(near_axis(0, 0.0), SourceFormat::Text).unwrap();

    // Without the filter the top 3 are all from A
    let unfiltered = corpus.search(&query, &SearchQuery::new(3));
    assert!(unfiltered.iter().all(|c| c.key.series == "A"));

    let filtered = corpus.search(&query, &SearchQuery::new(3).with_series("B"));
    assert_eq!(filtered.len(), 3);
    assert!(filtered.iter().all(|c| c.key.series == "B"));
    assert_eq!(
        filtered.iter().map(|c| c.rank).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[tokio::test]
async fn test_unknown_series_is_empty_not_error() {
    let corpus = memory_corpus().await;
    corpus
        .upsert(embedding_record("Known", 1, 1, near_axis(2, 0.1)))
        .await
        .unwrap();
    let query = Fingerprint::embedding(near_axis(2, 0.1), SourceFormat::Text).unwrap();

    assert!(corpus
        .search(&query, &SearchQuery::new(10).with_series("Unknown"))
        .is_empty());
    assert_eq!(
        corpus
            .search(&query, &SearchQuery::new(10).with_series("KNOWN"))
            .len(),
        1
    );
}

#[tokio::test]
async fn test_cross_strategy_rows_are_skipped() {
    let corpus = memory_corpus().await;
    corpus
        .upsert(embedding_record("Mixed", 1, 1, near_axis(0, 0.0)))
        .await
        .unwrap();
    corpus
        .upsert(CorpusRecord::new(
            EpisodeKey::new("Mixed", 1, 2),
            None,
            Fingerprint::fuzzy_hash("3:abcdefghij:abcde", SourceFormat::Text).unwrap(),
            "h".to_string(),
        ))
        .await
        .unwrap();

    let embedding_query = Fingerprint::embedding(near_axis(0, 0.0), SourceFormat::Text).unwrap();
    let results = corpus.search(&embedding_query, &SearchQuery::new(10));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key.episode, 1);

    let hash_query = Fingerprint::fuzzy_hash("3:abcdefghij:abcde", SourceFormat::Text).unwrap();
    let results = corpus.search(&hash_query, &SearchQuery::new(10));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key.episode, 2);
    assert_eq!(results[0].similarity, 1.0);
}

#[tokio::test]
async fn test_mismatched_dimension_rows_are_skipped() {
    let corpus = memory_corpus().await;
    corpus
        .upsert(embedding_record("Dims", 1, 1, vec![1.0, 0.0, 0.0]))
        .await
        .unwrap();
    corpus
        .upsert(embedding_record("Dims", 1, 2, near_axis(0, 0.0)))
        .await
        .unwrap();

    let query = Fingerprint::embedding(near_axis(0, 0.0), SourceFormat::Text).unwrap();
    let results = corpus.search(&query, &SearchQuery::new(10));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key.episode, 2);
}

#[tokio::test]
async fn test_corpus_survives_reopen_in_insertion_order() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data").join("corpus.db");

    {
        let corpus = Corpus::open(&path).await.unwrap();
        for episode in [3, 1, 2] {
            corpus
                .upsert(embedding_record("Order", 1, episode, near_axis(5, 0.0)))
                .await
                .unwrap();
        }
        // Replacing episode 3 keeps its original position
        corpus
            .upsert(embedding_record("Order", 1, 3, near_axis(5, 0.0)))
            .await
            .unwrap();
        corpus.store().pool().close().await;
    }

    let reopened = Corpus::open(&path).await.unwrap();
    assert_eq!(reopened.len(), 3);

    let query = Fingerprint::embedding(near_axis(5, 0.0), SourceFormat::Text).unwrap();
    let episodes: Vec<u32> = reopened
        .search(&query, &SearchQuery::new(10))
        .iter()
        .map(|c| c.key.episode)
        .collect();
    assert_eq!(episodes, vec![3, 1, 2]);
}

#[tokio::test]
async fn test_configured_path_opens_and_tolerates_unknown_strategies() {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig {
        corpus_path: Some(temp_dir.path().join("library").join("corpus.db")),
        ..EngineConfig::default()
    };

    {
        let corpus = Corpus::open_configured(&config).await.unwrap();
        for episode in 1..=3 {
            corpus
                .upsert(embedding_record("Future", 1, episode, near_axis(4, 0.0)))
                .await
                .unwrap();
        }
        // A newer build wrote episode 2 with a strategy this one does not know
        sqlx::query("UPDATE corpus SET strategy = 'sparse_lexical' WHERE episode = 2")
            .execute(corpus.store().pool())
            .await
            .unwrap();
        corpus.store().pool().close().await;
    }

    let reopened = Corpus::open_configured(&config).await.unwrap();
    assert_eq!(reopened.len(), 2);
    assert!(reopened.get(&EpisodeKey::new("Future", 1, 2)).is_none());
    assert_eq!(reopened.store().count().await.unwrap(), 3);

    let query = Fingerprint::embedding(near_axis(4, 0.0), SourceFormat::Text).unwrap();
    let episodes: Vec<u32> = reopened
        .search(&query, &SearchQuery::new(10))
        .iter()
        .map(|c| c.key.episode)
        .collect();
    assert_eq!(episodes, vec![1, 3]);
}

#[tokio::test]
async fn test_season_filter() {
    let corpus = memory_corpus().await;
    for season in 1..=3 {
        corpus
            .upsert(embedding_record("Seasons", season, 1, near_axis(1, 0.0)))
            .await
            .unwrap();
    }
    let query = Fingerprint::embedding(near_axis(1, 0.0), SourceFormat::Text).unwrap();
    let results = corpus.search(
        &query,
        &SearchQuery::new(10).with_series("Seasons").with_season(2),
    );
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key.season, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_search_during_upserts() {
    let corpus = memory_corpus().await;
    for episode in 0..20 {
        corpus
            .upsert(embedding_record("Busy", 1, episode, near_axis(episode as usize % 16, 0.2)))
            .await
            .unwrap();
    }

    let mut join_set = JoinSet::new();

    let writer = Arc::clone(&corpus);
    join_set.spawn(async move {
        for episode in 20..80 {
            writer
                .upsert(embedding_record("Busy", 2, episode, near_axis(episode as usize % 16, 0.3)))
                .await
                .unwrap();
        }
        0usize
    });

    for reader in 0..6 {
        let corpus = Arc::clone(&corpus);
        join_set.spawn(async move {
            let query =
                Fingerprint::embedding(near_axis(reader % 16, 0.2), SourceFormat::Text).unwrap();
            let mut searches = 0usize;
            for _ in 0..50 {
                let results = corpus.search(&query, &SearchQuery::new(10));
                assert!(results.len() <= 10);
                let guids: HashSet<_> = results.iter().map(|c| c.guid).collect();
                assert_eq!(guids.len(), results.len());
                assert!(results
                    .windows(2)
                    .all(|w| w[0].similarity >= w[1].similarity));
                searches += 1;
                tokio::task::yield_now().await;
            }
            searches
        });
    }

    let mut completed = 0;
    while let Some(result) = join_set.join_next().await {
        result.expect("Task panicked");
        completed += 1;
    }
    assert_eq!(completed, 7);
    assert_eq!(corpus.len(), 80);
    assert_eq!(corpus.store().count().await.unwrap(), 80);
}
