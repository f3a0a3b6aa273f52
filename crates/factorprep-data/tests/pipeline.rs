use factorprep_core::{IndexerConfig, PrepError, SamplerConfig};
use factorprep_data::prelude::*;
use factorprep_data::PairwiseBatch;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Six interactions, three users, five items.
fn columns() -> (FeatureColumns, IdentityColumns) {
    let columns = FeatureColumns::new(6)
        .numerical("age", vec![0.2, 0.2, 0.5, 0.5, 0.9, 0.9])
        .numerical("price", vec![1.0, 4.0, 2.0, 1.0, 3.0, 4.0])
        .categorical("sex", ["F", "F", "M", "M", "F", "F"])
        .categorical("genre", [3i64, 1, 2, 3, 1, 1])
        .categorical("city", ["oslo", "oslo", "rome", "rome", "lima", "lima"]);
    let ids = IdentityColumns::new(vec![0, 0, 1, 1, 2, 2], vec![0, 1, 2, 0, 3, 1]);
    (columns, ids)
}

#[test]
fn fit_transform_sample_end_to_end() {
    init_tracing();
    let (columns, ids) = columns();

    let (index, encoded) = FeatureIndexer::new(IndexerConfig::new())
        .expect("indexer")
        .fit(&columns, None)
        .expect("fit");
    // 2 numerical + sex{F,M} + genre{1,2,3} + city{lima,oslo,rome}
    assert_eq!(index.feature_size(), 10);
    assert_eq!(encoded.n_cols(), 5);

    // Refitting gives the same layout.
    let (again, _) = FeatureIndexer::new(IndexerConfig::new())
        .expect("indexer")
        .fit(&columns, None)
        .expect("fit");
    assert_eq!(index, again);

    let dataset = InteractionDataset::from_encoded(
        &index,
        &encoded,
        &ids,
        &["price", "genre"],
        3,
        5,
    )
    .expect("dataset");
    let table = ItemFeatureTable::from_dataset(&dataset, index.oov_index());
    let consumed =
        ConsumedRegistry::from_interactions(dataset.users(), dataset.items()).expect("registry");

    // Item 4 never occurs.
    assert!(table
        .sparse_row(4)
        .iter()
        .all(|&i| i == index.oov_index()));

    let config = SamplerConfig::builder(2).seed(7).shuffle(false).build().expect("config");
    let batch = FeatureNegativeSampler::new(&dataset, &table, &consumed, config)
        .expect("sampler")
        .sample()
        .expect("sample");

    assert_eq!(batch.len(), 18);
    assert_eq!(batch.sparse().ncols(), 3);
    assert_eq!(batch.dense().expect("dense").ncols(), 2);
    for k in 0..batch.len() {
        let user = batch.users()[k];
        let item = batch.items()[k];
        let row = batch.sparse().row(k);
        let source = dataset.sparse_row(k / 3);

        // sex and city are user-side and follow the interaction.
        assert_eq!(row[0], source[0]);
        assert_eq!(row[2], source[2]);
        // genre is item-side and follows the emitted item.
        assert_eq!(row[1], table.sparse_row(item)[0]);

        if k % 3 == 0 {
            assert_eq!(batch.labels()[k], 1.0);
            assert_eq!(row, source);
        } else {
            assert_eq!(batch.labels()[k], 0.0);
            assert!(!consumed.contains(user, item));
        }
    }
}

#[test]
fn transform_reuses_fitted_layout() {
    let (columns, _) = columns();
    let (index, encoded) = FeatureIndexer::new(IndexerConfig::new())
        .expect("indexer")
        .fit(&columns, None)
        .expect("fit");

    let again = index.transform(&columns, None).expect("transform");
    assert_eq!(again, encoded);

    let unseen = FeatureColumns::new(1)
        .numerical("age", vec![0.4])
        .numerical("price", vec![9.0])
        .categorical("sex", ["X"])
        .categorical("genre", [1i64])
        .categorical("city", ["oslo"]);
    let out = index.transform(&unseen, None).expect("transform");
    let row = out.indices().row(0);
    assert_eq!(row[2], index.feature_size());
    assert_eq!(row[3], index.vocabulary("genre").expect("genre").offset());
    assert_eq!(out.values()[[0, 2]], 1.0);
}

#[test]
fn persisted_index_encodes_identically() {
    let (columns, ids) = columns();
    let config = IndexerConfig::with_identity(3, 5);
    let (index, encoded) = FeatureIndexer::new(config)
        .expect("indexer")
        .fit(&columns, Some(&ids))
        .expect("fit");
    assert_eq!(index.feature_size(), 18);

    let json = serde_json::to_string(&index).expect("serialize");
    let restored: FeatureIndex = serde_json::from_str(&json).expect("deserialize");
    let again = restored.transform(&columns, Some(&ids)).expect("transform");
    assert_eq!(again, encoded);
}

#[test]
fn shuffled_batches_stay_row_aligned() {
    let (columns, ids) = columns();
    let (index, encoded) = FeatureIndexer::new(IndexerConfig::new())
        .expect("indexer")
        .fit(&columns, None)
        .expect("fit");
    let dataset =
        InteractionDataset::from_encoded(&index, &encoded, &ids, &["price", "genre"], 3, 5)
            .expect("dataset");
    let table = ItemFeatureTable::from_dataset(&dataset, index.oov_index());
    let consumed =
        ConsumedRegistry::from_interactions(dataset.users(), dataset.items()).expect("registry");

    let base = SamplerConfig::builder(3).seed(13).chunk_size(2);
    let plain = FeatureNegativeSampler::new(
        &dataset,
        &table,
        &consumed,
        base.clone().shuffle(false).build().expect("config"),
    )
    .expect("sampler")
    .sample()
    .expect("sample");
    let shuffled = FeatureNegativeSampler::new(
        &dataset,
        &table,
        &consumed,
        base.shuffle(true).parallel(true).build().expect("config"),
    )
    .expect("sampler")
    .sample()
    .expect("sample");

    let key = |b: &TrainingBatch, k: usize| {
        (
            b.users()[k],
            b.items()[k],
            b.sparse().row(k).to_vec(),
            b.labels()[k] as u8,
        )
    };
    let mut left: Vec<_> = (0..plain.len()).map(|k| key(&plain, k)).collect();
    let mut right: Vec<_> = (0..shuffled.len()).map(|k| key(&shuffled, k)).collect();
    left.sort();
    right.sort();
    assert_eq!(left, right);

    let sizes: Vec<_> = shuffled.mini_batches(10).map(|b| b.len()).collect();
    assert_eq!(sizes, vec![10, 10, 4]);
}

#[test]
fn pairwise_triples_from_interactions() {
    let (_, ids) = columns();
    let consumed = ConsumedRegistry::from_interactions(ids.users(), ids.items()).expect("registry");
    let config = SamplerConfig::builder(4).seed(2).build().expect("config");
    let triples: PairwiseBatch =
        PairwiseSampler::new(ids.users(), ids.items(), &consumed, 3, 5, config)
            .expect("sampler")
            .sample()
            .expect("sample");

    assert_eq!(triples.len(), 24);
    for k in 0..triples.len() {
        let user = triples.users()[k];
        assert!(consumed.contains(user, triples.items_pos()[k]));
        assert!(!consumed.contains(user, triples.items_neg()[k]));
    }
}

#[test]
fn saturated_user_is_an_error_not_a_hang() {
    let ids = IdentityColumns::new(vec![0, 0], vec![0, 1]);
    let consumed = ConsumedRegistry::from_interactions(ids.users(), ids.items()).expect("registry");
    let config = SamplerConfig::builder(1).build().expect("config");
    let err = PairwiseSampler::new(ids.users(), ids.items(), &consumed, 1, 2, config)
        .expect("sampler")
        .sample()
        .unwrap_err();
    assert!(matches!(err, PrepError::SaturatedUser { user: 0, n_items: 2 }));
}
