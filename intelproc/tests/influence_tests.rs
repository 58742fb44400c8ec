//! Feature influence retrieval through the processor
//!
//! Covers algorithm precedence, SHAP misses, QII job launching, staleness
//! of error score influences and feature map validation.

#[path = "testutils/mod.rs"]
mod testutils;

use chrono::{Duration, Utc};

use intelproc::{
    CacheKey, ExplanationAlgorithmType, ExplanationCacheType, InfluenceQuery, NumericTable,
    OperationType, ProcessorError, RealizedBackgroundDataSplitInfo, ScoreType,
};
use testutils::{base_split, ctx, features, Fixture, FixtureBuilder, BASE_SPLIT, MODEL, NUM_ROWS};

fn key(score_type: ScoreType, cache_type: ExplanationCacheType) -> CacheKey {
    CacheKey::new(
        MODEL,
        BASE_SPLIT,
        &RealizedBackgroundDataSplitInfo::new(BASE_SPLIT),
        score_type,
        Some(cache_type),
    )
    .unwrap()
}

fn influences(value: f64) -> NumericTable {
    let rows = (0..NUM_ROWS).map(|_| vec![value, -value]).collect();
    NumericTable::from_rows((0..NUM_ROWS).collect(), features(), rows).unwrap()
}

#[test]
fn test_shap_miss_is_not_found() {
    let mut builder = FixtureBuilder::new();
    builder.client.use_shap = true;
    let mut fixture = builder.build();

    let err = fixture
        .processor
        .get_infs(&ctx(), &InfluenceQuery::new(MODEL))
        .unwrap_err();
    assert!(matches!(err, ProcessorError::NotFound(ref msg) if msg.contains("not precomputed")));

    let err = fixture
        .processor
        .get_inf(&ctx(), &InfluenceQuery::new(MODEL))
        .unwrap_err();
    assert!(matches!(err, ProcessorError::NotFound(_)));
    assert!(fixture.launched_jobs().is_empty());
    assert_eq!(fixture.remote_call_count(), 0);
}

#[test]
fn test_qii_cold_cache_launches_job() {
    let mut fixture = Fixture::new();

    let result = fixture
        .processor
        .get_infs(&ctx(), &InfluenceQuery::new(MODEL).with_count(4))
        .unwrap();
    assert!(result.is_operations());

    let jobs = fixture.launched_jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].operation, OperationType::FeatureInfluence);
    assert_eq!((jobs[0].range.start, jobs[0].range.stop), (0, 4));
    assert_eq!(
        jobs[0].background.as_ref().map(|bg| bg.id.as_str()),
        Some(BASE_SPLIT)
    );
}

#[test]
fn test_count_defaults_and_is_clamped() {
    let mut fixture = Fixture::new();

    fixture
        .processor
        .get_infs(&ctx(), &InfluenceQuery::new(MODEL))
        .unwrap();

    // default of 1000 clamped to the split size
    assert_eq!(fixture.launched_jobs()[0].range.stop, NUM_ROWS);
}

#[test]
fn test_ingested_influences_served() {
    let mut fixture = Fixture::new();
    fixture
        .processor
        .add_feature_influences(
            &key(ScoreType::Logits, ExplanationCacheType::FeatureInfluence),
            &influences(0.5),
        )
        .unwrap();

    let (table, algorithm) = fixture
        .processor
        .get_infs(&ctx(), &InfluenceQuery::new(MODEL).with_count(5))
        .unwrap()
        .into_value()
        .expect("cached influences");

    assert_eq!(algorithm, ExplanationAlgorithmType::Qii);
    assert_eq!(table.num_rows(), 5);
    assert_eq!(table.columns, features());
    assert_eq!(table.column("income").unwrap(), vec![-0.5; 5]);
    assert!(fixture.launched_jobs().is_empty());

    let (row, _) = fixture
        .processor
        .get_inf(&ctx(), &InfluenceQuery::new(MODEL).at_index(7))
        .unwrap();
    assert_eq!(row.index, vec![7]);
    assert_eq!(fixture.remote_call_count(), 0);
}

#[test]
fn test_shap_lookup_precedence() {
    let mut builder = FixtureBuilder::new();
    builder.client.use_shap = true;
    let mut fixture = builder.build();
    fixture
        .processor
        .add_feature_influences(
            &key(ScoreType::Logits, ExplanationCacheType::FeatureInfluenceKernelShap),
            &influences(1.0),
        )
        .unwrap();
    fixture
        .processor
        .add_feature_influences(
            &key(
                ScoreType::Logits,
                ExplanationCacheType::FeatureInfluenceTreeShapInterventional,
            ),
            &influences(2.0),
        )
        .unwrap();

    let (table, algorithm) = fixture
        .processor
        .get_infs(&ctx(), &InfluenceQuery::new(MODEL))
        .unwrap()
        .into_value()
        .unwrap();

    assert_eq!(algorithm, ExplanationAlgorithmType::TreeShapInterventional);
    assert_eq!(table.column("age").unwrap()[0], 2.0);
}

#[test]
fn test_partial_shap_cache_falls_through() {
    let mut builder = FixtureBuilder::new();
    builder.client.use_shap = true;
    let mut fixture = builder.build();
    let partial = NumericTable::from_rows(vec![0, 1], features(), vec![vec![3.0, 3.0]; 2]).unwrap();
    fixture
        .processor
        .add_feature_influences(
            &key(
                ScoreType::Logits,
                ExplanationCacheType::FeatureInfluenceTreeShapInterventional,
            ),
            &partial,
        )
        .unwrap();
    fixture
        .processor
        .add_feature_influences(
            &key(ScoreType::Logits, ExplanationCacheType::FeatureInfluenceKernelShap),
            &influences(1.0),
        )
        .unwrap();

    let (_, algorithm) = fixture
        .processor
        .get_infs(&ctx(), &InfluenceQuery::new(MODEL))
        .unwrap()
        .into_value()
        .unwrap();

    assert_eq!(algorithm, ExplanationAlgorithmType::KernelShap);
}

#[test]
fn test_stale_error_influences_evicted() {
    let mut builder = FixtureBuilder::new();
    builder.split = base_split().with_updated_on(Utc::now() + Duration::hours(1));
    let mut fixture = builder.build();
    fixture
        .processor
        .add_feature_influences(
            &key(ScoreType::LogLoss, ExplanationCacheType::FeatureInfluence),
            &influences(0.5),
        )
        .unwrap();

    let result = fixture
        .processor
        .get_infs(
            &ctx(),
            &InfluenceQuery::new(MODEL).with_score_type(ScoreType::LogLoss),
        )
        .unwrap();

    assert!(result.is_operations());
    assert_eq!(fixture.processor.cache_stats().feature_influences.entries, 0);
}

#[test]
fn test_stale_influences_kept_when_record_not_covered() {
    let mut builder = FixtureBuilder::new();
    builder.split = base_split().with_updated_on(Utc::now() + Duration::hours(1));
    let mut fixture = builder.build();
    let partial =
        NumericTable::from_rows(vec![0, 1], features(), vec![vec![0.5, -0.5]; 2]).unwrap();
    fixture
        .processor
        .add_feature_influences(
            &key(ScoreType::LogLoss, ExplanationCacheType::FeatureInfluence),
            &partial,
        )
        .unwrap();

    let (_, algorithm) = fixture
        .processor
        .get_inf(
            &ctx(),
            &InfluenceQuery::new(MODEL)
                .with_score_type(ScoreType::LogLoss)
                .at_index(7),
        )
        .unwrap();

    assert_eq!(algorithm, ExplanationAlgorithmType::Qii);
    assert_eq!(fixture.remote_call_count(), 1);
    assert_eq!(fixture.processor.cache_stats().feature_influences.entries, 1);

    let (row, _) = fixture
        .processor
        .get_inf(
            &ctx(),
            &InfluenceQuery::new(MODEL)
                .with_score_type(ScoreType::LogLoss)
                .at_index(1),
        )
        .unwrap();
    assert_eq!(row.index, vec![1]);
    assert_eq!(fixture.remote_call_count(), 2);
    assert_eq!(fixture.processor.cache_stats().feature_influences.entries, 0);
}

#[test]
fn test_fresh_error_influences_served() {
    let mut builder = FixtureBuilder::new();
    builder.split = base_split().with_updated_on(Utc::now() - Duration::hours(1));
    let mut fixture = builder.build();
    fixture
        .processor
        .add_feature_influences(
            &key(ScoreType::LogLoss, ExplanationCacheType::FeatureInfluence),
            &influences(0.5),
        )
        .unwrap();

    let result = fixture
        .processor
        .get_infs(
            &ctx(),
            &InfluenceQuery::new(MODEL).with_score_type(ScoreType::LogLoss),
        )
        .unwrap();

    assert!(!result.is_operations());
}

#[test]
fn test_single_influence_computed_remotely() {
    let mut fixture = Fixture::new();

    let (table, algorithm) = fixture
        .processor
        .get_inf(&ctx(), &InfluenceQuery::new(MODEL).at_index(6))
        .unwrap();

    assert_eq!(algorithm, ExplanationAlgorithmType::Qii);
    assert_eq!(table.index, vec![6]);
    assert_eq!(table.columns, features());
    assert_eq!(fixture.remote_call_count(), 1);
    assert!(fixture.launched_jobs().is_empty());
}

#[test]
fn test_feature_map_required_when_transforms_differ() {
    let mut builder = FixtureBuilder::new();
    builder.split = base_split()
        .with_transform_locators("s3://pre", "s3://post")
        .with_processed_feature_names(vec!["age_scaled".to_string(), "income_log".to_string()]);
    let mut fixture = builder.build();

    let err = fixture
        .processor
        .get_infs(&ctx(), &InfluenceQuery::new(MODEL))
        .unwrap_err();

    assert!(matches!(err, ProcessorError::InvalidArgument(ref msg) if msg.contains("feature map")));
    assert!(fixture.launched_jobs().is_empty());
}

#[test]
fn test_configured_background_split_used() {
    let mut builder = FixtureBuilder::new();
    builder.client.background_split = Some("background".to_string());
    builder.split = base_split();
    let mut fixture = builder.build();

    fixture
        .processor
        .get_infs(&ctx(), &InfluenceQuery::new(MODEL))
        .unwrap();

    let jobs = fixture.launched_jobs();
    assert_eq!(
        jobs[0].background.as_ref().map(|bg| bg.id.as_str()),
        Some("background")
    );
}
