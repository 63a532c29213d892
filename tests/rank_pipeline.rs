//! End-to-end ranking pipeline tests over the mock backend.

use std::sync::Arc;

use serde_json::json;

use crossrank::{
    COMPONENT_TYPE, Document, MockBackend, RankerConfig, RankerError, SimilarityRanker,
};

#[test]
fn ranks_filters_and_truncates_in_one_run() {
    let config = RankerConfig::new("model")
        .with_scale_score(false)
        .with_score_threshold(0.0)
        .with_top_k(2)
        .with_query_prefix("query: ")
        .with_document_prefix("passage: ")
        .with_meta_fields_to_embed(["city"]);

    let backend = Arc::new(MockBackend::with_logits(vec![0.2, -1.0, 0.9, 0.4]));
    let mut ranker = SimilarityRanker::new(config).unwrap();
    ranker.warm_up_mock(Arc::clone(&backend));
    assert!(ranker.is_warmed_up());

    let documents = vec![
        Document::new("a capital").with_meta("city", "Berlin"),
        Document::new("a capital").with_meta("city", "Belgrade"),
        Document::new("a capital").with_meta("city", "Sarajevo"),
        Document::new("a capital").with_meta("city", "Vienna"),
    ];

    let output = ranker
        .run("City in Bosnia and Herzegovina", documents, None)
        .unwrap();

    // Threshold drops the -1.0 document, top_k keeps the best two.
    assert_eq!(output.documents.len(), 2);
    assert_eq!(
        output.documents[0].meta.get("city"),
        Some(&json!("Sarajevo"))
    );
    assert_eq!(output.documents[1].meta.get("city"), Some(&json!("Vienna")));
    assert_eq!(output.documents[0].score, Some(0.9));
    assert_eq!(output.documents[1].score, Some(0.4));

    // Prefixes and meta embedding show up in the tokenized pair texts.
    let pairs = backend.recorded_pairs();
    assert_eq!(pairs[0].0, "query: City in Bosnia and Herzegovina");
    assert_eq!(pairs[0].1, "passage: Berlin\na capital");
}

#[test]
fn config_round_trips_through_json_text() {
    let config = RankerConfig::new("my_model")
        .with_top_k(5)
        .with_scale_score(false)
        .with_calibration_factor(None)
        .with_score_threshold(0.25);

    let data = config.to_dict().unwrap();
    let text = serde_json::to_string(&data).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(parsed["type"], COMPONENT_TYPE);
    let back = RankerConfig::from_dict(&parsed).unwrap();
    assert_eq!(back, config);
}

#[test]
fn ranker_rebuilds_from_serialized_mapping() {
    let data = json!({
        "type": COMPONENT_TYPE,
        "init_parameters": {"model": "my_model", "top_k": 1, "scale_score": false, "calibration_factor": null},
    });

    let mut ranker = SimilarityRanker::from_dict(&data).unwrap();
    assert_eq!(ranker.config().model, "my_model");

    ranker.warm_up_mock(Arc::new(MockBackend::with_logits(vec![0.3, 0.8])));
    let output = ranker
        .run("q", vec![Document::new("a"), Document::new("b")], None)
        .unwrap();
    assert_eq!(output.documents.len(), 1);
    assert_eq!(output.documents[0].content, "b");
}

#[test]
fn output_serializes_with_documents_field() {
    let config = RankerConfig::new("model").with_scale_score(false);
    let mut ranker = SimilarityRanker::new(config).unwrap();
    ranker.warm_up_mock(Arc::new(MockBackend::with_logits(vec![1.5])));

    let output = ranker.run("q", vec![Document::new("doc")], None).unwrap();
    let value = serde_json::to_value(&output).unwrap();

    assert_eq!(
        value,
        json!({"documents": [{"content": "doc", "score": 1.5}]})
    );
}

#[test]
fn run_without_warm_up_reports_usage_error() {
    let ranker = SimilarityRanker::new(RankerConfig::default()).unwrap();
    let err = ranker
        .run("q", vec![Document::new("doc")], None)
        .unwrap_err();
    assert!(matches!(err, RankerError::NotWarmedUp));
    assert!(err.to_string().contains("warm_up"));
}
