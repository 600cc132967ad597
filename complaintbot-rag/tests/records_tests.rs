//! CSV loading, cleaning and configuration files.

use std::io::Write;
use std::sync::Arc;

use complaintbot_rag::{
    ChunkingStrategy, CleaningOptions, DistanceMetric, HashEmbeddingProvider, InMemoryVectorStore,
    MockGenerator, RagConfig, RagError, RagPipeline, clean_records, load_records,
};

const CSV: &str = "\
Date received,Product,Sub-product,Consumer complaint narrative,Company,Complaint ID
2023-01-02,Credit card,General-purpose,\"I was charged a LATE fee, twice.\",Bank A,101
2023-01-03,Savings account,,,Bank B,102
2023-01-04,Money transfers,Domestic,nan,Bank C,103
2023-01-05,Personal loan,Installment,\"Wrongly charged
for a loan I never took\",Bank D,104
";

fn write_csv(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_required_columns_and_ignores_others() {
    let file = write_csv(CSV);
    let records = load_records(file.path()).unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].complaint_id, "101");
    assert_eq!(records[0].product, "Credit card");
    assert_eq!(records[0].narrative, "I was charged a LATE fee, twice.");
    assert_eq!(records[1].narrative, "");
    assert_eq!(records[3].narrative, "Wrongly charged\nfor a loan I never took");
}

#[test]
fn cleaning_drops_missing_narratives_and_lowercases() {
    let file = write_csv(CSV);
    let records = clean_records(load_records(file.path()).unwrap(), &CleaningOptions::default());
    let ids: Vec<&str> = records.iter().map(|r| r.complaint_id.as_str()).collect();
    assert_eq!(ids, ["101", "104"]);
    assert_eq!(records[0].narrative, "i was charged a late fee, twice.");
}

#[test]
fn missing_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.csv");
    match load_records(&missing) {
        Err(RagError::Load { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected Load error, got {other:?}"),
    }
}

#[test]
fn missing_narrative_column_is_a_load_error() {
    let file = write_csv("Complaint ID,Product\n1,Credit card\n");
    let err = load_records(file.path()).unwrap_err();
    assert!(matches!(err, RagError::Load { message, .. } if message.contains("row 1")));
}

#[tokio::test]
async fn index_csv_loads_cleans_and_indexes() {
    let file = write_csv(CSV);
    let config = RagConfig::builder()
        .data_path(file.path())
        .products(vec!["credit card".into()])
        .build()
        .unwrap();
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(HashEmbeddingProvider::new(32).unwrap()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .generator(Arc::new(MockGenerator::echo()))
        .build()
        .unwrap();
    pipeline.create_collection().await.unwrap();

    let report = pipeline.index_csv(file.path()).await.unwrap();
    assert_eq!((report.records, report.chunks, report.added), (1, 1, 1));
    let stored = pipeline.collection().get(&["101_0"]).await.unwrap();
    assert_eq!(stored[0].text, "i was charged a late fee, twice.");
    assert_eq!(stored[0].metadata.complaint_id, "101");
}

#[test]
fn yaml_config_overrides_only_given_keys() {
    let config = RagConfig::from_yaml_str(
        "
db_path: /tmp/complaints
chunk_size: 300
chunk_overlap: 30
chunking: recursive
distance: l2
generation:
  model: gpt-4o-mini
  max_tokens: 256
",
    )
    .unwrap();
    assert_eq!(config.db_path.to_str(), Some("/tmp/complaints"));
    assert_eq!(config.chunk_size, 300);
    assert_eq!(config.chunking, ChunkingStrategy::Recursive);
    assert_eq!(config.distance, DistanceMetric::L2);
    assert_eq!(config.generation.model, "gpt-4o-mini");
    assert_eq!(config.generation.max_tokens, 256);
    assert_eq!(config.generation.temperature, 0.0);
    assert_eq!(config.top_k, 3);
    assert_eq!(config.collection_name, "financial_complaints");
    assert_eq!(config.embedding.model, "all-MiniLM-L6-v2");
}

#[test]
fn yaml_config_is_validated() {
    let err = RagConfig::from_yaml_str("chunk_size: 10\nchunk_overlap: 20\n").unwrap_err();
    assert!(matches!(err, RagError::Config(msg) if msg.contains("chunk_overlap")));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("complaintbot.yaml");
    std::fs::write(&path, "top_k: [not a number]\n").unwrap();
    assert!(matches!(RagConfig::from_yaml_file(&path), Err(RagError::Config(_))));
}
