//! Property and behaviour tests for the in-memory vector store.

use std::collections::HashMap;

use complaintbot_rag::{
    ChunkMetadata, DistanceMetric, InMemoryVectorStore, IndexedDocument, VectorStore,
};
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

fn metadata() -> ChunkMetadata {
    ChunkMetadata { product: "Personal loan".to_string(), complaint_id: "1".to_string() }
}

/// Generate a document with a normalized embedding.
fn arb_document(dim: usize) -> impl Strategy<Value = IndexedDocument> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_embedding(dim)).prop_map(
        |(id, text, embedding)| IndexedDocument { id, text, embedding, metadata: metadata() },
    )
}

fn document(id: &str, embedding: Vec<f32>) -> IndexedDocument {
    IndexedDocument {
        id: id.to_string(),
        text: format!("chunk {id}"),
        embedding,
        metadata: metadata(),
    }
}

/// **In-memory query ordering**
/// *For any* set of documents stored in an InMemoryVectorStore, querying with
/// a probe vector SHALL return hits ordered by non-decreasing cosine distance,
/// at most `k` of them, each with a distinct id that was stored.
mod prop_inmemory_query_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn hits_ordered_ascending_and_bounded_by_k(
            documents in proptest::collection::vec(arb_document(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (hits, stored) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", DistanceMetric::Cosine).await.unwrap();
                let added = store.upsert("test", &documents).await.unwrap();
                let hits = store.query("test", &query, k).await.unwrap();
                (hits, added)
            });

            let unique: HashMap<&str, ()> = documents.iter().map(|d| (d.id.as_str(), ())).collect();
            prop_assert_eq!(stored, unique.len());

            prop_assert!(hits.len() <= k);
            prop_assert_eq!(hits.len(), k.min(stored));

            for window in hits.windows(2) {
                prop_assert!(
                    window[0].distance <= window[1].distance,
                    "hits not in ascending order: {} > {}",
                    window[0].distance,
                    window[1].distance,
                );
            }
            for hit in &hits {
                prop_assert!(unique.contains_key(hit.id.as_str()));
                prop_assert!((-1e-5..=2.0 + 1e-5).contains(&hit.distance));
            }
        }
    }
}

/// **Set-insert by id**
/// Upserting the same documents any number of times leaves exactly one
/// document per distinct id.
mod prop_inmemory_idempotent_upsert {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn repeated_upserts_do_not_grow_the_collection(
            documents in proptest::collection::vec(arb_document(4), 1..15),
            repeats in 1usize..4,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (first, later, count) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", DistanceMetric::Cosine).await.unwrap();
                let first = store.upsert("test", &documents).await.unwrap();
                let mut later = 0;
                for _ in 0..repeats {
                    later += store.upsert("test", &documents).await.unwrap();
                }
                (first, later, store.count("test").await.unwrap())
            });
            prop_assert_eq!(later, 0);
            prop_assert_eq!(first, count);
        }
    }
}

#[tokio::test]
async fn query_returns_two_nearest_in_order() {
    let store = InMemoryVectorStore::new();
    store.create_collection("c", DistanceMetric::Cosine).await.unwrap();
    store
        .upsert(
            "c",
            &[
                document("far", vec![0.0, 1.0]),
                document("near", vec![1.0, 0.0]),
                document("mid", vec![1.0, 1.0]),
            ],
        )
        .await
        .unwrap();

    let hits = store.query("c", &[1.0, 0.1], 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "near");
    assert_eq!(hits[1].id, "mid");
    assert!(hits[0].distance <= hits[1].distance);
    assert_eq!(hits[0].metadata, metadata());
}

#[tokio::test]
async fn empty_collection_query_is_empty_not_an_error() {
    let store = InMemoryVectorStore::new();
    store.create_collection("c", DistanceMetric::Cosine).await.unwrap();
    assert!(store.query("c", &[0.3, 0.4], 5).await.unwrap().is_empty());
    assert_eq!(store.count("c").await.unwrap(), 0);
}

#[tokio::test]
async fn l2_and_inner_product_collections_rank_by_their_metric() {
    let store = InMemoryVectorStore::new();
    store.create_collection("l2", DistanceMetric::L2).await.unwrap();
    store.create_collection("ip", DistanceMetric::InnerProduct).await.unwrap();
    let docs = [document("small", vec![1.0, 0.0]), document("large", vec![3.0, 0.0])];
    store.upsert("l2", &docs).await.unwrap();
    store.upsert("ip", &docs).await.unwrap();

    let l2 = store.query("l2", &[1.0, 0.0], 1).await.unwrap();
    assert_eq!(l2[0].id, "small");
    let ip = store.query("ip", &[1.0, 0.0], 1).await.unwrap();
    assert_eq!(ip[0].id, "large");
}
