//! Property tests for the chunkers.

use complaintbot_rag::{Chunker, ComplaintRecord, FixedSizeChunker, RagError, RecursiveChunker};
use proptest::prelude::*;

/// Chunk sizes with an overlap strictly below them.
fn arb_window() -> impl Strategy<Value = (usize, usize)> {
    (1usize..40).prop_flat_map(|size| (Just(size), 0..size))
}

/// Mixed ASCII and multi-byte text with the separators the recursive chunker uses.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            "[a-z]{1,12}",
            Just(" ".to_string()),
            Just(". ".to_string()),
            Just("\n".to_string()),
            Just("\n\n".to_string()),
            "[éüñ€]{1,3}",
        ],
        0..40,
    )
    .prop_map(|parts| parts.concat())
}

/// **Fixed windows are deterministic and cover the text exactly.**
/// Dropping the first `overlap` characters of every chunk after the first and
/// concatenating reproduces the input; every chunk but the last is exactly
/// `chunk_size` characters long.
mod prop_fixed_windows {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn windows_reassemble_to_input((size, overlap) in arb_window(), text in arb_text()) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let chunks = chunker.split(&text);
            prop_assert_eq!(&chunks, &chunker.split(&text));

            if text.is_empty() {
                prop_assert!(chunks.is_empty());
                return Ok(());
            }

            let mut rebuilt = chunks[0].clone();
            for chunk in &chunks[1..] {
                rebuilt.extend(chunk.chars().skip(overlap));
            }
            prop_assert_eq!(rebuilt, text.clone());

            let (last, full) = chunks.split_last().unwrap();
            for chunk in full {
                prop_assert_eq!(chunk.chars().count(), size);
            }
            prop_assert!(last.chars().count() <= size);
            prop_assert!(!last.is_empty());
        }

        #[test]
        fn short_text_is_a_single_chunk(
            text in "[a-z]{1,40}",
            extra in 0usize..5,
            overlap in 0usize..40,
        ) {
            let size = text.chars().count() + extra;
            let overlap = overlap % size;
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            prop_assert_eq!(chunker.split(&text), vec![text.clone()]);
        }
    }
}

/// **Recursive chunks respect the size bound.**
/// Every chunk is non-empty, trimmed, and at most `chunk_size` characters.
mod prop_recursive_bounds {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_are_bounded_and_trimmed((size, overlap) in arb_window(), text in arb_text()) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let chunks = chunker.split(&text);
            prop_assert_eq!(&chunks, &chunker.split(&text));
            for chunk in &chunks {
                prop_assert!(!chunk.is_empty());
                prop_assert_eq!(chunk.trim(), chunk.as_str());
                prop_assert!(
                    chunk.chars().count() <= size,
                    "chunk {:?} longer than {}",
                    chunk,
                    size
                );
            }
            if text.trim().is_empty() {
                prop_assert!(chunks.is_empty());
            } else {
                prop_assert!(!chunks.is_empty());
            }
        }
    }
}

#[test]
fn reference_example() {
    let chunker = FixedSizeChunker::new(5, 2).unwrap();
    assert_eq!(chunker.split("abcdefghij"), vec!["abcde", "defgh", "ghij"]);
    assert!(chunker.split("").is_empty());
}

#[test]
fn overlap_not_below_size_is_rejected() {
    for (size, overlap) in [(5, 5), (5, 7), (0, 0)] {
        assert!(matches!(FixedSizeChunker::new(size, overlap), Err(RagError::Config(_))));
        assert!(matches!(RecursiveChunker::new(size, overlap), Err(RagError::Config(_))));
    }
}

#[test]
fn chunk_ids_are_stable_across_runs() {
    let record =
        ComplaintRecord::new("3141", "Credit card", "charged a late fee after paying on time");
    let chunker = FixedSizeChunker::new(16, 4).unwrap();
    let first: Vec<String> = chunker.chunk_record(&record).iter().map(|c| c.id()).collect();
    let second: Vec<String> = chunker.chunk_record(&record).iter().map(|c| c.id()).collect();
    assert_eq!(first, second);
    assert_eq!(first, ["3141_0", "3141_1", "3141_2"]);
}
