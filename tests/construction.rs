//! End-to-end build and query tests over real journal shards.

mod common;

use common::{Shard, build_index, write_shards};
use rindex::construction::{AbortHandle, BuildOutcome, ReverseIndexConstructor, identity_rewriter};
use rindex::index::{IndexHandle, ReaderOptions, ReverseIndexReader};
use rindex::journal::{JournalFileSource, allocate_journal_name};
use rindex::query::{AllOf, QueryFilter};
use std::fs;
use tempfile::tempdir;

fn two_shard_example() -> Vec<Shard> {
    vec![
        vec![
            (5, vec![(100, 0b0001)]),
            (9, vec![(100, 0b0010)]),
            (20, vec![(100, 0b0001)]),
        ],
        vec![(9, vec![(100, 0b1000)]), (30, vec![(100, 0b0001)])],
    ]
}

#[test]
fn test_two_shards_merge_into_one_term() {
    let dir = tempdir().unwrap();
    let built = build_index(dir.path(), &two_shard_example());

    for reader in built.readers() {
        assert_eq!(
            reader.documents(100).collect::<Vec<_>>(),
            vec![5, 9, 20, 30]
        );
        assert_eq!(reader.get_term_meta(100, &[9]), vec![0b1010]);
        assert_eq!(reader.num_documents(100), 4);
        assert_eq!(reader.documents(200).count(), 0);
    }

    assert_eq!(built.report.terms, 1);
    assert_eq!(built.report.postings, 4);
}

#[test]
fn test_shard_order_does_not_change_output() {
    let mut shards = two_shard_example();
    shards.push(vec![(1, vec![(7, 1), (100, 4)]), (40, vec![(7, 2)])]);
    shards.push(vec![(9, vec![(7, 8)])]);

    let forward = tempdir().unwrap();
    let a = build_index(forward.path(), &shards);

    shards.reverse();
    let backward = tempdir().unwrap();
    let b = build_index(backward.path(), &shards);

    assert_eq!(fs::read(&a.words).unwrap(), fs::read(&b.words).unwrap());
    assert_eq!(fs::read(&a.docs).unwrap(), fs::read(&b.docs).unwrap());
}

#[test]
fn test_empty_input_dir_builds_nothing() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();

    let outcome = ReverseIndexConstructor::new(
        out.join("docs.dat"),
        out.join("words.dat"),
        &out,
        JournalFileSource,
        identity_rewriter(),
    )
    .create_reverse_index(dir.path())
    .unwrap();

    assert_eq!(outcome, BuildOutcome::NoInput);
    assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn test_corrupt_shard_fails_whole_build() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("journal");
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    write_shards(&input, &two_shard_example());

    let bad = allocate_journal_name(&input, 2);
    fs::write(&bad, b"not a journal shard").unwrap();

    let err = ReverseIndexConstructor::new(
        out.join("docs.dat"),
        out.join("words.dat"),
        &out,
        JournalFileSource,
        identity_rewriter(),
    )
    .create_reverse_index(&input)
    .unwrap_err();

    assert!(format!("{:#}", err).contains("page-index-0002.dat"));
    assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn test_abort_before_start() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("journal");
    write_shards(&input, &two_shard_example());

    let abort = AbortHandle::new();
    abort.abort();
    let result = ReverseIndexConstructor::new(
        dir.path().join("docs.dat"),
        dir.path().join("words.dat"),
        dir.path().join("tmp"),
        JournalFileSource,
        identity_rewriter(),
    )
    .with_abort_handle(abort)
    .create_reverse_index(&input);

    assert!(result.is_err());
    assert!(!dir.path().join("words.dat").exists());
    assert_eq!(fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
}

#[test]
fn test_combined_filters() {
    let dir = tempdir().unwrap();
    let shards: Vec<Shard> = vec![(0..20)
        .map(|doc| {
            let mut terms = vec![(1, 1)];
            if doc % 2 == 0 {
                terms.push((2, 1));
            }
            if doc % 3 == 0 {
                terms.push((3, 1));
            }
            (doc, terms)
        })
        .collect()];
    let built = build_index(dir.path(), &shards);

    for reader in built.readers() {
        let filter = AllOf::new(vec![reader.retain_filter(2), reader.reject_filter(3)]);
        let mut docs: Vec<u64> = reader.documents(1).collect();
        filter.apply(&mut docs);

        assert_eq!(docs, vec![2, 4, 8, 10, 14, 16]);
        assert!(docs.iter().all(|&d| filter.test(d)));
    }
}

#[test]
fn test_single_document_lookups_agree_across_backends() {
    let dir = tempdir().unwrap();
    let shards: Vec<Shard> = vec![(0..10_000).map(|doc| (doc, vec![(7, doc + 1)])).collect()];
    let built = build_index(dir.path(), &shards);
    let readers = built.readers();

    for doc in 0..10_000u64 {
        for reader in &readers {
            assert_eq!(
                reader.get_term_meta(7, &[doc]),
                vec![doc + 1],
                "doc {}",
                doc
            );
            assert!(reader.retain_filter(7).test(doc), "doc {}", doc);
            assert!(!reader.reject_filter(7).test(doc), "doc {}", doc);
        }
    }
    for reader in &readers {
        assert_eq!(reader.get_term_meta(7, &[10_000]), vec![0]);
        assert!(!reader.retain_filter(7).test(10_000));
    }
}

#[test]
fn test_reader_degraded_until_first_generation() {
    let dir = tempdir().unwrap();
    let words = dir.path().join("index/words.dat");
    let docs = dir.path().join("index/docs.dat");

    let reader = ReverseIndexReader::open(&words, &docs).unwrap();
    assert!(!reader.is_ready());
    assert_eq!(reader.documents(100).count(), 0);

    let handle = IndexHandle::open(&words, &docs, ReaderOptions::default()).unwrap();
    let built = build_index(dir.path(), &two_shard_example());
    assert_eq!(built.words, words);

    handle.switch_to(&words, &docs).unwrap();
    assert_eq!(handle.current().num_documents(100), 4);
}
