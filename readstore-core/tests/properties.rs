use proptest::prelude::*;
use readstore_core::cursor::ProbeCursor;
use readstore_core::spill::SpillFile;
use readstore_core::{DataSet, DataStore, DuplicateMode, Genome, HitCollection, PackedRead, ReadsWithCounts, StoreConfig, StoreContext, Strand};
use std::sync::Arc;
use tempfile::TempDir;

fn strand() -> impl Strategy<Value = Strand> {
    prop_oneof![Just(Strand::Forward), Just(Strand::Reverse), Just(Strand::Unknown)]
}

fn read() -> impl Strategy<Value = PackedRead> {
    (0u32..50_000, 1u32..500, strand()).prop_map(|(start, len, strand)| PackedRead::new(start, start + len - 1, strand))
}

proptest! {
    #[test]
    fn packed_read_keeps_its_fields(start in 0u32..(1 << 30), len in 0u32..10_000, strand in strand()) {
        let end = start + len;
        let read = PackedRead::new(start, end, strand);
        prop_assert_eq!(read.start(), start);
        prop_assert_eq!(read.end(), end);
        prop_assert_eq!(read.strand(), strand);
        prop_assert_eq!(read.length(), len + 1);
        prop_assert_eq!(PackedRead::new(end, start, strand), read);
    }

    #[test]
    fn ordering_follows_start_then_end(a in read(), b in read()) {
        if a.start() != b.start() {
            prop_assert_eq!(a < b, a.start() < b.start());
        } else if a.end() != b.end() {
            prop_assert_eq!(a < b, a.end() < b.end());
        }
    }

    #[test]
    fn cursor_matches_brute_force(
        mut reads in prop::collection::vec(read(), 1..200),
        probes in prop::collection::vec((0u32..50_000, 1u32..2_000), 1..40),
    ) {
        reads.sort();
        let max_length = reads.iter().map(|r| r.length()).max().unwrap_or(0);
        let mut cursor = ProbeCursor::new();

        for (start, len) in probes {
            let probe = PackedRead::new(start, start + len, Strand::Unknown);
            cursor.begin("1", 1, probe);
            let mut found = Vec::new();
            cursor.scan(0, &reads, probe, max_length, |i| {
                found.push(i);
                true
            });

            let expected: Vec<usize> = (0..reads.len()).filter(|&i| reads[i].overlaps(probe)).collect();
            prop_assert_eq!(found, expected);
        }
    }

    #[test]
    fn merge_preserves_totals(
        a in prop::collection::vec((read(), 1u32..5), 0..50),
        b in prop::collection::vec((read(), 1u32..5), 0..50),
    ) {
        let build = |mut entries: Vec<(PackedRead, u32)>| {
            entries.sort_by_key(|e| e.0);
            entries.dedup_by_key(|e| e.0);
            ReadsWithCounts::from_entries(entries)
        };
        let a = build(a);
        let b = build(b);
        let merged = ReadsWithCounts::merge([&a, &b]);

        prop_assert!(merged.is_sorted());
        prop_assert_eq!(merged.total_count(), a.total_count() + b.total_count());
        prop_assert!(merged.reads().windows(2).all(|w| w[0] != w[1]));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn finalized_reads_are_sorted_and_deduplicated(
        entries in prop::collection::vec((read(), 1u32..4), 1..150),
        mode in prop_oneof![
            Just(DuplicateMode::None),
            Just(DuplicateMode::StartAndEnd),
            Just(DuplicateMode::Start),
            Just(DuplicateMode::End),
        ],
    ) {
        let dir = TempDir::new().unwrap();
        let context = StoreContext::shared(StoreConfig::default().with_temp_dir(dir.path()));
        let mut genome = Genome::new();
        let chr = genome.add_chromosome("1", 100_000);

        let store = DataSet::new(context, "sample", "sample.tsv", mode);
        for (read, count) in &entries {
            store.add_read(&chr, *read, *count).unwrap();
        }
        let reads = store.reads_for_chromosome(&chr).unwrap();
        prop_assert!(reads.is_sorted());
        prop_assert!(reads.reads().windows(2).all(|w| w[0] != w[1]));

        let input_total: u64 = entries.iter().map(|e| e.1 as u64).sum();
        let summary = store.read_summary().unwrap();
        prop_assert_eq!(summary.forward + summary.reverse + summary.unknown, summary.total);

        match mode {
            DuplicateMode::None => prop_assert_eq!(reads.total_count(), input_total),
            DuplicateMode::StartAndEnd => prop_assert!(reads.counts().iter().all(|&c| c == 1)),
            DuplicateMode::Start => {
                let mut keys: Vec<_> = reads.reads().iter().map(|r| {
                    let five_prime = if r.strand() == Strand::Reverse { r.end() } else { r.start() };
                    (r.strand().symbol(), five_prime)
                }).collect();
                let before = keys.len();
                keys.sort();
                keys.dedup();
                prop_assert_eq!(keys.len(), before);
            }
            DuplicateMode::End => {
                let mut keys: Vec<_> = reads.reads().iter().map(|r| {
                    let three_prime = if r.strand() == Strand::Reverse { r.start() } else { r.end() };
                    (r.strand().symbol(), three_prime)
                }).collect();
                let before = keys.len();
                keys.sort();
                keys.dedup();
                prop_assert_eq!(keys.len(), before);
            }
        }
        prop_assert!(reads.total_count() <= input_total);
    }
}

#[test]
fn spill_files_reproduce_their_records() {
    let dir = TempDir::new().unwrap();
    let reads = ReadsWithCounts::new(
        vec![PackedRead::new(1, 10, Strand::Forward), PackedRead::new(5, 80, Strand::Reverse)],
        vec![3, 1],
    );
    let file = SpillFile::create(dir.path(), "readstore_test_", &reads, 3).unwrap();
    assert!(file.size() > 0);
    let loaded: ReadsWithCounts = file.load(true).unwrap();
    assert_eq!(loaded, reads);

    let mut hits = HitCollection::new("1");
    hits.add_hit("1", PackedRead::new(1, 10, Strand::Forward), PackedRead::new(900, 950, Strand::Reverse));
    hits.add_hit("2", PackedRead::new(40, 90, Strand::Unknown), PackedRead::new(7, 70, Strand::Forward));
    let file = SpillFile::create(dir.path(), "readstore_test_", &hits, 3).unwrap();
    let loaded: HitCollection = file.load(true).unwrap();
    assert_eq!(loaded, hits);

    let path = file.path().to_path_buf();
    file.discard();
    assert!(!path.exists());
}

#[test]
fn merged_store_view_sums_identical_reads() {
    let dir = TempDir::new().unwrap();
    let context = StoreContext::shared(StoreConfig::default().with_temp_dir(dir.path()));
    let mut genome = Genome::new();
    let chr = genome.add_chromosome("1", 10_000);

    let read = PackedRead::new(100, 200, Strand::Forward);
    let a = Arc::new(DataSet::new(Arc::clone(&context), "a", "a", DuplicateMode::None));
    let b = Arc::new(DataSet::new(Arc::clone(&context), "b", "b", DuplicateMode::None));
    a.add_read(&chr, read, 2).unwrap();
    b.add_read(&chr, read, 5).unwrap();

    let merged = ReadsWithCounts::merge([
        a.reads_for_chromosome(&chr).unwrap().as_ref(),
        b.reads_for_chromosome(&chr).unwrap().as_ref(),
    ]);
    assert_eq!(merged.reads(), &[read]);
    assert_eq!(merged.counts(), &[7]);
}
