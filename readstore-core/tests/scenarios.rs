use readstore_core::{
    DataGroup, DataSet, DataStore, DuplicateMode, Genome, HiCDataStore, PackedRead, PairedDataSet, PairedOptions,
    Probe, SharedStore, StoreConfig, StoreContext, StoreError, Strand,
};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    context: Arc<StoreContext>,
    genome: Genome,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().expect("create temp dir");
    let context = StoreContext::shared(StoreConfig::default().with_temp_dir(dir.path()));
    let mut genome = Genome::new();
    genome.add_chromosome("1", 1_000_000);
    genome.add_chromosome("A", 1_000_000);
    genome.add_chromosome("B", 1_000_000);
    Fixture { _dir: dir, context, genome }
}

fn fwd(start: u32, end: u32) -> PackedRead {
    PackedRead::new(start, end, Strand::Forward)
}

#[test]
fn duplicate_reads_are_counted_or_collapsed() {
    let f = fixture();
    let chr = f.genome.chromosome("1").unwrap();

    let kept = DataSet::new(Arc::clone(&f.context), "kept", "kept.tsv", DuplicateMode::None);
    kept.add_read(&chr, fwd(100, 200), 1).unwrap();
    kept.add_read(&chr, fwd(100, 200), 1).unwrap();
    kept.finalize().unwrap();

    let reads = kept.reads_for_chromosome(&chr).unwrap();
    assert_eq!(reads.reads(), &[fwd(100, 200)]);
    assert_eq!(reads.counts(), &[2]);
    assert_eq!(kept.total_read_count().unwrap(), 2);

    let collapsed = DataSet::new(Arc::clone(&f.context), "collapsed", "collapsed.tsv", DuplicateMode::StartAndEnd);
    collapsed.add_read(&chr, fwd(100, 200), 1).unwrap();
    collapsed.add_read(&chr, fwd(100, 200), 1).unwrap();
    collapsed.finalize().unwrap();

    let reads = collapsed.reads_for_chromosome(&chr).unwrap();
    assert_eq!(reads.counts(), &[1]);
    assert_eq!(collapsed.total_read_count().unwrap(), 1);
}

#[test]
fn read_overlapping_probe_is_found() {
    let f = fixture();
    let chr = f.genome.chromosome("1").unwrap();
    let store = DataSet::new(Arc::clone(&f.context), "sample", "sample.tsv", DuplicateMode::None);
    store.add_read(&chr, fwd(100, 200), 1).unwrap();

    let probe = Probe::new(Arc::clone(&chr), PackedRead::new(150, 160, Strand::Unknown), 0);
    assert!(store.contains_read_for_probe(&probe).unwrap());
    assert_eq!(store.read_count_for_probe(&probe).unwrap(), 1);
}

#[test]
fn short_cis_pair_is_discarded() {
    let f = fixture();
    let a = f.genome.chromosome("A").unwrap();
    // fragment length is max(end) - min(start) = 250
    let options = PairedOptions { min_distance: 300, ..PairedOptions::default() };
    let store = PairedDataSet::new(Arc::clone(&f.context), "hic", "hic.tsv", options);
    store.add_read(&a, fwd(100, 150)).unwrap();
    store.add_read(&a, fwd(300, 350)).unwrap();
    store.finalize().unwrap();

    assert_eq!(store.cis_count(), 0);
    assert_eq!(store.trans_count(), 0);
    assert_eq!(store.total_read_count().unwrap(), 0);

    let options = PairedOptions { min_distance: 200, ..PairedOptions::default() };
    let store = PairedDataSet::new(Arc::clone(&f.context), "hic", "hic.tsv", options);
    store.add_read(&a, fwd(100, 150)).unwrap();
    store.add_read(&a, fwd(300, 350)).unwrap();
    store.finalize().unwrap();
    assert_eq!(store.cis_count(), 2);
}

#[test]
fn trans_pair_is_ignored_entirely() {
    let f = fixture();
    let a = f.genome.chromosome("A").unwrap();
    let b = f.genome.chromosome("B").unwrap();
    let options = PairedOptions { ignore_trans: true, ..PairedOptions::default() };
    let store = PairedDataSet::new(Arc::clone(&f.context), "hic", "hic.tsv", options);
    store.add_read(&a, fwd(100, 150)).unwrap();
    store.add_read(&b, fwd(500, 550)).unwrap();
    store.finalize().unwrap();

    assert_eq!(store.cis_count(), 0);
    assert_eq!(store.trans_count(), 0);
    assert_eq!(store.trans_count_for_chromosome(&a), 0);
    assert_eq!(store.trans_count_for_chromosome(&b), 0);
    assert_eq!(store.total_read_count().unwrap(), 0);
}

#[test]
fn group_sums_member_counts() {
    let f = fixture();
    let chr = f.genome.chromosome("1").unwrap();

    let first = Arc::new(DataSet::new(Arc::clone(&f.context), "first", "first.tsv", DuplicateMode::None));
    for start in [100, 300, 500] {
        first.add_read(&chr, fwd(start, start + 50), 1).unwrap();
    }
    let second = Arc::new(DataSet::new(Arc::clone(&f.context), "second", "second.tsv", DuplicateMode::None));
    for start in [100, 200, 300, 400, 500] {
        second.add_read(&chr, fwd(start, start + 20), 1).unwrap();
    }

    let group = DataGroup::new("group", vec![first as SharedStore, second as SharedStore]).unwrap();
    assert_eq!(group.read_count_for_chromosome(&chr).unwrap(), 8);
    assert_eq!(group.total_read_count().unwrap(), 8);

    let merged = group.reads_for_chromosome(&chr).unwrap();
    assert!(merged.is_sorted());
    assert_eq!(merged.total_count(), 8);
}

#[test]
fn finalize_is_idempotent_and_blocks_ingestion() {
    let f = fixture();
    let chr = f.genome.chromosome("1").unwrap();
    let store = DataSet::new(Arc::clone(&f.context), "sample", "sample.tsv", DuplicateMode::None);
    store.add_read(&chr, fwd(10, 20), 3).unwrap();
    store.finalize().unwrap();
    store.finalize().unwrap();

    assert_eq!(store.total_read_count().unwrap(), 3);
    assert_eq!(store.chromosomes_remaining(), 0);
    assert!(matches!(store.add_read(&chr, fwd(30, 40), 1), Err(StoreError::AlreadyFinalized(_))));
}

#[test]
fn queries_finalize_on_demand() {
    let f = fixture();
    let chr = f.genome.chromosome("1").unwrap();
    let store = DataSet::new(Arc::clone(&f.context), "sample", "sample.tsv", DuplicateMode::None);
    store.add_read(&chr, fwd(500, 600), 1).unwrap();
    store.add_read(&chr, fwd(100, 200), 1).unwrap();

    assert!(!store.is_finalized());
    let reads = store.reads_for_chromosome(&chr).unwrap();
    assert!(store.is_finalized());
    assert_eq!(reads.reads(), &[fwd(100, 200), fwd(500, 600)]);
}

#[test]
fn strand_counts_partition_total() {
    let f = fixture();
    let one = f.genome.chromosome("1").unwrap();
    let a = f.genome.chromosome("A").unwrap();
    let store = DataSet::new(Arc::clone(&f.context), "sample", "sample.tsv", DuplicateMode::None);
    store.add_read(&one, PackedRead::new(1, 10, Strand::Forward), 2).unwrap();
    store.add_read(&one, PackedRead::new(5, 50, Strand::Reverse), 1).unwrap();
    store.add_read(&a, PackedRead::new(7, 9, Strand::Unknown), 4).unwrap();

    let total = store.total_read_count().unwrap();
    let parts = store.forward_read_count().unwrap()
        + store.reverse_read_count().unwrap()
        + store.unknown_read_count().unwrap();
    assert_eq!(total, 7);
    assert_eq!(parts, total);
    assert_eq!(store.max_read_length().unwrap(), 46);
    assert_eq!(store.min_read_length().unwrap(), 3);
}

#[test]
fn paired_interactions_are_mirrored() {
    let f = fixture();
    let a = f.genome.chromosome("A").unwrap();
    let b = f.genome.chromosome("B").unwrap();
    let store = PairedDataSet::new(Arc::clone(&f.context), "hic", "hic.tsv", PairedOptions::default());
    store.add_read(&a, fwd(100, 150)).unwrap();
    store.add_read(&b, fwd(9000, 9050)).unwrap();
    store.add_read(&a, fwd(2000, 2050)).unwrap();
    store.add_read(&a, fwd(60_000, 60_050)).unwrap();

    assert_eq!(store.cis_count() + store.trans_count(), store.total_read_count().unwrap());
    assert_eq!(store.total_pair_count(), 2);

    let on_a = store.hic_reads_for_chromosome(&a).unwrap();
    let on_b = store.hic_reads_for_chromosome(&b).unwrap();
    assert!(on_a.is_sorted());
    for (source, partner) in on_a.list("B").unwrap().iter() {
        let mirrored = on_b.list("A").unwrap();
        assert!(mirrored.iter().any(|(s, p)| s == partner && p == source));
    }
    let cis = on_a.list("A").unwrap();
    assert_eq!(cis.len(), 2);
    assert!(cis.iter().all(|(s, p)| cis.iter().any(|(s2, p2)| s2 == p && p2 == s)));
}

#[test]
fn trailing_unpaired_read_is_dropped() {
    let f = fixture();
    let a = f.genome.chromosome("A").unwrap();
    let store = PairedDataSet::new(Arc::clone(&f.context), "hic", "hic.tsv", PairedOptions::default());
    store.add_read(&a, fwd(100, 150)).unwrap();
    store.add_read(&a, fwd(5000, 5050)).unwrap();
    store.add_read(&a, fwd(9000, 9050)).unwrap();
    store.finalize().unwrap();

    assert_eq!(store.total_pair_count(), 1);
    assert_eq!(store.hic_reads_for_chromosome(&a).unwrap().pair_count(), 2);
}

#[test]
fn disposed_store_removes_cache_files() {
    let f = fixture();
    let chr = f.genome.chromosome("1").unwrap();
    let store = DataSet::new(Arc::clone(&f.context), "sample", "sample.tsv", DuplicateMode::None);
    store.add_read(&chr, fwd(1, 100), 1).unwrap();
    store.finalize().unwrap();

    let files = || std::fs::read_dir(f.context.temp_dir()).unwrap().count();
    assert_eq!(files(), 1);
    store.dispose();
    assert_eq!(files(), 0);
}

#[test]
fn group_exposes_pairs_only_when_every_member_has_them() {
    let f = fixture();
    let a = f.genome.chromosome("A").unwrap();
    let one = f.genome.chromosome("1").unwrap();

    let paired: Vec<SharedStore> = (0..2)
        .map(|i| {
            let store = PairedDataSet::new(Arc::clone(&f.context), format!("hic{i}"), "hic.tsv", PairedOptions::default());
            store.add_read(&a, fwd(100, 150)).unwrap();
            store.add_read(&a, fwd(8_000, 8_050)).unwrap();
            Arc::new(store) as SharedStore
        })
        .collect();
    let group = DataGroup::new("pairs", paired.clone()).unwrap();
    let hic = group.as_hic().expect("all members hold pairs");
    assert_eq!(hic.cis_count(), 4);

    let single = Arc::new(DataSet::new(Arc::clone(&f.context), "single", "single.tsv", DuplicateMode::None));
    single.add_read(&one, fwd(1, 50), 1).unwrap();
    let only_single = DataGroup::new("single", vec![Arc::clone(&single) as SharedStore]).unwrap();
    assert!(only_single.as_hic().is_none());

    let mixed = DataGroup::new("mixed", vec![paired[0].clone(), single as SharedStore]).unwrap();
    assert!(mixed.as_hic().is_none());
}
