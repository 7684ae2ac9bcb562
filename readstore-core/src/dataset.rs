//! Single-sample read store
//!
//! Reads are buffered per chromosome until [`DataSet::finalize`], which
//! sorts, deduplicates and spills each chromosome to a temp file on a
//! bounded worker pool. Queries reload one chromosome at a time into a
//! single-slot cache and walk it with a [`ProbeCursor`].

use crate::context::StoreContext;
use crate::cursor::ProbeCursor;
use crate::dedup::{self, DuplicateMode};
use crate::error::{StoreError, StoreResult};
use crate::read::PackedRead;
use crate::reads::ReadsWithCounts;
use crate::spill::SpillFile;
use crate::stats::{ReadStats, ReadSummary};
use crate::store::{DataStore, StoreCore, StoreKind};
use crate::types::{Chromosome, Probe};
use log::{debug, error, info};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

const SPILL_PREFIX: &str = "readstore_data_set_";

#[derive(Debug)]
struct ChromosomeBuffer {
    chromosome: Arc<Chromosome>,
    entries: Vec<(PackedRead, u32)>,
}

impl ChromosomeBuffer {
    fn push(&mut self, read: PackedRead, count: u32) {
        if let Some(last) = self.entries.last_mut() {
            if last.0 == read {
                last.1 += count;
                return;
            }
        }
        self.entries.push((read, count));
    }
}

#[derive(Debug)]
struct ChromosomeRecord {
    spill: SpillFile,
    read_count: u64,
}

#[derive(Debug, Default)]
struct IngestState {
    needs_sorting: bool,
    buffers: HashMap<String, ChromosomeBuffer>,
    records: HashMap<String, ChromosomeRecord>,
}

#[derive(Debug)]
struct ReadCache {
    chromosome: Option<String>,
    reads: Arc<ReadsWithCounts>,
    cursor: ProbeCursor,
}

impl Default for ReadCache {
    fn default() -> Self {
        Self { chromosome: None, reads: Arc::new(ReadsWithCounts::empty()), cursor: ProbeCursor::new() }
    }
}

#[derive(Debug)]
pub struct DataSet {
    core: StoreCore,
    context: Arc<StoreContext>,
    file_name: String,
    duplicate_mode: DuplicateMode,
    finalized: AtomicBool,
    state: Mutex<IngestState>,
    stats: ReadStats,
    remaining: AtomicUsize,
    cache: Mutex<ReadCache>,
}

impl DataSet {
    pub fn new(
        context: Arc<StoreContext>,
        name: impl Into<String>,
        file_name: impl Into<String>,
        duplicate_mode: DuplicateMode,
    ) -> Self {
        Self {
            core: StoreCore::new(name),
            context,
            file_name: file_name.into(),
            duplicate_mode,
            finalized: AtomicBool::new(false),
            state: Mutex::new(IngestState::default()),
            stats: ReadStats::default(),
            remaining: AtomicUsize::new(0),
            cache: Mutex::new(ReadCache::default()),
        }
    }

    /// Source the reads were imported from
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn duplicate_mode(&self) -> DuplicateMode {
        self.duplicate_mode
    }

    /// Chromosomes still being finalised
    pub fn chromosomes_remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Appends `count` copies of a read. A zero count is ignored.
    pub fn add_read(&self, chromosome: &Arc<Chromosome>, read: PackedRead, count: u32) -> StoreResult<()> {
        self.append(chromosome, read, count, false)
    }

    /// Appends a read from a source already sorted by position, letting
    /// finalisation skip its sort. Only use for trusted sorted input.
    pub fn add_presorted_read(&self, chromosome: &Arc<Chromosome>, read: PackedRead, count: u32) -> StoreResult<()> {
        self.append(chromosome, read, count, true)
    }

    fn append(&self, chromosome: &Arc<Chromosome>, read: PackedRead, count: u32, presorted: bool) -> StoreResult<()> {
        let mut state = self.state.lock();
        if self.finalized.load(Ordering::Acquire) {
            return Err(StoreError::AlreadyFinalized(self.name()));
        }
        if count == 0 {
            return Ok(());
        }
        if !presorted {
            state.needs_sorting = true;
        }

        state
            .buffers
            .entry(chromosome.name().to_string())
            .or_insert_with(|| ChromosomeBuffer { chromosome: Arc::clone(chromosome), entries: Vec::new() })
            .push(read, count);
        Ok(())
    }

    fn finalize_chromosome(
        &self,
        name: String,
        buffer: ChromosomeBuffer,
        needs_sorting: bool,
    ) -> StoreResult<(String, ChromosomeRecord)> {
        let mut entries = buffer.entries;
        if needs_sorting {
            entries.sort_unstable_by_key(|(read, _)| *read);
        }
        dedup::collapse_adjacent(&mut entries);
        let entries = self.duplicate_mode.apply(entries);

        let reads = ReadsWithCounts::from_entries(entries);
        let summary = ReadSummary::from_reads(&reads);
        self.stats.record(&summary);

        let config = self.context.config();
        let spill = SpillFile::create(&config.temp_dir, SPILL_PREFIX, &reads, config.compression_level);
        self.remaining.fetch_sub(1, Ordering::AcqRel);

        let spill = spill.map_err(|e| StoreError::spill(&name, e))?;
        debug!(
            "Found {} reads on {} ({} distinct) for {}",
            summary.total,
            buffer.chromosome.name(),
            reads.len(),
            self.name()
        );

        Ok((name, ChromosomeRecord { spill, read_count: summary.total }))
    }

    fn ensure_finalized(&self) -> StoreResult<()> {
        if self.finalized.load(Ordering::Acquire) {
            return Ok(());
        }
        self.finalize()
    }

    /// Swaps the cached chromosome if needed and returns its reads
    fn load_into_cache(&self, cache: &mut ReadCache, chromosome: &Chromosome) -> StoreResult<Arc<ReadsWithCounts>> {
        if cache.chromosome.as_deref() == Some(chromosome.name()) {
            return Ok(Arc::clone(&cache.reads));
        }

        let reads = {
            let state = self.state.lock();
            match state.records.get(chromosome.name()) {
                Some(record) => {
                    self.context.cache_used();
                    record.spill.load::<ReadsWithCounts>(self.context.config().verify_checksums)?
                }
                None => ReadsWithCounts::empty(),
            }
        };

        cache.chromosome = Some(chromosome.name().to_string());
        cache.reads = Arc::new(reads);
        cache.cursor.reset();
        Ok(Arc::clone(&cache.reads))
    }

    /// Runs `on_hit` over the cached reads overlapping `probe`
    fn scan_probe<F>(&self, probe: &Probe, mut on_hit: F) -> StoreResult<()>
    where
        F: FnMut(PackedRead, u32) -> bool,
    {
        self.ensure_finalized()?;
        let max_read_length = self.stats.max_length();

        let mut cache = self.cache.lock();
        let reads = self.load_into_cache(&mut cache, probe.chromosome())?;

        let cursor = &mut cache.cursor;
        cursor.begin(probe.chromosome().name(), 1, probe.position());
        cursor.scan(0, reads.reads(), probe.position(), max_read_length, |i| {
            on_hit(reads.reads()[i], reads.counts()[i])
        });
        Ok(())
    }
}

impl DataStore for DataSet {
    fn core(&self) -> &StoreCore {
        &self.core
    }

    fn kind(&self) -> StoreKind {
        StoreKind::DataSet
    }

    fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    fn finalize(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if self.finalized.load(Ordering::Acquire) {
            return Ok(());
        }

        let started = Instant::now();
        let buffers = std::mem::take(&mut state.buffers);
        let needs_sorting = state.needs_sorting;
        self.remaining.store(buffers.len(), Ordering::Release);

        let pool = self.context.finalize_pool()?;
        let results: Vec<StoreResult<(String, ChromosomeRecord)>> = pool.install(|| {
            buffers
                .into_par_iter()
                .map(|(name, buffer)| self.finalize_chromosome(name, buffer, needs_sorting))
                .collect()
        });

        self.finalized.store(true, Ordering::Release);

        let mut first_error = None;
        for result in results {
            match result {
                Ok((name, record)) => {
                    state.records.insert(name, record);
                }
                Err(e) => {
                    error!("Finalising {} failed: {}", self.name(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        let summary = self.stats.snapshot();
        info!(
            "Finalised {}: {} reads over {} chromosomes in {:.2}s",
            self.name(),
            summary.total,
            state.records.len(),
            started.elapsed().as_secs_f64()
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn read_summary(&self) -> StoreResult<ReadSummary> {
        self.ensure_finalized()?;
        Ok(self.stats.snapshot())
    }

    fn reads_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<Arc<ReadsWithCounts>> {
        self.ensure_finalized()?;
        let mut cache = self.cache.lock();
        self.load_into_cache(&mut cache, chromosome)
    }

    fn read_count_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<u64> {
        self.ensure_finalized()?;
        let state = self.state.lock();
        Ok(state.records.get(chromosome.name()).map_or(0, |r| r.read_count))
    }

    fn reads_for_probe(&self, probe: &Probe) -> StoreResult<ReadsWithCounts> {
        let mut reads = Vec::new();
        let mut counts = Vec::new();
        self.scan_probe(probe, |read, count| {
            reads.push(read);
            counts.push(count);
            true
        })?;
        Ok(ReadsWithCounts::new(reads, counts))
    }

    fn read_count_for_probe(&self, probe: &Probe) -> StoreResult<u64> {
        let mut total = 0u64;
        self.scan_probe(probe, |_, count| {
            total += count as u64;
            true
        })?;
        Ok(total)
    }

    fn contains_read_for_probe(&self, probe: &Probe) -> StoreResult<bool> {
        let mut found = false;
        self.scan_probe(probe, |_, _| {
            found = true;
            false
        })?;
        Ok(found)
    }

    fn dispose(&self) {
        let records: Vec<ChromosomeRecord> = {
            let mut state = self.state.lock();
            state.buffers.clear();
            state.records.drain().map(|(_, record)| record).collect()
        };
        for record in records {
            record.spill.discard();
        }
        *self.cache.lock() = ReadCache::default();
    }
}
