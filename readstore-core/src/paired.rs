//! Paired-read (HiC) store
//!
//! Reads arrive in submission pairs. Each kept pair is stored under both
//! chromosomes so it can be found from either end, and the cis distance
//! distribution is turned into a [`DistanceCorrection`] at finalisation.

use crate::context::StoreContext;
use crate::correction::DistanceCorrection;
use crate::cursor::ProbeCursor;
use crate::dedup::DuplicateMode;
use crate::error::{StoreError, StoreResult};
use crate::hits::HitCollection;
use crate::read::PackedRead;
use crate::reads::ReadsWithCounts;
use crate::spill::SpillFile;
use crate::stats::ReadSummary;
use crate::store::{DataStore, HiCDataStore, StoreCore, StoreKind};
use crate::types::{Chromosome, GenomicPos, Genome, Probe};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

const SPILL_PREFIX: &str = "readstore_data_hic_";

/// Options fixed when a paired store is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairedOptions {
    pub duplicate_mode: DuplicateMode,
    /// Cis pairs with a shorter fragment are discarded. Zero disables the filter.
    pub min_distance: GenomicPos,
    /// Discard every trans pair
    pub ignore_trans: bool,
}

#[derive(Debug)]
struct PendingChromosome {
    chromosome: Arc<Chromosome>,
    hits: HitCollection,
}

#[derive(Debug)]
struct HiCRecord {
    spill: SpillFile,
    correction: DistanceCorrection,
    cis: u64,
    trans: u64,
    summary: ReadSummary,
}

impl HiCRecord {
    fn pair_count(&self) -> u64 {
        self.cis + self.trans
    }
}

/// Counted as pairs arrive, then recounted from the stored pairs once
/// duplicates are gone. The summary only exists after finalisation.
#[derive(Debug, Default)]
struct PairCounts {
    cis: u64,
    trans: u64,
    cis_by_chromosome: HashMap<String, u64>,
    trans_by_chromosome: HashMap<String, u64>,
    summary: ReadSummary,
}

impl PairCounts {
    fn from_records(records: &HashMap<String, HiCRecord>) -> Self {
        let mut counts = PairCounts::default();
        for (name, record) in records {
            counts.cis += record.cis;
            counts.trans += record.trans;
            counts.cis_by_chromosome.insert(name.clone(), record.cis);
            counts.trans_by_chromosome.insert(name.clone(), record.trans);
            counts.summary = counts.summary.combine(record.summary);
        }
        counts
    }
}

#[derive(Debug, Default)]
struct PairedState {
    pending: Option<(Arc<Chromosome>, PackedRead)>,
    needs_sorting: bool,
    collections: HashMap<String, PendingChromosome>,
    records: HashMap<String, HiCRecord>,
    counts: PairCounts,
}

impl PairedState {
    fn collection_for(&mut self, chromosome: &Arc<Chromosome>) -> &mut HitCollection {
        &mut self
            .collections
            .entry(chromosome.name().to_string())
            .or_insert_with(|| PendingChromosome {
                chromosome: Arc::clone(chromosome),
                hits: HitCollection::new(chromosome.name()),
            })
            .hits
    }

    fn record_pair(
        &mut self,
        first_chromosome: &Arc<Chromosome>,
        first: PackedRead,
        second_chromosome: &Arc<Chromosome>,
        second: PackedRead,
        presorted: bool,
    ) {
        let increment = if presorted { 1 } else { 2 };
        let counts = &mut self.counts;

        if first_chromosome.name() == second_chromosome.name() {
            counts.cis += increment;
            *counts.cis_by_chromosome.entry(first_chromosome.name().to_string()).or_default() += increment;
        } else {
            counts.trans += increment;
            *counts.trans_by_chromosome.entry(first_chromosome.name().to_string()).or_default() += 1;
            if !presorted {
                *counts.trans_by_chromosome.entry(second_chromosome.name().to_string()).or_default() += 1;
            }
        }

        self.collection_for(first_chromosome).add_hit(second_chromosome.name(), first, second);
        if !presorted {
            self.collection_for(second_chromosome).add_hit(first_chromosome.name(), second, first);
        }
    }
}

#[derive(Debug)]
struct HitCache {
    chromosome: Option<String>,
    hits: Arc<HitCollection>,
    reads: Option<Arc<ReadsWithCounts>>,
    lanes: Vec<String>,
    cursor: ProbeCursor,
}

impl Default for HitCache {
    fn default() -> Self {
        Self {
            chromosome: None,
            hits: Arc::new(HitCollection::new("")),
            reads: None,
            lanes: Vec::new(),
            cursor: ProbeCursor::new(),
        }
    }
}

#[derive(Debug)]
pub struct PairedDataSet {
    core: StoreCore,
    context: Arc<StoreContext>,
    file_name: String,
    options: PairedOptions,
    finalized: AtomicBool,
    state: Mutex<PairedState>,
    remaining: AtomicUsize,
    cache: Mutex<HitCache>,
}

impl PairedDataSet {
    pub fn new(
        context: Arc<StoreContext>,
        name: impl Into<String>,
        file_name: impl Into<String>,
        options: PairedOptions,
    ) -> Self {
        Self {
            core: StoreCore::new(name),
            context,
            file_name: file_name.into(),
            options,
            finalized: AtomicBool::new(false),
            state: Mutex::new(PairedState::default()),
            remaining: AtomicUsize::new(0),
            cache: Mutex::new(HitCache::default()),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn options(&self) -> PairedOptions {
        self.options
    }

    pub fn duplicate_mode(&self) -> DuplicateMode {
        self.options.duplicate_mode
    }

    pub fn chromosomes_remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Adds one end of a pair. Ends must be submitted consecutively.
    pub fn add_read(&self, chromosome: &Arc<Chromosome>, read: PackedRead) -> StoreResult<()> {
        self.add_pair_end(chromosome, read, false)
    }

    /// Adds one end of a pair from a stream that already holds both
    /// orientations of every pair in sorted order. Only the forward
    /// orientation is stored and the sort is skipped.
    pub fn add_presorted_read(&self, chromosome: &Arc<Chromosome>, read: PackedRead) -> StoreResult<()> {
        self.add_pair_end(chromosome, read, true)
    }

    /// Drops a half-submitted pair after the parser skipped a record.
    /// Returns true if nothing was pending.
    pub fn skip_pending_read(&self) -> bool {
        self.state.lock().pending.take().is_none()
    }

    fn add_pair_end(&self, chromosome: &Arc<Chromosome>, read: PackedRead, presorted: bool) -> StoreResult<()> {
        let mut state = self.state.lock();
        if self.finalized.load(Ordering::Acquire) {
            return Err(StoreError::AlreadyFinalized(self.name()));
        }
        if !presorted {
            state.needs_sorting = true;
        }

        let Some((first_chromosome, first)) = state.pending.take() else {
            state.pending = Some((Arc::clone(chromosome), read));
            return Ok(());
        };

        let cis = first_chromosome.name() == chromosome.name();
        if !cis && self.options.ignore_trans {
            trace!("Ignoring trans pair {}:{} {}:{}", first_chromosome, first, chromosome, read);
            return Ok(());
        }
        if cis && self.options.min_distance > 0 && PackedRead::fragment_length(first, read) < self.options.min_distance {
            trace!("Ignoring short cis pair {}:{} {}", chromosome, first, read);
            return Ok(());
        }

        state.record_pair(&first_chromosome, first, chromosome, read, presorted);
        Ok(())
    }

    fn finalize_chromosome(
        &self,
        name: String,
        pending: PendingChromosome,
        needs_sorting: bool,
    ) -> StoreResult<(String, HiCRecord)> {
        let PendingChromosome { chromosome, mut hits } = pending;
        if needs_sorting {
            hits.sort();
        } else {
            hits.trim();
        }
        if self.options.duplicate_mode.removes_duplicates() {
            let removed = hits.dedup_pairs();
            if removed > 0 {
                debug!("Removed {} duplicate pairs on {}", removed, chromosome);
            }
        }

        let correction = DistanceCorrection::from_hits(&hits, chromosome.length());
        let mut summary = ReadSummary::default();
        let (mut cis, mut trans) = (0, 0);
        for (partner, list) in hits.lists() {
            if partner == chromosome.name() {
                cis += list.len() as u64;
            } else {
                trans += list.len() as u64;
            }
            for &source in list.sources() {
                summary.observe(source, 1);
            }
        }

        let config = self.context.config();
        let spill = SpillFile::create(&config.temp_dir, SPILL_PREFIX, &hits, config.compression_level);
        self.remaining.fetch_sub(1, Ordering::AcqRel);

        let spill = spill.map_err(|e| StoreError::spill(&name, e))?;
        debug!("Found {} reads on {} for {}", cis + trans, chromosome, self.name());

        Ok((name, HiCRecord { spill, correction, cis, trans, summary }))
    }

    fn ensure_finalized(&self) -> StoreResult<()> {
        if self.finalized.load(Ordering::Acquire) {
            return Ok(());
        }
        self.finalize()
    }

    fn load_into_cache(&self, cache: &mut HitCache, chromosome: &Chromosome) -> StoreResult<Arc<HitCollection>> {
        if cache.chromosome.as_deref() == Some(chromosome.name()) {
            return Ok(Arc::clone(&cache.hits));
        }

        let hits = {
            let state = self.state.lock();
            match state.records.get(chromosome.name()) {
                Some(record) => {
                    self.context.cache_used();
                    record.spill.load::<HitCollection>(self.context.config().verify_checksums)?
                }
                None => HitCollection::new(chromosome.name()),
            }
        };

        cache.chromosome = Some(chromosome.name().to_string());
        cache.lanes = hits.partner_names().map(str::to_string).collect();
        cache.hits = Arc::new(hits);
        cache.reads = None;
        cache.cursor.reset();
        Ok(Arc::clone(&cache.hits))
    }

    fn max_read_length(&self) -> u32 {
        self.state.lock().counts.summary.max_length
    }

}

impl DataStore for PairedDataSet {
    fn core(&self) -> &StoreCore {
        &self.core
    }

    fn kind(&self) -> StoreKind {
        StoreKind::PairedDataSet
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
        if state.pending.take().is_some() {
            debug!("Dropping unpaired read at the end of {}", self.name());
        }
        let collections = std::mem::take(&mut state.collections);
        let needs_sorting = state.needs_sorting;
        self.remaining.store(collections.len(), Ordering::Release);

        let pool = self.context.finalize_pool()?;
        let results: Vec<StoreResult<(String, HiCRecord)>> = pool.install(|| {
            collections
                .into_par_iter()
                .map(|(name, pending)| self.finalize_chromosome(name, pending, needs_sorting))
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

        let stored = PairCounts::from_records(&state.records);
        if stored.cis != state.counts.cis || stored.trans != state.counts.trans {
            debug!(
                "Recounted {}: {} cis, {} trans before duplicate removal",
                self.name(),
                state.counts.cis,
                state.counts.trans
            );
        }
        state.counts = stored;

        info!(
            "Finalised HiC set {}: {} cis, {} trans over {} chromosomes in {:.2}s",
            self.name(),
            state.counts.cis,
            state.counts.trans,
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
        Ok(self.state.lock().counts.summary)
    }

    fn reads_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<Arc<ReadsWithCounts>> {
        self.ensure_finalized()?;
        let mut cache = self.cache.lock();
        let hits = self.load_into_cache(&mut cache, chromosome)?;
        if let Some(reads) = &cache.reads {
            return Ok(Arc::clone(reads));
        }

        let reads = Arc::new(ReadsWithCounts::from_sorted_reads(&hits.all_source_positions()));
        cache.reads = Some(Arc::clone(&reads));
        Ok(reads)
    }

    fn read_count_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<u64> {
        self.ensure_finalized()?;
        let state = self.state.lock();
        Ok(state.records.get(chromosome.name()).map_or(0, HiCRecord::pair_count))
    }

    fn reads_for_probe(&self, probe: &Probe) -> StoreResult<ReadsWithCounts> {
        let hits = self.hic_reads_for_probe(probe)?;
        Ok(ReadsWithCounts::from_sorted_reads(&hits.all_source_positions()))
    }

    fn as_hic(&self) -> Option<&dyn HiCDataStore> {
        Some(self)
    }

    fn dispose(&self) {
        let records: Vec<HiCRecord> = {
            let mut state = self.state.lock();
            state.collections.clear();
            state.pending = None;
            state.records.drain().map(|(_, record)| record).collect()
        };
        for record in records {
            record.spill.discard();
        }
        *self.cache.lock() = HitCache::default();
    }
}

impl HiCDataStore for PairedDataSet {
    fn is_valid_hic(&self) -> bool {
        true
    }

    fn hic_reads_for_probe(&self, probe: &Probe) -> StoreResult<HitCollection> {
        self.ensure_finalized()?;
        let max_read_length = self.max_read_length();

        let mut cache = self.cache.lock();
        let hits = self.load_into_cache(&mut cache, probe.chromosome())?;

        let HitCache { lanes, cursor, .. } = &mut *cache;
        let position = probe.position();
        cursor.begin(probe.chromosome().name(), lanes.len(), position);

        let mut found = HitCollection::new(probe.chromosome().name());
        for (lane, partner) in lanes.iter().enumerate() {
            let Some(list) = hits.list(partner) else { continue };
            cursor.scan(lane, list.sources(), position, max_read_length, |i| {
                found.add_hit(partner, list.sources()[i], list.partners()[i]);
                true
            });
        }
        Ok(found)
    }

    fn hic_reads_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<Arc<HitCollection>> {
        self.ensure_finalized()?;
        let mut cache = self.cache.lock();
        self.load_into_cache(&mut cache, chromosome)
    }

    fn exportable_reads_for_chromosome(&self, chromosome: &Chromosome, genome: &Genome) -> StoreResult<HitCollection> {
        let redundant = self.hic_reads_for_chromosome(chromosome)?;
        let source_rank = genome.index_of(chromosome.name());

        let mut exportable = HitCollection::new(chromosome.name());
        for (partner, list) in redundant.lists() {
            if partner != chromosome.name() {
                let Some(partner_rank) = genome.index_of(partner) else {
                    warn!("Not exporting {} pairs with {}, which is not in the genome", list.len(), partner);
                    continue;
                };
                // the other copy is exported from the later chromosome
                if source_rank.is_some_and(|rank| partner_rank > rank) {
                    continue;
                }
                for (source, hit) in list.iter() {
                    exportable.add_hit(partner, source, hit);
                }
                continue;
            }

            for (j, (source, hit)) in list.iter().enumerate() {
                if hit > source || (hit == source && j % 2 == 0) {
                    exportable.add_hit(partner, source, hit);
                }
            }
        }
        Ok(exportable)
    }

    fn cis_count(&self) -> u64 {
        self.state.lock().counts.cis
    }

    fn trans_count(&self) -> u64 {
        self.state.lock().counts.trans
    }

    fn cis_count_for_chromosome(&self, chromosome: &Chromosome) -> u64 {
        let state = self.state.lock();
        state.counts.cis_by_chromosome.get(chromosome.name()).copied().unwrap_or(0)
    }

    fn trans_count_for_chromosome(&self, chromosome: &Chromosome) -> u64 {
        let state = self.state.lock();
        state.counts.trans_by_chromosome.get(chromosome.name()).copied().unwrap_or(0)
    }

    fn correction_for_length(&self, chromosome: &Chromosome, min_distance: u32, max_distance: u32) -> StoreResult<f32> {
        self.ensure_finalized()?;
        let state = self.state.lock();
        Ok(state
            .records
            .get(chromosome.name())
            .map_or(0.0, |r| r.correction.for_length(min_distance, max_distance)))
    }
}
