//! HiC import command implementation - paired reads, cis/trans report and export

use anyhow::{Context, Result};
use readstore_core::{
    DataStore, DuplicateMode, Genome, HiCDataStore, PairedDataSet, PairedOptions, ProbeSet, SharedStore,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use super::{data_set_name, open_registry};
use crate::config::{Config, HicConfig};
use crate::input::{self, PairRecord};

/// Upper bound of the distance range whose correction factor is reported
const NEAR_DISTANCE: u32 = 50_000;

/// Command line flags layered over the `[hic]` configuration section
pub(crate) fn paired_options(
    hic: &HicConfig,
    min_distance: Option<u32>,
    ignore_trans: bool,
    dedup: Option<DuplicateMode>,
) -> PairedOptions {
    PairedOptions {
        duplicate_mode: dedup.unwrap_or(hic.duplicate_mode),
        min_distance: min_distance.unwrap_or(hic.min_distance),
        ignore_trans: ignore_trans || hic.ignore_trans,
    }
}

pub(crate) fn load_pairs(store: &PairedDataSet, pairs: &[PairRecord]) -> Result<()> {
    for pair in pairs {
        store.add_read(&pair.first.0, pair.first.1)?;
        store.add_read(&pair.second.0, pair.second.1)?;
    }
    Ok(())
}

pub(crate) fn print_report(store: &PairedDataSet, genome: &Genome) -> Result<()> {
    println!("{} ({})", store.name(), store.file_name());
    println!("  pairs\t{}", store.total_pair_count());
    println!("  cis\t{}", store.cis_count());
    println!("  trans\t{}", store.trans_count());
    for chromosome in genome.chromosomes() {
        let reads = store.read_count_for_chromosome(chromosome)?;
        if reads == 0 {
            continue;
        }
        println!(
            "  {}\t{}\tcis {}\ttrans {}\tcorrection {:.3}",
            chromosome.name(),
            reads,
            store.cis_count_for_chromosome(chromosome),
            store.trans_count_for_chromosome(chromosome),
            store.correction_for_length(chromosome, 0, NEAR_DISTANCE)?
        );
    }
    Ok(())
}

pub(crate) fn print_probe_counts(store: &dyn HiCDataStore, probes: &ProbeSet) -> Result<()> {
    println!("probe\tchromosome\tstart\tend\tinteractions");
    for probe in probes.probes() {
        let count = store.hic_read_count_for_probe(probe)?;
        println!("{}\t{}\t{}\t{}\t{}", probe.name(), probe.chromosome().name(), probe.start(), probe.end(), count);
    }
    Ok(())
}

/// Writes every interaction once, eight columns per line
pub(crate) fn export_interactions<W: Write>(out: &mut W, store: &dyn HiCDataStore, genome: &Genome) -> Result<u64> {
    let mut written = 0u64;
    for chromosome in genome.chromosomes() {
        let hits = store.exportable_reads_for_chromosome(chromosome, genome)?;
        for (partner, list) in hits.lists() {
            for (source, hit) in list.iter() {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    chromosome.name(),
                    source.start(),
                    source.end(),
                    source.strand_symbol(),
                    partner,
                    hit.start(),
                    hit.end(),
                    hit.strand_symbol()
                )?;
                written += 1;
            }
        }
    }
    Ok(written)
}

#[allow(clippy::too_many_arguments)]
pub fn execute(
    config: &Config,
    genome: PathBuf,
    pairs: PathBuf,
    min_distance: Option<u32>,
    ignore_trans: bool,
    dedup: Option<DuplicateMode>,
    probes: Option<PathBuf>,
    export: Option<PathBuf>,
) -> Result<()> {
    let started = Instant::now();
    let genome = input::read_genome(&genome)?;
    let records = input::read_pairs(&pairs, &genome)?;
    let probe_set = probes.map(|path| input::read_probes(&path, &genome)).transpose()?;
    let registry = open_registry(config, genome);

    let options = paired_options(&config.hic, min_distance, ignore_trans, dedup);
    log::info!(
        "Importing {} pairs (min distance {}, ignore trans {}, duplicates {})",
        records.len(),
        options.min_distance,
        options.ignore_trans,
        options.duplicate_mode
    );

    let store = Arc::new(PairedDataSet::new(
        Arc::clone(registry.context()),
        data_set_name(&pairs),
        pairs.display().to_string(),
        options,
    ));
    load_pairs(&store, &records)?;
    registry.add_data_set(Arc::clone(&store) as SharedStore)?;
    store.finalize().with_context(|| format!("Failed to finalise {}", store.name()))?;

    print_report(&store, registry.genome())?;

    if let Some(probe_set) = probe_set {
        print_probe_counts(store.as_ref(), &probe_set)?;
    }

    if let Some(path) = &export {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let written = export_interactions(&mut writer, store.as_ref(), registry.genome())?;
        writer.flush()?;
        log::info!("Exported {} interactions to {}", written, path.display());
    }

    registry.remove_data_sets(&[store.id()]);
    log::info!("HiC import completed in {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}
