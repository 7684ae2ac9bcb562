//! Import command implementation - load read files into finalised data sets

use anyhow::{Context, Result};
use readstore_core::stats::ReadSummary;
use readstore_core::{DataSet, DataStore, DuplicateMode, Registry, SharedStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use super::{data_set_name, open_registry};
use crate::config::Config;
use crate::input;

#[derive(Debug, Serialize)]
pub struct ChromosomeReport {
    pub name: String,
    pub reads: u64,
}

#[derive(Debug, Serialize)]
pub struct DataSetReport {
    pub name: String,
    pub file: String,
    pub summary: ReadSummary,
    pub mean_length: f64,
    pub chromosomes: Vec<ChromosomeReport>,
}

/// Creates, fills and registers one data set per read file
pub(crate) fn load_data_sets(
    registry: &Registry,
    files: &[PathBuf],
    mode: DuplicateMode,
    presorted: bool,
) -> Result<Vec<Arc<DataSet>>> {
    let mut data_sets = Vec::with_capacity(files.len());
    for path in files {
        let records = input::read_reads(path, registry.genome())?;
        let set = Arc::new(DataSet::new(
            Arc::clone(registry.context()),
            data_set_name(path),
            path.display().to_string(),
            mode,
        ));

        for record in &records {
            if presorted {
                set.add_presorted_read(&record.chromosome, record.read, record.count)?;
            } else {
                set.add_read(&record.chromosome, record.read, record.count)?;
            }
        }
        log::info!("Read {} records from {}", records.len(), path.display());

        registry.add_data_set(Arc::clone(&set) as SharedStore)?;
        data_sets.push(set);
    }
    Ok(data_sets)
}

pub(crate) fn report(registry: &Registry, set: &DataSet) -> Result<DataSetReport> {
    let summary = set.read_summary()?;
    let mut chromosomes = Vec::new();
    for chromosome in registry.genome().chromosomes() {
        let reads = set.read_count_for_chromosome(chromosome)?;
        if reads > 0 {
            chromosomes.push(ChromosomeReport { name: chromosome.name().to_string(), reads });
        }
    }
    Ok(DataSetReport {
        name: set.name(),
        file: set.file_name().to_string(),
        summary,
        mean_length: summary.mean_length(),
        chromosomes,
    })
}

pub fn execute(
    config: &Config,
    genome: PathBuf,
    reads: Vec<PathBuf>,
    dedup: Option<DuplicateMode>,
    presorted: bool,
    json: bool,
) -> Result<()> {
    let started = Instant::now();
    let genome = input::read_genome(&genome)?;
    let registry = open_registry(config, genome);

    let mode = dedup.unwrap_or(config.import.duplicate_mode);
    let presorted = presorted || config.import.presorted;
    log::info!("Importing {} files (duplicates: {})", reads.len(), mode);

    let data_sets = load_data_sets(&registry, &reads, mode, presorted)?;
    let mut reports = Vec::with_capacity(data_sets.len());
    for set in &data_sets {
        set.finalize().with_context(|| format!("Failed to finalise {}", set.name()))?;
        reports.push(report(&registry, set)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports).context("Failed to serialize report")?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    let ids: Vec<_> = data_sets.iter().map(|s| s.id()).collect();
    registry.remove_data_sets(&ids);
    log::info!("Import completed in {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}

fn print_report(report: &DataSetReport) {
    let s = &report.summary;
    println!("{} ({})", report.name, report.file);
    println!("  reads\t{}", s.total);
    println!("  forward\t{}", s.forward);
    println!("  reverse\t{}", s.reverse);
    println!("  unknown\t{}", s.unknown);
    println!("  length\t{}-{} (mean {:.1})", s.min_length, s.max_length, report.mean_length);
    for chromosome in &report.chromosomes {
        println!("  {}\t{}", chromosome.name, chromosome.reads);
    }
}
