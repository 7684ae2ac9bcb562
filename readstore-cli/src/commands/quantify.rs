//! Quantify command implementation - read counts over probes per data set

use anyhow::{Context, Result};
use readstore_core::{
    DataGroup, DataStore, DuplicateMode, Genome, ProbeSet, Registry, ReplicateSet, SharedStore,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use super::import::load_data_sets;
use super::open_registry;
use crate::config::Config;
use crate::input;

/// Stores a raw overlap count for every probe, one chromosome at a time
pub(crate) fn quantitate(store: &dyn DataStore, genome: &Genome, probes: &ProbeSet) -> Result<()> {
    for chromosome in genome.chromosomes() {
        for probe in probes.probes_for_chromosome(chromosome.name()) {
            let count = store.read_count_for_probe(probe)?;
            store.set_value_for_probe(probe, count as f32)?;
        }
    }
    log::debug!("Quantitated {} over {} probes", store.name(), probes.len());
    Ok(())
}

/// Writes one row per probe with a column for every store
pub(crate) fn write_table<W: Write>(
    out: &mut W,
    probes: &ProbeSet,
    stores: &[SharedStore],
    replicates: Option<&ReplicateSet>,
) -> Result<()> {
    write!(out, "probe\tchromosome\tstart\tend")?;
    for store in stores {
        write!(out, "\t{}", store.name())?;
    }
    if let Some(set) = replicates {
        write!(out, "\t{0} mean\t{0} stdev\t{0} cv", set.name())?;
    }
    writeln!(out)?;

    for probe in probes.probes() {
        write!(out, "{}\t{}\t{}\t{}", probe.name(), probe.chromosome().name(), probe.start(), probe.end())?;
        for store in stores {
            write!(out, "\t{}", store.value_for_probe(probe)?)?;
        }
        if let Some(set) = replicates {
            let mean = set.value_for_probe(probe)?;
            let stdev = set.stdev_for_probe(probe)?;
            let cv = set.coefficient_of_variation_for_probe(probe)?;
            write!(out, "\t{:.3}\t{:.3}\t{:.3}", mean, stdev, cv)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn build_group(registry: &Registry, name: String, members: Vec<SharedStore>) -> Result<Arc<DataGroup>> {
    let group = Arc::new(DataGroup::new(name, members)?);
    registry.add_group(Arc::clone(&group));
    Ok(group)
}

fn build_replicate_set(registry: &Registry, name: String, members: Vec<SharedStore>) -> Result<Arc<ReplicateSet>> {
    let set = Arc::new(ReplicateSet::new(name, members)?);
    registry.add_replicate_set(Arc::clone(&set));
    Ok(set)
}

#[allow(clippy::too_many_arguments)]
pub fn execute(
    config: &Config,
    genome: PathBuf,
    probes: PathBuf,
    reads: Vec<PathBuf>,
    dedup: Option<DuplicateMode>,
    group: Option<String>,
    replicate_set: Option<String>,
    out: Option<PathBuf>,
) -> Result<()> {
    let started = Instant::now();
    let genome = input::read_genome(&genome)?;
    let probe_set = input::read_probes(&probes, &genome)?;
    let registry = open_registry(config, genome);

    let mode = dedup.unwrap_or(config.import.duplicate_mode);
    let data_sets = load_data_sets(&registry, &reads, mode, config.import.presorted)?;
    for set in &data_sets {
        set.finalize().with_context(|| format!("Failed to finalise {}", set.name()))?;
    }
    let samples: Vec<SharedStore> = data_sets.iter().map(|s| Arc::clone(s) as SharedStore).collect();

    let group = group.map(|name| build_group(&registry, name, samples.clone())).transpose()?;
    let replicates = replicate_set
        .map(|name| build_replicate_set(&registry, name, samples.clone()))
        .transpose()?;

    registry.set_probe_set(probe_set);
    let probe_set = registry
        .probe_set()
        .context("Probe set missing after registration")?;

    let mut columns = samples.clone();
    if let Some(group) = &group {
        columns.push(Arc::clone(group) as SharedStore);
    }
    for store in &columns {
        quantitate(store.as_ref(), registry.genome(), &probe_set)?;
    }
    log::info!("Quantitated {} stores over {} probes", columns.len(), probe_set.len());

    match &out {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_table(&mut writer, &probe_set, &columns, replicates.as_deref())?;
            writer.flush()?;
            log::info!("Wrote quantitation to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            write_table(&mut writer, &probe_set, &columns, replicates.as_deref())?;
            writer.flush()?;
        }
    }

    let ids: Vec<_> = data_sets.iter().map(|s| s.id()).collect();
    registry.remove_data_sets(&ids);
    log::info!("Quantitation completed in {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use readstore_core::{DataSet, PackedRead, Strand};
    use tempfile::TempDir;

    fn data_set(registry: &Registry, name: &str, starts: &[u32]) -> Arc<DataSet> {
        let chr = registry.genome().chromosome("1").unwrap();
        let set = Arc::new(DataSet::new(Arc::clone(registry.context()), name, name, DuplicateMode::None));
        for &start in starts {
            set.add_read(&chr, PackedRead::new(start, start + 49, Strand::Forward), 1).unwrap();
        }
        set.finalize().unwrap();
        registry.add_data_set(Arc::clone(&set) as SharedStore).unwrap();
        set
    }

    #[test]
    fn test_quantitate_and_write() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.store.temp_dir = dir.path().to_path_buf();

        let mut genome = Genome::new();
        let chr = genome.add_chromosome("1", 10_000);
        let registry = open_registry(&config, genome);

        let a = data_set(&registry, "a", &[100, 120, 5000]);
        let b = data_set(&registry, "b", &[110, 5010, 5020, 5030]);
        let samples: Vec<SharedStore> = vec![a as SharedStore, b as SharedStore];

        let group = build_group(&registry, "pooled".to_string(), samples.clone()).unwrap();
        let replicates = build_replicate_set(&registry, "reps".to_string(), samples.clone()).unwrap();

        registry.set_probe_set(ProbeSet::new(
            "probes",
            vec![
                (Arc::clone(&chr), PackedRead::new(1, 1000, Strand::Unknown)),
                (Arc::clone(&chr), PackedRead::new(4000, 6000, Strand::Unknown)),
            ],
        ));
        let probes = registry.probe_set().unwrap();

        let mut columns = samples;
        columns.push(Arc::clone(&group) as SharedStore);
        for store in &columns {
            quantitate(store.as_ref(), registry.genome(), &probes).unwrap();
        }

        let first = &probes.probes()[0];
        assert_eq!(columns[0].value_for_probe(first).unwrap(), 2.0);
        assert_eq!(group.value_for_probe(first).unwrap(), 3.0);
        assert_eq!(replicates.value_for_probe(first).unwrap(), 1.5);

        let mut buffer = Vec::new();
        write_table(&mut buffer, &probes, &columns, Some(&replicates)).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("probe\tchromosome\tstart\tend\ta\tb\tpooled\treps mean"));
        assert!(lines[2].contains("\t1\t3\t4\t"));
    }
}
