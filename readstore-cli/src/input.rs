//! Tab separated input formats
//!
//! * genome: `name  length`
//! * reads: `chromosome  start  end  strand  [count]`
//! * pairs: two reads on one line, eight columns
//! * probes: `chromosome  start  end  [name]`
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use readstore_core::{Chromosome, GenomicPos, Genome, PackedRead, Probe, ProbeSet, Strand, MAX_POSITION};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use crate::error::{CliError, CliResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ReadRecord {
    pub chromosome: Arc<Chromosome>,
    pub read: PackedRead,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairRecord {
    pub first: (Arc<Chromosome>, PackedRead),
    pub second: (Arc<Chromosome>, PackedRead),
}

fn open_lines(path: &Path) -> Result<impl Iterator<Item = (usize, std::io::Result<String>)>> {
    if !path.exists() {
        return Err(CliError::file_not_found(path.to_path_buf()).into());
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file).lines().enumerate().map(|(i, line)| (i + 1, line)))
}

fn data_fields(line: &str) -> Option<Vec<&str>> {
    let trimmed = line.trim_end();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(trimmed.split('\t').collect())
}

struct LineParser<'a> {
    file: &'a str,
    line: usize,
}

impl LineParser<'_> {
    fn error(&self, message: String) -> CliError {
        CliError::parse(self.file.to_string(), self.line, message)
    }

    fn number<T: std::str::FromStr>(&self, field: &str, what: &str) -> CliResult<T> {
        field.trim().parse().map_err(|_| self.error(format!("invalid {} '{}'", what, field)))
    }

    fn position(&self, field: &str, what: &str) -> CliResult<GenomicPos> {
        let position: GenomicPos = self.number(field, what)?;
        if position > MAX_POSITION {
            return Err(self.error(format!("{} {} is beyond the largest position {}", what, position, MAX_POSITION)));
        }
        Ok(position)
    }

    fn strand(&self, field: &str) -> CliResult<Strand> {
        match field.trim() {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            "." | "" => Ok(Strand::Unknown),
            other => Err(self.error(format!("invalid strand '{}'", other))),
        }
    }

    fn chromosome(&self, genome: &Genome, name: &str) -> CliResult<Arc<Chromosome>> {
        genome
            .chromosome(name)
            .ok_or_else(|| CliError::unknown_chromosome(self.file.to_string(), name.to_string()))
    }

    fn read(&self, genome: &Genome, fields: &[&str]) -> CliResult<(Arc<Chromosome>, PackedRead)> {
        let chromosome = self.chromosome(genome, fields[0])?;
        let start = self.position(fields[1], "start")?;
        let end = self.position(fields[2], "end")?;
        let strand = self.strand(fields[3])?;
        Ok((chromosome, PackedRead::new(start, end, strand)))
    }
}

fn file_label(path: &Path) -> String {
    path.display().to_string()
}

pub fn read_genome(path: &Path) -> Result<Genome> {
    let label = file_label(path);
    let mut genome = Genome::new();
    for (line, text) in open_lines(path)? {
        let text = text.with_context(|| format!("Failed to read {}", label))?;
        let Some(fields) = data_fields(&text) else { continue };
        let parser = LineParser { file: &label, line };
        if fields.len() < 2 {
            return Err(parser.error("expected name and length".to_string()).into());
        }
        let length = parser.number(fields[1], "length")?;
        genome.add_chromosome(fields[0].trim(), length);
    }
    if genome.is_empty() {
        return Err(CliError::validation(format!("{} lists no chromosomes", label)).into());
    }
    log::info!("Loaded genome with {} chromosomes ({} bp)", genome.len(), genome.total_length());
    Ok(genome)
}

pub fn read_reads(path: &Path, genome: &Genome) -> Result<Vec<ReadRecord>> {
    let label = file_label(path);
    let mut records = Vec::new();
    for (line, text) in open_lines(path)? {
        let text = text.with_context(|| format!("Failed to read {}", label))?;
        let Some(fields) = data_fields(&text) else { continue };
        let parser = LineParser { file: &label, line };
        if fields.len() < 4 {
            return Err(parser.error("expected chromosome, start, end and strand".to_string()).into());
        }
        let (chromosome, read) = parser.read(genome, &fields)?;
        let count = match fields.get(4) {
            Some(field) => parser.number(field, "count")?,
            None => 1,
        };
        records.push(ReadRecord { chromosome, read, count });
    }
    Ok(records)
}

pub fn read_pairs(path: &Path, genome: &Genome) -> Result<Vec<PairRecord>> {
    let label = file_label(path);
    let mut records = Vec::new();
    for (line, text) in open_lines(path)? {
        let text = text.with_context(|| format!("Failed to read {}", label))?;
        let Some(fields) = data_fields(&text) else { continue };
        let parser = LineParser { file: &label, line };
        if fields.len() < 8 {
            return Err(parser.error("expected two reads of four columns each".to_string()).into());
        }
        let first = parser.read(genome, &fields[..4])?;
        let second = parser.read(genome, &fields[4..8])?;
        records.push(PairRecord { first, second });
    }
    Ok(records)
}

pub fn read_probes(path: &Path, genome: &Genome) -> Result<ProbeSet> {
    let label = file_label(path);
    let mut probes = Vec::new();
    for (line, text) in open_lines(path)? {
        let text = text.with_context(|| format!("Failed to read {}", label))?;
        let Some(fields) = data_fields(&text) else { continue };
        let parser = LineParser { file: &label, line };
        if fields.len() < 3 {
            return Err(parser.error("expected chromosome, start and end".to_string()).into());
        }
        let chromosome = parser.chromosome(genome, fields[0])?;
        let start = parser.position(fields[1], "start")?;
        let end = parser.position(fields[2], "end")?;
        let mut probe = Probe::new(chromosome, PackedRead::new(start, end, Strand::Unknown), probes.len());
        if let Some(name) = fields.get(3).map(|n| n.trim()).filter(|n| !n.is_empty()) {
            probe = probe.with_name(name);
        }
        probes.push(probe);
    }

    let name = path.file_stem().map_or_else(|| label.clone(), |s| s.to_string_lossy().into_owned());
    log::info!("Loaded {} probes from {}", probes.len(), label);
    Ok(ProbeSet::from_probes(name, probes))
}
