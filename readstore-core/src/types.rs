use crate::read::PackedRead;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type GenomicPos = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
    Unknown,
}

impl Strand {
    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
            Strand::Unknown => '.',
        }
    }

    /// Sort rank: reverse < unknown < forward
    pub(crate) fn rank(self) -> i8 {
        match self {
            Strand::Forward => 1,
            Strand::Reverse => -1,
            Strand::Unknown => 0,
        }
    }
}

impl From<char> for Strand {
    fn from(c: char) -> Self {
        match c {
            '+' => Strand::Forward,
            '-' => Strand::Reverse,
            _ => Strand::Unknown,
        }
    }
}

impl From<bool> for Strand {
    fn from(is_forward: bool) -> Self {
        if is_forward { Strand::Forward } else { Strand::Reverse }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chromosome {
    name: String,
    length: GenomicPos,
}

impl Chromosome {
    pub fn new(name: impl Into<String>, length: GenomicPos) -> Self {
        Self { name: name.into(), length }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> GenomicPos {
        self.length
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Ordered chromosome list. Order defines which half of a trans
/// interaction is exported.
#[derive(Debug, Clone, Default)]
pub struct Genome {
    chromosomes: Vec<Arc<Chromosome>>,
    index: HashMap<String, usize>,
}

impl Genome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chromosome, or returns the existing one with the same name
    pub fn add_chromosome(&mut self, name: impl Into<String>, length: GenomicPos) -> Arc<Chromosome> {
        let name = name.into();
        if let Some(&i) = self.index.get(&name) {
            return Arc::clone(&self.chromosomes[i]);
        }

        let chromosome = Arc::new(Chromosome::new(name.clone(), length));
        self.index.insert(name, self.chromosomes.len());
        self.chromosomes.push(Arc::clone(&chromosome));
        chromosome
    }

    pub fn chromosome(&self, name: &str) -> Option<Arc<Chromosome>> {
        self.index.get(name).map(|&i| Arc::clone(&self.chromosomes[i]))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn chromosomes(&self) -> &[Arc<Chromosome>] {
        &self.chromosomes
    }

    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    pub fn total_length(&self) -> u64 {
        self.chromosomes.iter().map(|c| c.length() as u64).sum()
    }
}

/// A genomic region quantitated by index
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    chromosome: Arc<Chromosome>,
    position: PackedRead,
    index: usize,
    name: Option<String>,
}

impl Probe {
    pub fn new(chromosome: Arc<Chromosome>, position: PackedRead, index: usize) -> Self {
        Self { chromosome, position, index, name: None }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn chromosome(&self) -> &Arc<Chromosome> {
        &self.chromosome
    }

    pub fn position(&self) -> PackedRead {
        self.position
    }

    pub fn start(&self) -> GenomicPos {
        self.position.start()
    }

    pub fn end(&self) -> GenomicPos {
        self.position.end()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}:{}-{}", self.chromosome.name(), self.start(), self.end()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProbeSet {
    name: String,
    probes: Vec<Probe>,
}

impl ProbeSet {
    /// Builds a probe set, assigning indices in the order given
    pub fn new(name: impl Into<String>, regions: impl IntoIterator<Item = (Arc<Chromosome>, PackedRead)>) -> Self {
        let probes = regions
            .into_iter()
            .enumerate()
            .map(|(index, (chromosome, position))| Probe::new(chromosome, position, index))
            .collect();

        Self { name: name.into(), probes }
    }

    /// Wraps probes that already carry their indices
    pub fn from_probes(name: impl Into<String>, probes: Vec<Probe>) -> Self {
        Self { name: name.into(), probes }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Probes on one chromosome, sorted by position
    pub fn probes_for_chromosome(&self, chromosome: &str) -> Vec<&Probe> {
        let mut probes: Vec<&Probe> = self
            .probes
            .iter()
            .filter(|p| p.chromosome().name() == chromosome)
            .collect();
        probes.sort_by_key(|p| p.position());
        probes
    }
}
