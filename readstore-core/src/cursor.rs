//! Resume/backtrack cursor for probe overlap scans
//!
//! Quantitation usually walks probes in order along a chromosome, so the
//! index of the last hit is kept and the next scan starts there. A probe
//! earlier than the previous one backtracks only as far as the longest
//! stored read could reach.

use crate::read::PackedRead;

#[derive(Debug, Default)]
pub struct ProbeCursor {
    chromosome: Option<String>,
    last_probe: Option<PackedRead>,
    resume: bool,
    indices: Vec<usize>,
}

impl ProbeCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a query. `lanes` is the number of independently sorted
    /// arrays scanned for this chromosome (one per partner chromosome for
    /// HiC data).
    pub fn begin(&mut self, chromosome: &str, lanes: usize, probe: PackedRead) {
        if self.chromosome.as_deref() != Some(chromosome) || self.indices.len() != lanes {
            self.chromosome = Some(chromosome.to_string());
            self.last_probe = None;
            self.indices = vec![0; lanes];
        }

        self.resume = self.last_probe.map_or(true, |last| probe >= last);
        self.last_probe = Some(probe);
    }

    /// Forgets all cached positions
    pub fn reset(&mut self) {
        self.chromosome = None;
        self.last_probe = None;
        self.indices.clear();
    }

    /// Calls `on_hit` with the index of every read in `reads` overlapping
    /// `probe`, in order. Scanning stops early if `on_hit` returns false.
    pub fn scan<F>(&mut self, lane: usize, reads: &[PackedRead], probe: PackedRead, max_read_length: u32, mut on_hit: F)
    where
        F: FnMut(usize) -> bool,
    {
        if reads.is_empty() || lane >= self.indices.len() {
            return;
        }

        let mut start = self.indices[lane].min(reads.len() - 1);
        if !self.resume {
            while start > 0 && probe.start().saturating_sub(reads[start].start()) <= max_read_length {
                start -= 1;
            }
            self.indices[lane] = start;
        }

        let mut first_hit = true;
        for (i, read) in reads.iter().enumerate().skip(start) {
            if read.start() > probe.end() {
                break;
            }
            if read.overlaps(probe) {
                if first_hit {
                    self.indices[lane] = i;
                    first_hit = false;
                }
                if !on_hit(i) {
                    break;
                }
            }
        }
    }

    pub fn chromosome(&self) -> Option<&str> {
        self.chromosome.as_deref()
    }

    pub fn index(&self, lane: usize) -> Option<usize> {
        self.indices.get(lane).copied()
    }
}
