//! Read counters and simple dispersion statistics

use crate::read::PackedRead;
use crate::reads::ReadsWithCounts;
use crate::types::Strand;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Count and length totals for a set of reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadSummary {
    pub total: u64,
    pub forward: u64,
    pub reverse: u64,
    pub unknown: u64,
    pub total_length: u64,
    pub min_length: u32,
    pub max_length: u32,
}

impl ReadSummary {
    pub fn observe(&mut self, read: PackedRead, count: u32) {
        if count == 0 {
            return;
        }
        let count = count as u64;
        let length = read.length();

        if self.total == 0 || length < self.min_length {
            self.min_length = length;
        }
        self.max_length = self.max_length.max(length);

        self.total += count;
        self.total_length += length as u64 * count;
        match read.strand() {
            Strand::Forward => self.forward += count,
            Strand::Reverse => self.reverse += count,
            Strand::Unknown => self.unknown += count,
        }
    }

    pub fn from_reads(reads: &ReadsWithCounts) -> Self {
        let mut summary = Self::default();
        for (read, count) in reads.iter() {
            summary.observe(read, count);
        }
        summary
    }

    /// Combines two summaries. Min length only considers summaries with reads.
    pub fn combine(self, other: ReadSummary) -> ReadSummary {
        let min_length = match (self.total, other.total) {
            (0, _) => other.min_length,
            (_, 0) => self.min_length,
            _ => self.min_length.min(other.min_length),
        };
        ReadSummary {
            total: self.total + other.total,
            forward: self.forward + other.forward,
            reverse: self.reverse + other.reverse,
            unknown: self.unknown + other.unknown,
            total_length: self.total_length + other.total_length,
            min_length,
            max_length: self.max_length.max(other.max_length),
        }
    }

    pub fn mean_length(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.total_length as f64 / self.total as f64
        }
    }
}

/// Store-wide counters updated concurrently by finalise tasks
#[derive(Debug)]
pub struct ReadStats {
    total: AtomicU64,
    forward: AtomicU64,
    reverse: AtomicU64,
    unknown: AtomicU64,
    total_length: AtomicU64,
    min_length: AtomicU32,
    max_length: AtomicU32,
}

impl Default for ReadStats {
    fn default() -> Self {
        Self {
            total: AtomicU64::new(0),
            forward: AtomicU64::new(0),
            reverse: AtomicU64::new(0),
            unknown: AtomicU64::new(0),
            total_length: AtomicU64::new(0),
            min_length: AtomicU32::new(u32::MAX),
            max_length: AtomicU32::new(0),
        }
    }
}

impl ReadStats {
    /// Adds one chromosome's totals
    pub fn record(&self, summary: &ReadSummary) {
        if summary.total == 0 {
            return;
        }
        self.total.fetch_add(summary.total, Ordering::Relaxed);
        self.forward.fetch_add(summary.forward, Ordering::Relaxed);
        self.reverse.fetch_add(summary.reverse, Ordering::Relaxed);
        self.unknown.fetch_add(summary.unknown, Ordering::Relaxed);
        self.total_length.fetch_add(summary.total_length, Ordering::Relaxed);
        self.min_length.fetch_min(summary.min_length, Ordering::Relaxed);
        self.max_length.fetch_max(summary.max_length, Ordering::Relaxed);
    }

    pub fn max_length(&self) -> u32 {
        self.max_length.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ReadSummary {
        let total = self.total.load(Ordering::Relaxed);
        ReadSummary {
            total,
            forward: self.forward.load(Ordering::Relaxed),
            reverse: self.reverse.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
            total_length: self.total_length.load(Ordering::Relaxed),
            min_length: if total == 0 { 0 } else { self.min_length.load(Ordering::Relaxed) },
            max_length: self.max_length.load(Ordering::Relaxed),
        }
    }
}

/// Mean of the finite values, or NaN if there are none
pub fn mean(values: &[f32]) -> f32 {
    let finite: Vec<f64> = values.iter().filter(|v| v.is_finite()).map(|&v| v as f64).collect();
    if finite.is_empty() {
        return f32::NAN;
    }
    (finite.iter().sum::<f64>() / finite.len() as f64) as f32
}

/// Sample standard deviation (n - 1). Zero for fewer than two values.
pub fn stdev(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values) as f64;
    let sum_sq: f64 = values.iter().map(|&v| (v as f64 - m).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt() as f32
}

/// Standard error of the mean
pub fn sem(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    stdev(values) / (values.len() as f32).sqrt()
}

pub fn coefficient_of_variation(values: &[f32]) -> f32 {
    stdev(values) / mean(values)
}

/// Nearest-rank percentile, `p` in 0..=100
pub fn percentile(values: &[f32], p: u32) -> f32 {
    if values.is_empty() {
        return f32::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let index = ((sorted.len() - 1) * p.min(100) as usize) / 100;
    sorted[index]
}

/// (Q3 - Q1) / (Q3 + Q1)
pub fn quartile_coefficient_of_dispersion(values: &[f32]) -> f32 {
    let q1 = percentile(values, 25);
    let q3 = percentile(values, 75);
    (q3 - q1) / (q3 + q1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_observe() {
        let mut summary = ReadSummary::default();
        summary.observe(PackedRead::new(1, 100, Strand::Forward), 2);
        summary.observe(PackedRead::new(1, 50, Strand::Reverse), 1);
        summary.observe(PackedRead::new(1, 10, Strand::Unknown), 0);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.forward, 2);
        assert_eq!(summary.reverse, 1);
        assert_eq!(summary.total_length, 250);
        assert_eq!(summary.min_length, 50);
        assert_eq!(summary.max_length, 100);
    }

    #[test]
    fn test_combine_ignores_empty_min() {
        let mut a = ReadSummary::default();
        a.observe(PackedRead::new(1, 20, Strand::Forward), 1);
        let combined = a.combine(ReadSummary::default());
        assert_eq!(combined.min_length, 20);
        assert_eq!(ReadSummary::default().combine(a), a);
    }

    #[test]
    fn test_atomic_stats() {
        let stats = ReadStats::default();
        assert_eq!(stats.snapshot(), ReadSummary::default());

        let mut a = ReadSummary::default();
        a.observe(PackedRead::new(1, 30, Strand::Forward), 1);
        let mut b = ReadSummary::default();
        b.observe(PackedRead::new(1, 10, Strand::Reverse), 4);
        stats.record(&a);
        stats.record(&b);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 5);
        assert_eq!(snapshot.min_length, 10);
        assert_eq!(snapshot.max_length, 30);
        assert_eq!(snapshot.forward + snapshot.reverse + snapshot.unknown, snapshot.total);
    }

    #[test]
    fn test_dispersion() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-6);
        assert!((stdev(&values) - 2.138_09).abs() < 1e-4);
        assert!((sem(&values) - 2.138_09 / 8f32.sqrt()).abs() < 1e-4);
        assert_eq!(percentile(&values, 25), 4.0);
        assert_eq!(percentile(&values, 75), 5.0);
        assert!((quartile_coefficient_of_dispersion(&values) - 1.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_skips_non_finite() {
        assert_eq!(mean(&[1.0, f32::NAN, 3.0, f32::INFINITY]), 2.0);
        assert!(mean(&[f32::NAN]).is_nan());
        assert_eq!(stdev(&[1.0]), 0.0);
    }
}
