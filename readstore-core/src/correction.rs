//! Distance-decay correction for cis interactions
//!
//! Interaction distances are bucketed in fixed 10kb bins. Each bin's factor
//! is the observed share of cis interactions divided by the share expected
//! if reads were spread evenly along the chromosome.

use crate::hits::HitCollection;
use crate::read::PackedRead;
use crate::types::GenomicPos;

/// Width of one distance bucket in bp
pub const DISTANCE_BUCKET_LENGTH: GenomicPos = 10_000;

/// Buckets with fewer observations reuse the last well-supported factor
pub const MIN_BUCKET_OBSERVATIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DistanceCorrection {
    factors: Vec<f32>,
}

impl DistanceCorrection {
    pub fn bucket_for_length(length: GenomicPos) -> usize {
        (length / DISTANCE_BUCKET_LENGTH) as usize
    }

    /// Builds the table from the cis interactions in `hits`
    pub fn from_hits(hits: &HitCollection, chromosome_length: GenomicPos) -> Self {
        let list = hits.list(hits.source_chromosome());
        let distances = list
            .into_iter()
            .flat_map(|l| l.iter())
            .map(|(source, partner)| PackedRead::fragment_length(source, partner));
        Self::from_distances(distances, chromosome_length)
    }

    pub fn from_distances<I>(distances: I, chromosome_length: GenomicPos) -> Self
    where
        I: IntoIterator<Item = GenomicPos>,
    {
        let buckets = Self::bucket_for_length(chromosome_length) + 1;
        let mut counts = vec![0u32; buckets];
        for distance in distances {
            let bucket = Self::bucket_for_length(distance).min(buckets - 1);
            counts[bucket] += 1;
        }
        Self { factors: factors_from_counts(&counts) }
    }

    pub fn factors(&self) -> &[f32] {
        &self.factors
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Factor for one bucket, clamped to the last bucket
    pub fn factor(&self, bucket: usize) -> f32 {
        match self.factors.len() {
            0 => 0.0,
            n => self.factors[bucket.min(n - 1)],
        }
    }

    /// Arithmetic mean of the factors for every bucket between the two distances
    pub fn for_length(&self, min_distance: GenomicPos, max_distance: GenomicPos) -> f32 {
        let (low, high) = if max_distance < min_distance {
            (max_distance, min_distance)
        } else {
            (min_distance, max_distance)
        };
        let first = Self::bucket_for_length(low);
        let last = Self::bucket_for_length(high);

        let total: f32 = (first..=last).map(|bucket| self.factor(bucket)).sum();
        total / (last - first + 1) as f32
    }
}

fn factors_from_counts(counts: &[u32]) -> Vec<f32> {
    let buckets = counts.len();

    // bucket i can be reached by (buckets - i) of the sum(0..=buckets) placements
    let total_categories: u64 = (0..=buckets as u64).sum();
    let total_observations: u64 = counts.iter().map(|&c| c as u64).sum();

    let mut factors = Vec::with_capacity(buckets);
    let mut last_decent = -1.0f32;

    for (i, &count) in counts.iter().enumerate() {
        let random = (buckets - i) as f32 / total_categories as f32;
        let observed = if total_observations == 0 {
            0.0
        } else {
            count as f32 / total_observations as f32
        };

        let mut correction = observed / random;
        if count < MIN_BUCKET_OBSERVATIONS && last_decent > 0.0 {
            correction = last_decent;
        } else {
            last_decent = correction;
        }
        factors.push(correction);
    }
    factors
}
