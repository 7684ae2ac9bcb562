//! Sorted reads paired with their multiplicities

use crate::read::PackedRead;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadsWithCounts {
    reads: Vec<PackedRead>,
    counts: Vec<u32>,
}

impl ReadsWithCounts {
    /// Panics if the two sequences differ in length
    pub fn new(reads: Vec<PackedRead>, counts: Vec<u32>) -> Self {
        assert_eq!(
            reads.len(),
            counts.len(),
            "reads and counts must be the same length"
        );
        Self { reads, counts }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<(PackedRead, u32)>) -> Self {
        let (reads, counts) = entries.into_iter().unzip();
        Self { reads, counts }
    }

    /// Collapses runs of identical reads from an already sorted slice
    pub fn from_sorted_reads(sorted: &[PackedRead]) -> Self {
        let mut reads: Vec<PackedRead> = Vec::new();
        let mut counts: Vec<u32> = Vec::new();

        for &read in sorted {
            match reads.last() {
                Some(&last) if last == read => {
                    if let Some(count) = counts.last_mut() {
                        *count += 1;
                    }
                }
                _ => {
                    reads.push(read);
                    counts.push(1);
                }
            }
        }

        Self { reads, counts }
    }

    /// K-way merge of sorted sources. Identical reads from different
    /// sources have their counts summed.
    pub fn merge<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = &'a ReadsWithCounts>,
    {
        let sources: Vec<&ReadsWithCounts> = sources.into_iter().filter(|s| !s.is_empty()).collect();
        match sources.len() {
            0 => return Self::empty(),
            1 => return sources[0].clone(),
            _ => {}
        }

        let capacity = sources.iter().map(|s| s.len()).sum();
        let mut reads = Vec::with_capacity(capacity);
        let mut counts: Vec<u32> = Vec::with_capacity(capacity);

        let mut heap: BinaryHeap<Reverse<(PackedRead, usize, usize)>> = sources
            .iter()
            .enumerate()
            .map(|(source, s)| Reverse((s.reads[0], source, 0)))
            .collect();

        while let Some(Reverse((read, source, offset))) = heap.pop() {
            let count = sources[source].counts[offset];
            if reads.last() == Some(&read) {
                if let Some(last) = counts.last_mut() {
                    *last += count;
                }
            } else {
                reads.push(read);
                counts.push(count);
            }

            let next = offset + 1;
            if next < sources[source].len() {
                heap.push(Reverse((sources[source].reads[next], source, next)));
            }
        }

        Self { reads, counts }
    }

    pub fn reads(&self) -> &[PackedRead] {
        &self.reads
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PackedRead, u32)> + '_ {
        self.reads.iter().copied().zip(self.counts.iter().copied())
    }

    /// One entry per counted read
    pub fn expand_reads(&self) -> Vec<PackedRead> {
        let mut expanded = Vec::with_capacity(self.total_count() as usize);
        for (read, count) in self.iter() {
            expanded.extend(std::iter::repeat(read).take(count as usize));
        }
        expanded
    }

    pub fn is_sorted(&self) -> bool {
        self.reads.windows(2).all(|w| w[0] <= w[1])
    }

    pub fn into_parts(self) -> (Vec<PackedRead>, Vec<u32>) {
        (self.reads, self.counts)
    }
}
