//! Interaction pairs for one source chromosome, keyed by partner chromosome

use crate::read::PackedRead;
use std::collections::BTreeMap;

/// Parallel source/partner positions for one partner chromosome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HitList {
    sources: Vec<PackedRead>,
    partners: Vec<PackedRead>,
}

impl HitList {
    /// Panics if the two sequences differ in length
    pub fn new(sources: Vec<PackedRead>, partners: Vec<PackedRead>) -> Self {
        assert_eq!(
            sources.len(),
            partners.len(),
            "source and hit positions must be the same length"
        );
        Self { sources, partners }
    }

    pub fn sources(&self) -> &[PackedRead] {
        &self.sources
    }

    pub fn partners(&self) -> &[PackedRead] {
        &self.partners
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PackedRead, PackedRead)> + '_ {
        self.sources.iter().copied().zip(self.partners.iter().copied())
    }

    fn push(&mut self, source: PackedRead, partner: PackedRead) {
        self.sources.push(source);
        self.partners.push(partner);
    }

    fn sort(&mut self) {
        let mut pairs: Vec<(PackedRead, PackedRead)> = self.iter().collect();
        pairs.sort_unstable();
        let (sources, partners) = pairs.into_iter().unzip();
        self.sources = sources;
        self.partners = partners;
    }

    /// Removes adjacent identical pairs. Assumes the list is sorted.
    fn dedup(&mut self) -> usize {
        let before = self.len();
        let mut pairs: Vec<(PackedRead, PackedRead)> = self.iter().collect();
        pairs.dedup();
        let (sources, partners) = pairs.into_iter().unzip();
        self.sources = sources;
        self.partners = partners;
        before - self.len()
    }

    fn trim(&mut self) {
        self.sources.shrink_to_fit();
        self.partners.shrink_to_fit();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitCollection {
    source: String,
    hits: BTreeMap<String, HitList>,
}

impl HitCollection {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), hits: BTreeMap::new() }
    }

    pub fn source_chromosome(&self) -> &str {
        &self.source
    }

    pub fn add_hit(&mut self, partner_chromosome: &str, source: PackedRead, partner: PackedRead) {
        if let Some(list) = self.hits.get_mut(partner_chromosome) {
            list.push(source, partner);
            return;
        }
        let mut list = HitList::default();
        list.push(source, partner);
        self.hits.insert(partner_chromosome.to_string(), list);
    }

    pub(crate) fn insert_list(&mut self, partner_chromosome: String, list: HitList) {
        self.hits.insert(partner_chromosome, list);
    }

    /// Partner chromosome names in sorted order
    pub fn partner_names(&self) -> impl Iterator<Item = &str> {
        self.hits.keys().map(String::as_str)
    }

    pub fn lists(&self) -> impl Iterator<Item = (&str, &HitList)> {
        self.hits.iter().map(|(name, list)| (name.as_str(), list))
    }

    pub fn list(&self, partner_chromosome: &str) -> Option<&HitList> {
        self.hits.get(partner_chromosome)
    }

    pub fn source_positions(&self, partner_chromosome: &str) -> &[PackedRead] {
        self.hits.get(partner_chromosome).map_or(&[], |l| l.sources())
    }

    pub fn hit_positions(&self, partner_chromosome: &str) -> &[PackedRead] {
        self.hits.get(partner_chromosome).map_or(&[], |l| l.partners())
    }

    /// Every source position across all partners, sorted
    pub fn all_source_positions(&self) -> Vec<PackedRead> {
        let mut all: Vec<PackedRead> = self.hits.values().flat_map(|l| l.sources().iter().copied()).collect();
        all.sort_unstable();
        all
    }

    /// Number of stored pairs across all partners
    pub fn pair_count(&self) -> usize {
        self.hits.values().map(HitList::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pair_count() == 0
    }

    pub fn add_collection(&mut self, other: &HitCollection) {
        for (name, list) in other.lists() {
            for (source, partner) in list.iter() {
                self.add_hit(name, source, partner);
            }
        }
    }

    /// Sorts each partner list by source then partner position
    pub fn sort(&mut self) {
        for list in self.hits.values_mut() {
            list.sort();
        }
    }

    /// Releases spare capacity without reordering
    pub fn trim(&mut self) {
        for list in self.hits.values_mut() {
            list.trim();
        }
    }

    /// Collapses interactions whose two ends are both identical.
    /// Assumes the collection is sorted.
    pub fn dedup_pairs(&mut self) -> usize {
        self.hits.values_mut().map(HitList::dedup).sum()
    }

    pub fn is_sorted(&self) -> bool {
        self.hits.values().all(|l| {
            l.iter()
                .collect::<Vec<_>>()
                .windows(2)
                .all(|w| w[0] <= w[1])
        })
    }
}
